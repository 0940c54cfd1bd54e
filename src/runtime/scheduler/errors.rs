//! Scheduler errors. Every variant is fatal to the scheduler.

use thiserror::Error;

use crate::runtime::engine::{EngineError, ScriptError};
use crate::runtime::reactor::ReactorError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// A task raised an error nobody caught.
    #[error("Error running {task}: {}", .error.render())]
    TaskFailed { task: String, error: ScriptError },

    /// A body run in host context failed.
    #[error("{}", .0.render())]
    Main(ScriptError),

    #[error("Error running event loop: {0}")]
    Reactor(#[from] ReactorError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A dead task was found in the pending snapshot.
    #[error("Attempt to resume dead {task}")]
    ResumeDead { task: String },
}

impl SchedulerError {
    /// The script error behind this failure, if there is one.
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            SchedulerError::TaskFailed { error, .. } | SchedulerError::Main(error) => Some(error),
            _ => None,
        }
    }
}
