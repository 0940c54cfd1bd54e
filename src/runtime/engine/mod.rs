//! Scripting-engine binding
//!
//! The scheduler never looks inside an execution context. It asks the
//! engine to create one from a body, to resume it once per tick, and to run
//! bodies in the host context. While an engine is resuming a task it sees
//! the scheduler only through [`TaskHost`].

pub mod native;
mod slots;

pub use slots::ExecutionSlots;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::runtime::scheduler::TaskRef;

/// Opaque handle to a resumable execution context.
///
/// Handles are slot indices tagged with the generation of the slot's
/// occupant, so a handle to a released context never resolves to a newer
/// one that reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionHandle {
    index: u32,
    generation: u32,
}

impl ExecutionHandle {
    /// Create a handle from its raw parts.
    #[inline]
    pub fn new(
        index: u32,
        generation: u32,
    ) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the occupant this handle refers to.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "exec#{}.{}", self.index, self.generation)
    }
}

/// Why a resumed execution gave control back without finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// Still runnable; resume again next tick.
    Yield,
    /// Waiting for something external to wake the task.
    Block,
}

/// Result of resuming an execution context once.
#[derive(Debug)]
pub enum ResumeOutcome<V> {
    /// The body returned normally.
    Completed(Vec<V>),
    /// The body yielded.
    Suspended(SuspendReason),
    /// The body raised an error nobody caught.
    Failed(ScriptError),
}

/// Misuse of a script-facing call. Scoped to the offending call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Cannot block the main task")]
    BlockOutsideTask,

    #[error("Cannot yield from the main task")]
    YieldOutsideTask,

    #[error("Cannot sleep in the main task")]
    SleepOutsideTask,

    #[error("bad argument #{position} to '{function}' ({expected} expected, got {got})")]
    BadArgument {
        /// 1-based argument position
        position: usize,
        /// Name of the called function
        function: &'static str,
        /// Expected type name
        expected: &'static str,
        /// Actual type name
        got: String,
    },
}

/// An error raised by script code, with the frames it unwound through.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ScriptError {
    /// Human-readable message
    pub message: String,
    /// Innermost frame first
    pub traceback: Vec<String>,
}

impl ScriptError {
    /// Create an error without traceback.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// Append a traceback frame.
    pub fn with_frame(
        mut self,
        frame: impl Into<String>,
    ) -> Self {
        self.traceback.push(frame.into());
        self
    }

    /// Message followed by the traceback, one frame per line.
    pub fn render(&self) -> String {
        if self.traceback.is_empty() {
            return self.message.clone();
        }
        let mut out = format!("{}\nstack traceback:", self.message);
        for frame in &self.traceback {
            out.push_str("\n\t");
            out.push_str(frame);
        }
        out
    }
}

impl From<UsageError> for ScriptError {
    fn from(err: UsageError) -> Self {
        ScriptError::new(err.to_string())
    }
}

/// Infrastructure failures of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Unknown execution handle {0}")]
    UnknownHandle(ExecutionHandle),

    #[error("Execution {0} is already running")]
    Reentrant(ExecutionHandle),

    #[error("Cannot create an execution from a {0} value")]
    NotCallable(String),

    #[error("Execution context slots exhausted")]
    Exhausted,
}

/// What an engine may ask of the scheduler while it runs script code.
pub trait TaskHost {
    /// The task whose execution is being resumed, `None` in host context.
    fn current_task(&self) -> Option<TaskRef>;

    /// Register a new task for an execution the engine just created. The
    /// caller becomes its parent, or it is toplevel in host context.
    fn spawn(
        &mut self,
        name: &str,
        handle: ExecutionHandle,
    ) -> TaskRef;

    /// Move the current task from pending to blocked. The engine must then
    /// suspend with [`SuspendReason::Block`].
    fn block(&mut self) -> Result<(), UsageError>;

    /// Ask the reactor to wake the current task after `delay`.
    fn wake_after(
        &mut self,
        delay: Duration,
    ) -> Result<(), UsageError>;
}

/// An embedded engine providing resumable executions.
///
/// `resume` is never reentered for the same handle; engines report such a
/// call as [`EngineError::Reentrant`].
pub trait ScriptEngine {
    /// What an execution is created from.
    type Body;
    /// Values a completed execution returns.
    type Value;

    /// Allocate an execution context for `body`.
    fn create_execution(
        &mut self,
        body: Self::Body,
    ) -> Result<ExecutionHandle, EngineError>;

    /// Run an execution until it completes, yields, or fails.
    fn resume(
        &mut self,
        handle: ExecutionHandle,
        host: &mut dyn TaskHost,
    ) -> Result<ResumeOutcome<Self::Value>, EngineError>;

    /// Run `body` to completion in host context, where suspending is an error.
    fn call_main(
        &mut self,
        body: Self::Body,
        host: &mut dyn TaskHost,
    ) -> Result<(), ScriptError>;

    /// Whether `handle` still refers to a live execution context.
    fn is_alive(
        &self,
        handle: ExecutionHandle,
    ) -> bool;
}
