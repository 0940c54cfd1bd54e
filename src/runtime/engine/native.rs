//! Native step-function engine
//!
//! Task bodies are Rust closures called once per resume. A body keeps its
//! own state between calls and reports, via [`Step`], whether it yielded,
//! blocked, or finished. This is the smallest engine that satisfies the
//! binding and is what embedders use for host-side tasks.
//!
//! ```rust
//! use lege::runtime::engine::native::{self, NativeEngine, Step};
//! use lege::runtime::reactor::EventLoop;
//! use lege::runtime::scheduler::Scheduler;
//!
//! let mut scheduler = Scheduler::new(NativeEngine::new(), EventLoop::new());
//! let mut countdown = 2;
//! scheduler
//!     .spawn("countdown", native::task(move |_| {
//!         countdown -= 1;
//!         Ok(if countdown == 0 { Step::Done } else { Step::Yield })
//!     }))
//!     .unwrap();
//!
//! assert!(scheduler.tick().unwrap());
//! assert!(!scheduler.tick().unwrap());
//! ```

use std::fmt;
use std::time::Duration;

use super::{
    EngineError, ExecutionHandle, ExecutionSlots, ResumeOutcome, ScriptEngine, ScriptError,
    SuspendReason, TaskHost, UsageError,
};
use crate::runtime::scheduler::TaskRef;

/// What a native body wants after one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run again next tick.
    Yield,
    /// Wait until woken. The body must have called [`NativeContext::block`].
    Block,
    /// Finished.
    Done,
}

/// A boxed native task body.
pub type NativeBody = Box<dyn FnMut(&mut NativeContext<'_>) -> Result<Step, ScriptError>>;

/// Box a closure as a [`NativeBody`].
pub fn task<F>(body: F) -> NativeBody
where
    F: FnMut(&mut NativeContext<'_>) -> Result<Step, ScriptError> + 'static,
{
    Box::new(body)
}

/// The view a native body has of the scheduler while it runs.
pub struct NativeContext<'a> {
    slots: &'a mut ExecutionSlots<NativeBody>,
    host: &'a mut dyn TaskHost,
}

impl NativeContext<'_> {
    /// Spawn a child of the running task (or a toplevel task in host context).
    pub fn spawn<F>(
        &mut self,
        name: &str,
        body: F,
    ) -> Result<TaskRef, ScriptError>
    where
        F: FnMut(&mut NativeContext<'_>) -> Result<Step, ScriptError> + 'static,
    {
        let handle = self
            .slots
            .insert(Box::new(body))
            .map_err(|e| ScriptError::new(e.to_string()))?;
        Ok(self.host.spawn(name, handle))
    }

    /// Block the running task. Return the result from the body.
    pub fn block(&mut self) -> Result<Step, ScriptError> {
        self.host.block()?;
        Ok(Step::Block)
    }

    /// Arm a reactor timer that wakes the running task after `delay`.
    pub fn wake_after(
        &mut self,
        delay: Duration,
    ) -> Result<(), ScriptError> {
        self.host.wake_after(delay)?;
        Ok(())
    }

    /// Block the running task until the reactor wakes it after `delay`.
    pub fn sleep(
        &mut self,
        delay: Duration,
    ) -> Result<Step, ScriptError> {
        self.wake_after(delay)?;
        self.block()
    }

    /// The running task, if any.
    pub fn current(&self) -> Option<TaskRef> {
        self.host.current_task()
    }
}

/// Engine whose executions are native step functions.
#[derive(Default)]
pub struct NativeEngine {
    slots: ExecutionSlots<NativeBody>,
}

impl NativeEngine {
    /// Create an engine with no executions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of execution contexts not yet finished.
    pub fn live_executions(&self) -> usize {
        self.slots.len()
    }
}

impl fmt::Debug for NativeEngine {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("NativeEngine")
            .field("slots", &self.slots)
            .finish()
    }
}

impl ScriptEngine for NativeEngine {
    type Body = NativeBody;
    type Value = ();

    fn create_execution(
        &mut self,
        body: NativeBody,
    ) -> Result<ExecutionHandle, EngineError> {
        self.slots.insert(body)
    }

    fn resume(
        &mut self,
        handle: ExecutionHandle,
        host: &mut dyn TaskHost,
    ) -> Result<ResumeOutcome<()>, EngineError> {
        let mut body = self.slots.checkout(handle)?;
        let result = {
            let mut ctx = NativeContext {
                slots: &mut self.slots,
                host,
            };
            body(&mut ctx)
        };

        Ok(match result {
            Ok(Step::Yield) => {
                self.slots.checkin(handle, body)?;
                ResumeOutcome::Suspended(SuspendReason::Yield)
            }
            Ok(Step::Block) => {
                self.slots.checkin(handle, body)?;
                ResumeOutcome::Suspended(SuspendReason::Block)
            }
            Ok(Step::Done) => {
                self.slots.release(handle);
                ResumeOutcome::Completed(Vec::new())
            }
            Err(err) => {
                self.slots.release(handle);
                ResumeOutcome::Failed(err)
            }
        })
    }

    fn call_main(
        &mut self,
        mut body: NativeBody,
        host: &mut dyn TaskHost,
    ) -> Result<(), ScriptError> {
        let mut ctx = NativeContext {
            slots: &mut self.slots,
            host,
        };
        match body(&mut ctx)? {
            Step::Done => Ok(()),
            Step::Yield => Err(UsageError::YieldOutsideTask.into()),
            Step::Block => Err(UsageError::BlockOutsideTask.into()),
        }
    }

    fn is_alive(
        &self,
        handle: ExecutionHandle,
    ) -> bool {
        self.slots.contains(handle)
    }
}
