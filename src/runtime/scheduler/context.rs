//! The scheduler as an engine sees it during a resume.

use std::time::Duration;

use super::{SchedulerStats, TaskRef, TaskRegistry};
use crate::runtime::engine::{ExecutionHandle, TaskHost, UsageError};
use crate::runtime::reactor::Reactor;

/// Borrowed view of the scheduler, built fresh for every resume.
///
/// `current` is the handle being resumed, `None` in host context.
pub(crate) struct TaskContext<'a, R> {
    pub(crate) registry: &'a mut TaskRegistry,
    pub(crate) reactor: &'a mut R,
    pub(crate) stats: &'a mut SchedulerStats,
    pub(crate) current: Option<ExecutionHandle>,
}

impl<R: Reactor> TaskContext<'_, R> {
    fn running(&self) -> Option<TaskRef> {
        self.current
            .and_then(|handle| self.registry.by_handle(handle))
    }
}

impl<R: Reactor> TaskHost for TaskContext<'_, R> {
    fn current_task(&self) -> Option<TaskRef> {
        self.running()
    }

    fn spawn(
        &mut self,
        name: &str,
        handle: ExecutionHandle,
    ) -> TaskRef {
        let parent = self.running();
        self.stats.spawned += 1;
        self.registry.register(name, handle, parent.as_ref())
    }

    fn block(&mut self) -> Result<(), UsageError> {
        let task = self.running().ok_or(UsageError::BlockOutsideTask)?;
        if self.registry.block(&task) {
            self.stats.blocked += 1;
        }
        Ok(())
    }

    fn wake_after(
        &mut self,
        delay: Duration,
    ) -> Result<(), UsageError> {
        let task = self.running().ok_or(UsageError::SleepOutsideTask)?;
        self.reactor.call_after(
            delay,
            Box::new(move |registry: &mut TaskRegistry| {
                registry.wake(&task);
            }),
        );
        Ok(())
    }
}
