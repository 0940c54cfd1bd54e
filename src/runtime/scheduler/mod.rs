//! Cooperative task scheduler
//!
//! One [`Scheduler`] drives every task of a host. The host calls
//! [`Scheduler::tick`] once per frame; a tick drains the reactor, resumes
//! each pending task exactly once, and reports whether any task is still
//! alive. Everything runs on the host's thread.

mod context;
pub mod errors;
pub mod registry;
pub mod task;

pub use errors::SchedulerError;
pub use registry::TaskRegistry;
pub use task::{Task, TaskField, TaskFieldError, TaskId, TaskRef, TaskState};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use self::context::TaskContext;
use crate::runtime::engine::{ResumeOutcome, ScriptEngine, SuspendReason, TaskHost};
use crate::runtime::reactor::Reactor;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Keep dead toplevel tasks in the toplevel set. When off, they are
    /// retired at the end of the tick they died in.
    pub retain_dead_toplevel: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retain_dead_toplevel: true,
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Completed ticks.
    pub ticks: u64,
    /// Task resumes.
    pub resumes: u64,
    /// Tasks spawned, by the host or by other tasks.
    pub spawned: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Pending -> Blocked transitions.
    pub blocked: u64,
    /// Blocked -> Pending transitions.
    pub woken: u64,
}

/// Single-threaded cooperative scheduler over an engine and a reactor.
#[derive(Debug)]
pub struct Scheduler<E, R> {
    /// Configuration.
    config: SchedulerConfig,
    /// Embedded scripting engine.
    engine: E,
    /// Event loop drained once per tick.
    reactor: R,
    /// Task bookkeeping.
    registry: TaskRegistry,
    /// Statistics.
    stats: SchedulerStats,
}

impl<E: ScriptEngine, R: Reactor> Scheduler<E, R> {
    /// Create a scheduler with default config.
    #[inline]
    pub fn new(
        engine: E,
        reactor: R,
    ) -> Self {
        Self::with_config(SchedulerConfig::default(), engine, reactor)
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config(
        config: SchedulerConfig,
        engine: E,
        reactor: R,
    ) -> Self {
        Self {
            config,
            engine,
            reactor,
            registry: TaskRegistry::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Spawn a toplevel task from the host.
    pub fn spawn(
        &mut self,
        name: &str,
        body: E::Body,
    ) -> Result<TaskRef, SchedulerError> {
        let handle = self.engine.create_execution(body)?;
        let mut ctx = TaskContext {
            registry: &mut self.registry,
            reactor: &mut self.reactor,
            stats: &mut self.stats,
            current: None,
        };
        Ok(ctx.spawn(name, handle))
    }

    /// Run `body` to completion in host context. Tasks it spawns are
    /// toplevel; blocking or yielding is an error.
    pub fn call_main(
        &mut self,
        body: E::Body,
    ) -> Result<(), SchedulerError> {
        let mut ctx = TaskContext {
            registry: &mut self.registry,
            reactor: &mut self.reactor,
            stats: &mut self.stats,
            current: None,
        };
        self.engine.call_main(body, &mut ctx).map_err(|err| {
            error!("main chunk failed: {}", err);
            SchedulerError::Main(err)
        })
    }

    /// Run one scheduling step. Returns whether any task is still pending
    /// or blocked.
    pub fn tick(&mut self) -> Result<bool, SchedulerError> {
        let drained = self.reactor.drain_ready(&mut self.registry).map_err(|err| {
            error!("event loop failed: {}", err);
            SchedulerError::Reactor(err)
        })?;

        let snapshot = self.registry.pending_snapshot();
        for task in &snapshot {
            if task.is_dead() {
                return Err(SchedulerError::ResumeDead {
                    task: task.to_string(),
                });
            }
            // Blocked by a sibling's callback or already resumed elsewhere.
            if !task.is_pending() {
                continue;
            }
            if let Err(err) = self.resume_task(task) {
                self.registry.remove_dead_pending();
                return Err(err);
            }
        }

        self.registry.remove_dead_pending();
        if !self.config.retain_dead_toplevel {
            self.registry.retire_dead_toplevel();
        }
        let purged = self.registry.purge();

        self.stats.ticks += 1;
        debug!(
            tick = self.stats.ticks,
            drained,
            resumed = snapshot.len(),
            pending = self.registry.pending_len(),
            blocked = self.registry.blocked_len(),
            purged,
            "tick"
        );
        Ok(self.registry.is_alive())
    }

    fn resume_task(
        &mut self,
        task: &TaskRef,
    ) -> Result<(), SchedulerError> {
        let mut ctx = TaskContext {
            registry: &mut self.registry,
            reactor: &mut self.reactor,
            stats: &mut self.stats,
            current: Some(task.handle()),
        };
        let outcome = self.engine.resume(task.handle(), &mut ctx);
        self.stats.resumes += 1;

        match outcome {
            Ok(ResumeOutcome::Completed(_)) => {
                self.registry.mark_dead(task);
                self.stats.completed += 1;
                Ok(())
            }
            Ok(ResumeOutcome::Suspended(SuspendReason::Yield)) => Ok(()),
            Ok(ResumeOutcome::Suspended(SuspendReason::Block)) => {
                // Engines block through the host; this catches one that did not.
                if task.is_pending() && self.registry.block(task) {
                    self.stats.blocked += 1;
                }
                Ok(())
            }
            Ok(ResumeOutcome::Failed(err)) => {
                self.registry.mark_dead(task);
                error!("{} failed: {}", task, err);
                Err(SchedulerError::TaskFailed {
                    task: task.to_string(),
                    error: err,
                })
            }
            Err(err) => {
                self.registry.mark_dead(task);
                error!("{} failed: {}", task, err);
                Err(SchedulerError::Engine(err))
            }
        }
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get statistics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            woken: self.registry.woken(),
            ..self.stats
        }
    }

    /// Get the task registry.
    #[inline]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Get the task registry mutably, e.g. to wake tasks from the host.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut TaskRegistry {
        &mut self.registry
    }

    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    #[inline]
    pub fn reactor(&self) -> &R {
        &self.reactor
    }

    #[inline]
    pub fn reactor_mut(&mut self) -> &mut R {
        &mut self.reactor
    }

    /// Whether any task is pending or blocked.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.registry.is_alive()
    }
}

#[cfg(test)]
mod tests;
