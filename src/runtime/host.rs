//! Host façade
//!
//! [`Runtime`] wires one [`Interpreter`] and one [`EventLoop`] into a
//! [`Scheduler`] and drives it the way an application frame loop would:
//! load a chunk, run it as the main chunk, then tick until no task is
//! alive.
//!
//! ```rust
//! use lege::runtime::Runtime;
//! use lege::script::OutputBuffer;
//! use lege::util::config::RuntimeConfig;
//!
//! let out = OutputBuffer::new();
//! let mut runtime = Runtime::new(RuntimeConfig::default()).with_output(out.clone());
//! runtime
//!     .load(r#"spawn("ping", fn() { yield(); print("pong") })"#, "demo")
//!     .unwrap();
//!
//! let summary = runtime.run().unwrap();
//! assert_eq!(summary.ticks, 2);
//! assert_eq!(out.contents(), "pong\n");
//! ```

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::reactor::{EventLoop, Reactor, RemoteHandle};
use super::scheduler::{Scheduler, SchedulerError, SchedulerStats, TaskRef, TaskRegistry};
use crate::script::{CompileError, Interpreter, Value};
use crate::util::config::RuntimeConfig;

/// Wait used when every task is blocked and no timer is armed.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("no chunk loaded")]
    NoMainChunk,

    #[error("tick limit of {0} reached with tasks still alive")]
    TickLimit(u64),
}

/// How a [`Runtime::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks run
    pub ticks: u64,
    /// Scheduler statistics at the end of the run
    pub stats: SchedulerStats,
    /// Stopped with blocked tasks that nothing could wake any more
    pub stalled: bool,
    /// Tasks still blocked when the run ended
    pub blocked: usize,
}

/// A scheduler over LegeScript and the built-in event loop.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    scheduler: Scheduler<Interpreter, EventLoop>,
    /// Loaded but not yet run main chunk
    main: Option<Value>,
}

impl Runtime {
    /// Create a runtime whose scripts print to stdout.
    pub fn new(config: RuntimeConfig) -> Self {
        let interpreter = Interpreter::with_config(config.script.clone());
        let scheduler = Scheduler::with_config(config.scheduler, interpreter, EventLoop::new());
        Self {
            config,
            scheduler,
            main: None,
        }
    }

    /// Redirect script output.
    pub fn with_output(
        mut self,
        output: impl Write + 'static,
    ) -> Self {
        self.scheduler.engine_mut().set_output(output);
        self
    }

    /// Compile `source` as the next main chunk.
    pub fn load(
        &mut self,
        source: &str,
        chunk_name: &str,
    ) -> Result<(), RuntimeError> {
        let main = self.scheduler.engine().load(source, chunk_name)?;
        debug!(chunk = chunk_name, "chunk loaded");
        self.main = Some(main);
        Ok(())
    }

    /// Run the loaded main chunk in host context. Tasks it spawns become
    /// toplevel tasks.
    pub fn setup(&mut self) -> Result<(), RuntimeError> {
        let main = self.main.take().ok_or(RuntimeError::NoMainChunk)?;
        self.scheduler.call_main(main)?;
        Ok(())
    }

    /// Run one scheduler tick.
    #[inline]
    pub fn tick(&mut self) -> Result<bool, RuntimeError> {
        Ok(self.scheduler.tick()?)
    }

    /// Run the main chunk, then tick until no task is alive.
    ///
    /// Ticks are spaced by the configured frame interval. When every live
    /// task is blocked the loop sleeps until the next timer is due. If no
    /// timer is armed and no remote handle exists, nothing can ever wake
    /// those tasks and the run stops with [`RunSummary::stalled`] set.
    pub fn run(&mut self) -> Result<RunSummary, RuntimeError> {
        self.setup()?;

        let frame_interval = self.config.runtime.frame_interval();
        let limit = self.config.runtime.tick_limit();
        let mut ticks = 0;
        let mut stalled = false;

        while self.scheduler.is_alive() {
            if limit.is_some_and(|max| ticks >= max) {
                warn!("stopping after {} ticks", ticks);
                return Err(RuntimeError::TickLimit(ticks));
            }

            let started = Instant::now();
            let alive = self.tick()?;
            ticks += 1;
            if !alive {
                break;
            }

            if self.scheduler.registry().pending_len() == 0 {
                match self.scheduler.reactor().next_deadline() {
                    Some(deadline) => sleep_until(deadline),
                    None if self.scheduler.reactor().has_remote_handles() => {
                        thread::sleep(IDLE_WAIT.max(frame_interval))
                    }
                    None if !self.scheduler.reactor().has_pending_events() => {
                        warn!(
                            "{} task(s) blocked with nothing left to wake them",
                            self.scheduler.registry().blocked_len()
                        );
                        stalled = true;
                        break;
                    }
                    None => {}
                }
            } else if let Some(rest) = frame_interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }

        let stats = self.scheduler.stats();
        info!(
            ticks,
            spawned = stats.spawned,
            completed = stats.completed,
            "run finished"
        );
        Ok(RunSummary {
            ticks,
            stats,
            stalled,
            blocked: self.scheduler.registry().blocked_len(),
        })
    }

    /// Spawn a toplevel task from the host.
    pub fn spawn(
        &mut self,
        name: &str,
        body: Value,
    ) -> Result<TaskRef, RuntimeError> {
        Ok(self.scheduler.spawn(name, body)?)
    }

    /// A handle other threads can use to wake tasks.
    pub fn remote_handle(&self) -> RemoteHandle {
        self.scheduler.reactor().remote()
    }

    /// Get a script global.
    #[inline]
    pub fn global(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.scheduler.engine().global(name)
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler<Interpreter, EventLoop> {
        &self.scheduler
    }

    #[inline]
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<Interpreter, EventLoop> {
        &mut self.scheduler
    }

    #[inline]
    pub fn registry(&self) -> &TaskRegistry {
        self.scheduler.registry()
    }

    #[inline]
    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        self.scheduler.engine_mut()
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

#[cfg(test)]
mod tests;
