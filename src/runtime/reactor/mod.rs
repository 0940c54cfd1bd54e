//! Reactor binding
//!
//! The scheduler needs exactly one thing from the event loop: run every
//! callback that is ready right now, without waiting for new events. The
//! callbacks receive the task registry, which is how completed events put
//! blocked tasks back into `pending`.

pub mod event_loop;

pub use event_loop::{EventLoop, RemoteHandle};

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::runtime::scheduler::TaskRegistry;

/// A callback run on the scheduler's thread during a drain.
pub type Callback = Box<dyn FnOnce(&mut TaskRegistry)>;

/// A callback submitted from another thread.
pub type RemoteCallback = Box<dyn FnOnce(&mut TaskRegistry) + Send>;

/// Reactor failures. All of them are fatal to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactorError {
    #[error("event loop is closed")]
    Closed,
}

/// A non-blocking event loop polled once per tick.
pub trait Reactor {
    /// Run all currently ready callbacks and return how many ran. Never
    /// waits for new events.
    fn drain_ready(
        &mut self,
        registry: &mut TaskRegistry,
    ) -> Result<usize, ReactorError>;

    /// Queue a callback for the next drain.
    fn call_soon(
        &mut self,
        callback: Callback,
    );

    /// Queue a callback for the first drain after `delay` has elapsed.
    fn call_after(
        &mut self,
        delay: Duration,
        callback: Callback,
    );

    /// Earliest timer deadline, if any timer is armed.
    fn next_deadline(&self) -> Option<Instant>;

    /// Whether any callback or timer is outstanding.
    fn has_pending_events(&self) -> bool;
}

#[cfg(test)]
mod tests;
