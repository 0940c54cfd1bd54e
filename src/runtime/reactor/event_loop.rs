//! Single-threaded event loop
//!
//! Ready callbacks run in FIFO order, timers fire in deadline order (ties in
//! arrival order), and other threads can submit work through a
//! [`RemoteHandle`]. Draining never sleeps.

use crossbeam::channel::{self, Receiver, Sender};
use std::cell::Cell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{Callback, Reactor, ReactorError, RemoteCallback};
use crate::runtime::scheduler::{TaskId, TaskRegistry};

struct Timer {
    deadline: Instant,
    seq: u64,
    callback: Callback,
}

impl PartialEq for Timer {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Default [`Reactor`].
pub struct EventLoop {
    ready: VecDeque<Callback>,
    timers: BinaryHeap<Reverse<Timer>>,
    next_seq: u64,
    remote_tx: Sender<RemoteCallback>,
    remote_rx: Receiver<RemoteCallback>,
    remote_issued: Cell<bool>,
    closed: bool,
}

impl EventLoop {
    /// Create an open, empty loop.
    pub fn new() -> Self {
        let (remote_tx, remote_rx) = channel::unbounded();
        Self {
            ready: VecDeque::new(),
            timers: BinaryHeap::new(),
            next_seq: 0,
            remote_tx,
            remote_rx,
            remote_issued: Cell::new(false),
            closed: false,
        }
    }

    /// A handle other threads can use to submit callbacks.
    pub fn remote(&self) -> RemoteHandle {
        self.remote_issued.set(true);
        RemoteHandle {
            tx: self.remote_tx.clone(),
        }
    }

    /// Whether [`EventLoop::remote`] has ever handed out a handle, so work
    /// may still arrive from another thread.
    pub fn has_remote_handles(&self) -> bool {
        self.remote_issued.get()
    }

    /// Close the loop. Every later drain fails.
    pub fn close(&mut self) {
        self.closed = true;
        self.ready.clear();
        self.timers.clear();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of armed timers.
    #[inline]
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Drain as if the current time were `now`.
    pub fn drain_at(
        &mut self,
        now: Instant,
        registry: &mut TaskRegistry,
    ) -> Result<usize, ReactorError> {
        if self.closed {
            return Err(ReactorError::Closed);
        }

        while let Ok(callback) = self.remote_rx.try_recv() {
            self.ready.push_back(callback);
        }

        while self
            .timers
            .peek()
            .is_some_and(|Reverse(timer)| timer.deadline <= now)
        {
            if let Some(Reverse(timer)) = self.timers.pop() {
                self.ready.push_back(timer.callback);
            }
        }

        let batch = std::mem::take(&mut self.ready);
        let count = batch.len();
        for callback in batch {
            callback(registry);
        }

        if count > 0 {
            debug!(callbacks = count, "event loop drained");
        }
        Ok(count)
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("ready", &self.ready.len())
            .field("timers", &self.timers.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Reactor for EventLoop {
    fn drain_ready(
        &mut self,
        registry: &mut TaskRegistry,
    ) -> Result<usize, ReactorError> {
        self.drain_at(Instant::now(), registry)
    }

    fn call_soon(
        &mut self,
        callback: Callback,
    ) {
        self.ready.push_back(callback);
    }

    fn call_after(
        &mut self,
        delay: Duration,
        callback: Callback,
    ) {
        let Some(deadline) = Instant::now().checked_add(delay) else {
            debug!(?delay, "timer deadline unrepresentable, it never fires");
            return;
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Reverse(Timer {
            deadline,
            seq,
            callback,
        }));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.peek().map(|Reverse(timer)| timer.deadline)
    }

    fn has_pending_events(&self) -> bool {
        !self.ready.is_empty() || !self.timers.is_empty() || !self.remote_rx.is_empty()
    }
}

/// Thread-safe submission handle for an [`EventLoop`].
#[derive(Clone)]
pub struct RemoteHandle {
    tx: Sender<RemoteCallback>,
}

impl RemoteHandle {
    /// Queue a callback for the loop's next drain.
    pub fn submit<F>(
        &self,
        callback: F,
    ) -> Result<(), ReactorError>
    where
        F: FnOnce(&mut TaskRegistry) + Send + 'static,
    {
        self.tx
            .send(Box::new(callback))
            .map_err(|_| ReactorError::Closed)
    }

    /// Wake a blocked task on the loop's next drain.
    pub fn wake(
        &self,
        id: TaskId,
    ) -> Result<(), ReactorError> {
        self.submit(move |registry| {
            registry.wake_id(id);
        })
    }
}

impl fmt::Debug for RemoteHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RemoteHandle").finish_non_exhaustive()
    }
}
