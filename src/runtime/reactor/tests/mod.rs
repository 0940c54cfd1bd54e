//! Event loop unit tests

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use crate::runtime::engine::ExecutionHandle;
use crate::runtime::reactor::{EventLoop, Reactor, ReactorError};
use crate::runtime::scheduler::TaskRegistry;

fn recorder() -> (Rc<RefCell<Vec<u32>>>, impl Fn(u32) -> Box<dyn FnOnce(&mut TaskRegistry)>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let make = move |n: u32| -> Box<dyn FnOnce(&mut TaskRegistry)> {
        let sink = Rc::clone(&sink);
        Box::new(move |_: &mut TaskRegistry| sink.borrow_mut().push(n))
    };
    (log, make)
}

#[test]
fn test_ready_callbacks_run_in_order() {
    let mut event_loop = EventLoop::new();
    let mut registry = TaskRegistry::new();
    let (log, make) = recorder();

    event_loop.call_soon(make(1));
    event_loop.call_soon(make(2));
    event_loop.call_soon(make(3));
    assert!(event_loop.has_pending_events());

    assert_eq!(event_loop.drain_ready(&mut registry), Ok(3));
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
    assert!(!event_loop.has_pending_events());
    assert_eq!(event_loop.drain_ready(&mut registry), Ok(0));
}

#[test]
fn test_timers_fire_in_deadline_order() {
    let mut event_loop = EventLoop::new();
    let mut registry = TaskRegistry::new();
    let (log, make) = recorder();

    event_loop.call_after(Duration::from_millis(30), make(3));
    event_loop.call_after(Duration::from_millis(10), make(1));
    event_loop.call_after(Duration::from_millis(20), make(2));
    assert_eq!(event_loop.timer_count(), 3);

    let now = Instant::now();
    assert_eq!(event_loop.drain_at(now, &mut registry), Ok(0));

    let later = now + Duration::from_millis(25);
    assert_eq!(event_loop.drain_at(later, &mut registry), Ok(2));
    assert_eq!(*log.borrow(), vec![1, 2]);
    assert_eq!(event_loop.timer_count(), 1);

    let deadline = event_loop.next_deadline().unwrap();
    assert!(deadline > later);
    assert_eq!(event_loop.drain_at(deadline, &mut registry), Ok(1));
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
    assert!(event_loop.next_deadline().is_none());
}

#[test]
fn test_timer_wakes_blocked_task() {
    let mut event_loop = EventLoop::new();
    let mut registry = TaskRegistry::new();
    let task = registry.register("sleeper", ExecutionHandle::new(0, 0), None);
    registry.block(&task);

    let waker = Rc::clone(&task);
    event_loop.call_after(
        Duration::ZERO,
        Box::new(move |registry: &mut TaskRegistry| {
            registry.wake(&waker);
        }),
    );

    event_loop
        .drain_at(Instant::now() + Duration::from_millis(1), &mut registry)
        .unwrap();
    assert!(task.is_pending());
    assert!(registry.is_pending(&task));
}

#[test]
fn test_remote_submission() {
    let mut event_loop = EventLoop::new();
    let mut registry = TaskRegistry::new();
    let task = registry.register("remote", ExecutionHandle::new(0, 0), None);
    registry.block(&task);

    let remote = event_loop.remote();
    let id = task.id();
    thread::spawn(move || {
        remote.wake(id).unwrap();
    })
    .join()
    .unwrap();

    assert!(event_loop.has_pending_events());
    assert_eq!(event_loop.drain_ready(&mut registry), Ok(1));
    assert!(task.is_pending());
}

#[test]
fn test_closed_loop_fails_drain() {
    let mut event_loop = EventLoop::new();
    let mut registry = TaskRegistry::new();
    let (log, make) = recorder();
    event_loop.call_soon(make(1));

    event_loop.close();
    assert!(event_loop.is_closed());
    assert_eq!(
        event_loop.drain_ready(&mut registry),
        Err(ReactorError::Closed)
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn test_remote_submit_after_drop_fails() {
    let event_loop = EventLoop::new();
    let remote = event_loop.remote();
    drop(event_loop);
    assert_eq!(remote.submit(|_| {}), Err(ReactorError::Closed));
}

#[test]
fn test_timer_past_clock_range_is_dropped() {
    let mut event_loop = EventLoop::new();
    let mut registry = TaskRegistry::new();
    let (log, make) = recorder();

    event_loop.call_after(Duration::MAX, make(1));
    event_loop.call_after(Duration::from_secs(u64::MAX / 2), make(2));
    event_loop.call_after(Duration::ZERO, make(3));
    assert_eq!(event_loop.timer_count(), 1);

    assert_eq!(event_loop.drain_ready(&mut registry), Ok(1));
    assert_eq!(*log.borrow(), vec![3]);
    assert!(!event_loop.has_pending_events());
    assert_eq!(event_loop.next_deadline(), None);
}

#[test]
fn test_remote_handle_issuance_is_tracked() {
    let event_loop = EventLoop::new();
    assert!(!event_loop.has_remote_handles());

    drop(event_loop.remote());
    assert!(event_loop.has_remote_handles());
}
