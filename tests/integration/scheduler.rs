//! Scheduler driven through the public API with native task bodies

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use lege::runtime::engine::native::{self, NativeEngine, Step};
use lege::runtime::engine::ScriptError;
use lege::runtime::reactor::EventLoop;
use lege::runtime::scheduler::{Scheduler, SchedulerConfig, SchedulerError, TaskState};

#[test]
fn test_worker_thread_wakes_blocked_task() {
    let mut scheduler = Scheduler::new(NativeEngine::new(), EventLoop::new());
    let remote = scheduler.reactor().remote();
    let log = Rc::new(RefCell::new(Vec::new()));

    let (job_tx, job_rx) = mpsc::channel::<u64>();
    let result = Rc::new(RefCell::new(None));

    let seen = Rc::clone(&log);
    let slot = Rc::clone(&result);
    let mut submitted = false;
    let task = scheduler
        .spawn(
            "fetch",
            native::task(move |ctx| {
                if !submitted {
                    submitted = true;
                    seen.borrow_mut().push("submit");
                    return ctx.block();
                }
                seen.borrow_mut().push("resume");
                *slot.borrow_mut() = Some(ctx.current().map(|t| t.name().to_string()));
                Ok(Step::Done)
            }),
        )
        .unwrap();

    // First tick: the task blocks waiting for the worker.
    assert!(scheduler.tick().unwrap());
    assert_eq!(task.state(), TaskState::Blocked);

    let id = task.id();
    job_tx.send(21).unwrap();
    let worker = thread::spawn(move || {
        let input = job_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(5));
        remote.wake(id).unwrap();
        input * 2
    });
    assert_eq!(worker.join().unwrap(), 42);

    assert!(!scheduler.tick().unwrap());
    assert_eq!(*log.borrow(), vec!["submit", "resume"]);
    assert_eq!(*result.borrow(), Some(Some("fetch".to_string())));
}

#[test]
fn test_child_tree_completes() {
    let mut scheduler = Scheduler::new(NativeEngine::new(), EventLoop::new());
    let order = Rc::new(RefCell::new(Vec::new()));

    let seen = Rc::clone(&order);
    let parent = scheduler
        .spawn(
            "parent",
            native::task(move |ctx| {
                for i in 0..3 {
                    let seen = Rc::clone(&seen);
                    ctx.spawn(&format!("child{}", i), move |ctx| {
                        let name = ctx.current().map(|t| t.name().to_string()).unwrap_or_default();
                        seen.borrow_mut().push(name);
                        Ok(Step::Done)
                    })?;
                }
                Ok(Step::Done)
            }),
        )
        .unwrap();

    assert!(scheduler.tick().unwrap());
    assert_eq!(parent.child_count(), 3);
    assert_eq!(scheduler.registry().toplevel_len(), 1);
    assert_eq!(scheduler.registry().pending_len(), 3);

    assert!(!scheduler.tick().unwrap());
    let mut names = order.borrow().clone();
    names.sort();
    assert_eq!(names, vec!["child0", "child1", "child2"]);
    assert!(parent.children().iter().all(|child| child.is_dead()));
}

#[test]
fn test_sleeping_task_wakes_after_deadline() {
    let mut scheduler = Scheduler::new(NativeEngine::new(), EventLoop::new());
    let mut slept = false;
    let task = scheduler
        .spawn(
            "napper",
            native::task(move |ctx| {
                if !slept {
                    slept = true;
                    return ctx.sleep(Duration::from_millis(20));
                }
                Ok(Step::Done)
            }),
        )
        .unwrap();

    assert!(scheduler.tick().unwrap());
    assert!(scheduler.tick().unwrap());
    assert_eq!(task.state(), TaskState::Blocked);

    thread::sleep(Duration::from_millis(30));
    assert!(!scheduler.tick().unwrap());
    assert!(task.is_dead());
}

#[test]
fn test_failure_names_task() {
    let mut scheduler = Scheduler::new(NativeEngine::new(), EventLoop::new());
    scheduler
        .spawn("ok", native::task(|_| Ok(Step::Yield)))
        .unwrap();
    scheduler
        .spawn("bad", native::task(|_| Err(ScriptError::new("disk on fire"))))
        .unwrap();

    let err = scheduler.tick().unwrap_err();
    assert!(matches!(err, SchedulerError::TaskFailed { .. }));
    assert_eq!(err.to_string(), "Error running Task 'bad': 0x0002: disk on fire");
    // The scheduler stays usable for the surviving task.
    assert!(scheduler.tick().unwrap());
}

#[test]
fn test_dead_toplevel_retired_when_configured() {
    let config = SchedulerConfig {
        retain_dead_toplevel: false,
    };
    let mut scheduler = Scheduler::with_config(config, NativeEngine::new(), EventLoop::new());
    scheduler
        .spawn("short", native::task(|_| Ok(Step::Done)))
        .unwrap();

    assert!(!scheduler.tick().unwrap());
    assert_eq!(scheduler.registry().toplevel_len(), 0);
}
