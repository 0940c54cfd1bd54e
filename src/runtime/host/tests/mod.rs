//! Runtime façade tests

use std::thread;
use std::time::Duration;

use crate::runtime::{Runtime, RuntimeError};
use crate::script::{CompileError, OutputBuffer, Value};
use crate::util::config::RuntimeConfig;

fn runtime() -> (OutputBuffer, Runtime) {
    let out = OutputBuffer::new();
    let runtime = Runtime::new(RuntimeConfig::default()).with_output(out.clone());
    (out, runtime)
}

#[test]
fn test_run_until_idle() {
    let (out, mut runtime) = runtime();
    runtime
        .load(
            r#"
spawn("a", fn() { print("a"); yield(); print("a again") })
spawn("b", fn() { print("b") })
"#,
            "main",
        )
        .unwrap();

    let summary = runtime.run().unwrap();
    assert_eq!(summary.ticks, 2);
    assert!(!summary.stalled);
    assert_eq!(summary.stats.spawned, 2);
    assert_eq!(summary.stats.completed, 2);
    assert_eq!(out.lines(), vec!["a", "b", "a again"]);
}

#[test]
fn test_setup_without_chunk() {
    let (_, mut runtime) = runtime();
    assert!(matches!(runtime.setup(), Err(RuntimeError::NoMainChunk)));
}

#[test]
fn test_load_reports_compile_error() {
    let (_, mut runtime) = runtime();
    let err = runtime.load("print(", "broken").unwrap_err();
    assert!(matches!(err, RuntimeError::Compile(CompileError::Parse { .. })));
    assert!(err.to_string().starts_with("broken:1:"));
}

#[test]
fn test_tick_limit() {
    let mut config = RuntimeConfig::default();
    config.runtime.max_ticks = 5;
    let mut runtime = Runtime::new(config).with_output(OutputBuffer::new());
    runtime
        .load(r#"spawn("spin", fn() { while true { yield() } })"#, "main")
        .unwrap();

    assert!(matches!(runtime.run(), Err(RuntimeError::TickLimit(5))));
    assert_eq!(runtime.scheduler().stats().ticks, 5);
}

#[test]
fn test_stalled_run_stops() {
    let (out, mut runtime) = runtime();
    runtime
        .load(r#"spawn("stuck", fn() { block(); print("never") })"#, "main")
        .unwrap();

    let summary = runtime.run().unwrap();
    assert!(summary.stalled);
    assert_eq!(summary.blocked, 1);
    assert_eq!(summary.ticks, 1);
    assert_eq!(runtime.registry().blocked_len(), 1);
    assert!(out.is_empty());
}

#[test]
fn test_sleep_waits_for_timer() {
    let (out, mut runtime) = runtime();
    runtime
        .load(r#"spawn("napper", fn() { sleep(0.01); print("rested") })"#, "main")
        .unwrap();

    let summary = runtime.run().unwrap();
    assert!(!summary.stalled);
    assert_eq!(out.contents(), "rested\n");
}

#[test]
fn test_remote_wake_from_thread() {
    let (out, mut runtime) = runtime();
    runtime
        .load(r#"let waiter = spawn("waiter", fn() { block(); print("woken") })"#, "main")
        .unwrap();
    runtime.setup().unwrap();

    assert!(runtime.tick().unwrap());
    let id = runtime
        .global("waiter")
        .and_then(Value::as_task)
        .map(|task| task.id())
        .unwrap();

    let remote = runtime.remote_handle();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        remote.wake(id).unwrap();
    })
    .join()
    .unwrap();

    assert!(!runtime.tick().unwrap());
    assert_eq!(out.contents(), "woken\n");
}

#[test]
fn test_run_waits_for_handle_taken_from_event_loop() {
    let (out, mut runtime) = runtime();
    runtime
        .load(r#"spawn("waiter", fn() { block(); print("woken") })"#, "main")
        .unwrap();

    let remote = runtime.scheduler().reactor().remote();
    let waker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        remote
            .submit(|registry| {
                for task in registry.blocked() {
                    registry.wake(&task);
                }
            })
            .unwrap();
    });

    let summary = runtime.run().unwrap();
    waker.join().unwrap();
    assert!(!summary.stalled);
    assert_eq!(summary.blocked, 0);
    assert_eq!(out.contents(), "woken\n");
}

#[test]
fn test_host_spawn() {
    let (out, mut runtime) = runtime();
    runtime.load(r#"fn job() { print("job") }"#, "main").unwrap();
    runtime.setup().unwrap();

    let body = runtime.global("job").cloned().unwrap();
    let task = runtime.spawn("job", body).unwrap();
    assert!(runtime.registry().is_toplevel(&task));
    assert!(!runtime.tick().unwrap());
    assert_eq!(out.contents(), "job\n");
}
