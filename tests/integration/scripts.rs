//! LegeScript programs run end to end through the runtime

use std::fs;

use lege::runtime::{Runtime, RuntimeError, SchedulerError};
use lege::script::OutputBuffer;
use lege::util::config::RuntimeConfig;

fn run_script(source: &str) -> (OutputBuffer, Result<lege::RunSummary, RuntimeError>) {
    let out = OutputBuffer::new();
    let mut runtime = Runtime::new(RuntimeConfig::default()).with_output(out.clone());
    let result = runtime.load(source, "test").and_then(|()| runtime.run());
    (out, result)
}

#[test]
fn test_demo_script() {
    let source = fs::read_to_string("docs/examples/tasks.lg").unwrap();
    let (out, result) = run_script(&source);
    let summary = result.unwrap();

    let lines = out.lines();
    assert_eq!(lines[0], "main chunk done; waiter is\tpending");
    for expected in [
        "alpha\tstep\t0",
        "beta\tstep\t2",
        "waiter sleeping",
        "waiter woke up",
        "spawned\tTask 'child': 0x0004",
        "child of\twaiter",
    ] {
        assert!(lines.iter().any(|l| l == expected), "missing {:?} in {:?}", expected, lines);
    }
    let woke = lines.iter().position(|l| l == "waiter woke up").unwrap();
    let child = lines.iter().position(|l| l == "child of\twaiter").unwrap();
    assert!(woke < child);
    assert_eq!(summary.stats.spawned, 4);
    assert_eq!(summary.stats.completed, 4);
    assert!(!summary.stalled);
}

#[test]
fn test_unwoken_consumer_stalls() {
    let source = r#"
let queue = 0
let consumer = spawn("consumer", fn() {
    while queue < 3 {
        if queue == 0 { block() } else { print("took", queue) queue = queue + 1 }
    }
    print("consumer done")
})
spawn("producer", fn() {
    yield()
    queue = 1
    print("produced")
})
"#;
    let (out, result) = run_script(source);
    let summary = result.unwrap();
    // The consumer blocks and nobody wakes it.
    assert!(summary.stalled);
    assert_eq!(out.contents(), "produced\n");
}

#[test]
fn test_uncaught_error_in_task() {
    let source = r#"
fn divide(a, b) {
    if b == 0 { error("division by zero") }
    return a / b
}
spawn("math", fn() {
    print(divide(6, 3))
    print(divide(1, 0))
})
"#;
    let (out, result) = run_script(source);
    assert_eq!(out.contents(), "2\n");

    let err = result.unwrap_err();
    let RuntimeError::Scheduler(SchedulerError::TaskFailed { task, error }) = &err else {
        panic!("unexpected error: {:?}", err);
    };
    assert_eq!(task, "Task 'math': 0x0001");
    assert_eq!(error.message, "test:3: division by zero");
    assert_eq!(
        error.traceback,
        vec![
            "test:3: in function 'divide'".to_string(),
            "test:8: in function <test:6>".to_string(),
        ]
    );
}

#[test]
fn test_error_in_main_chunk() {
    let (_, result) = run_script("let x = 1\nspawn(x, x)");
    let err = result.unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #1 to 'spawn' (string expected, got number)\n\
         stack traceback:\n\ttest:2: in main chunk"
    );
}

#[test]
fn test_run_with_config_limits_ticks() {
    let mut config = RuntimeConfig::default();
    config.runtime.max_ticks = 3;
    let err = lege::run_with_config(
        r#"spawn("forever", fn() { while true { yield() } })"#,
        "spin",
        &config,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RuntimeError>(),
        Some(RuntimeError::TickLimit(3))
    ));
}

#[test]
fn test_compile_error_quotes_source() {
    let err = lege::run_with_config("let a = 1\nlet = 2", "bad", &RuntimeConfig::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad:2:5: expected identifier, found '='\n |\n2 | let = 2\n |     ^"
    );
}
