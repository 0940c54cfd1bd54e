//! Integration tests for the `lege` binary

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn lege(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lege"))
        .args(args)
        .output()
        .unwrap()
}

fn create_test_file(
    dir: &TempDir,
    name: &str,
    content: &str,
) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_run_file() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(
        &dir,
        "hello.lg",
        r#"spawn("hello", fn() { print("hello from", current().name) })"#,
    );

    let output = lege(&["run", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello from\thello\n");
}

#[test]
fn test_eval() {
    let output = lege(&["eval", "print(1 + 1)"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n");
}

#[test]
fn test_failing_task_exits_nonzero() {
    let output = lege(&["eval", r#"spawn("boom", fn() { error("bang") })"#]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error running Task 'boom': 0x0001: eval:1: bang"));
    assert!(stderr.contains("stack traceback:"));
}

#[test]
fn test_max_ticks_flag() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(&dir, "spin.lg", r#"spawn("spin", fn() { while true { yield() } })"#);

    let output = lege(&["run", file.to_str().unwrap(), "--max-ticks", "10"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tick limit of 10 reached"));
}

#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let config = create_test_file(&dir, "lege.toml", "[runtime]\nmax_ticks = 2\n");
    let file = create_test_file(&dir, "spin.lg", r#"spawn("spin", fn() { while true { yield() } })"#);

    let output = lege(&[
        "--config",
        config.to_str().unwrap(),
        "run",
        file.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tick limit of 2 reached"));
}

#[test]
fn test_check() {
    let dir = TempDir::new().unwrap();
    let good = create_test_file(&dir, "good.lg", "let x = 1\nprint(x)");
    let bad = create_test_file(&dir, "bad.lg", "let x = (1 + \n");

    let output = lege(&["check", good.to_str().unwrap()]);
    assert!(output.status.success());
    // Checking never runs the program.
    assert!(output.stdout.is_empty());

    let output = lege(&["check", bad.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad.lg:2:1:"));
}

#[test]
fn test_version() {
    let output = lege(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("LEGE {}", env!("CARGO_PKG_VERSION"))
    );
}
