//! Configuration unit tests

use std::path::Path;

use crate::util::config::{load_config, parse_config, save_config, ConfigError, RuntimeConfig};
use crate::util::logger::LogLevel;

#[test]
fn test_defaults() {
    let config = RuntimeConfig::default();
    assert!(config.scheduler.retain_dead_toplevel);
    assert_eq!(config.runtime.frame_interval_ms, 0);
    assert_eq!(config.runtime.tick_limit(), None);
    assert_eq!(config.log.level, LogLevel::Info);
    assert_eq!(config.script.max_call_depth, 200);
}

#[test]
fn test_partial_file() {
    let toml = r#"
[runtime]
max_ticks = 50

[log]
level = "debug"
"#;
    let config = parse_config(toml, Path::new("lege.toml")).unwrap();
    assert_eq!(config.runtime.tick_limit(), Some(50));
    assert_eq!(config.runtime.frame_interval_ms, 0);
    assert_eq!(config.log.level, LogLevel::Debug);
    assert!(config.scheduler.retain_dead_toplevel);
}

#[test]
fn test_bad_file_names_path() {
    let err = parse_config("[log]\nlevel = \"loud\"", Path::new("conf/lege.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Config parse error in conf/lege.toml"));
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, RuntimeConfig::default());
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("lege.toml");

    let mut config = RuntimeConfig::default();
    config.scheduler.retain_dead_toplevel = false;
    config.runtime.frame_interval_ms = 16;
    config.log.level = LogLevel::Warn;
    config.script.trace_execution = true;

    save_config(&config, &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[scheduler]"));
    assert!(text.contains("level = \"warn\""));

    assert_eq!(load_config(Some(&path)).unwrap(), config);
}

#[test]
fn test_unreadable_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    // A directory exists but cannot be read as a file.
    let err = load_config(Some(dir.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
