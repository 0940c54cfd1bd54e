//! LEGE runtime
//!
//! Cooperative task scheduling for an embedded scripting language on a
//! single-threaded reactor.
//!
//! Scripts spawn named tasks that run one step per host tick, block until
//! something wakes them, and sleep on reactor timers:
//!
//! ```text
//! spawn("greeter", fn() {
//!     sleep(0.5)
//!     print("hello from", current().name)
//! })
//! ```
//!
//! The [`runtime::Scheduler`] is generic over the engine and the reactor;
//! [`script`] provides LegeScript and [`runtime::engine::native`] a Rust
//! closure engine.

#![warn(rust_2018_idioms)]

pub mod runtime;
pub mod script;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use runtime::{RunSummary, Runtime, RuntimeError};

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::script::CompileError;
use crate::util::config::RuntimeConfig;
use crate::util::span::SourceFile;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime name
pub const NAME: &str = "LEGE";

/// Run LegeScript source with the default configuration.
///
/// # Example
///
/// ```no_run
/// use lege::{run, Result};
///
/// fn main() -> Result<()> {
///     run(r#"spawn("hello", fn() { print("Hello, World!") })"#)?;
///     Ok(())
/// }
/// ```
pub fn run(source: &str) -> Result<RunSummary> {
    run_with_config(source, "main", &RuntimeConfig::default())
}

/// Run LegeScript source as chunk `chunk_name`.
pub fn run_with_config(
    source: &str,
    chunk_name: &str,
    config: &RuntimeConfig,
) -> Result<RunSummary> {
    let mut runtime = Runtime::new(config.clone());
    load(&mut runtime, source, chunk_name)?;
    let summary = runtime.run()?;
    debug!(
        chunk = chunk_name,
        ticks = summary.ticks,
        stalled = summary.stalled,
        "run complete"
    );
    Ok(summary)
}

/// Run a source file.
pub fn run_file(
    path: &Path,
    config: &RuntimeConfig,
) -> Result<RunSummary> {
    let source = read_source(path)?;
    run_with_config(&source, &chunk_name(path), config)
}

/// Compile a source file without running it.
pub fn check_file(path: &Path) -> Result<()> {
    let source = read_source(path)?;
    let name = chunk_name(path);
    script::compile(&source, &name).map_err(|err| describe(&err, &source, &name))?;
    debug!("{} compiled cleanly", path.display());
    Ok(())
}

fn load(
    runtime: &mut Runtime,
    source: &str,
    chunk_name: &str,
) -> Result<()> {
    match runtime.load(source, chunk_name) {
        Err(RuntimeError::Compile(err)) => Err(describe(&err, source, chunk_name)),
        other => Ok(other?),
    }
}

/// A compile error with the offending source line quoted under it.
fn describe(
    err: &CompileError,
    source: &str,
    chunk_name: &str,
) -> anyhow::Error {
    let file = SourceFile::new(chunk_name, source);
    let snippet = err
        .position()
        .and_then(|position| file.snippet(position))
        .or_else(|| {
            let line = err.line();
            let text = file.line(line)?;
            Some(format!("{} | {}", line, text))
        });
    match snippet {
        Some(snippet) => anyhow::anyhow!("{}\n{}", err, snippet),
        None => anyhow::anyhow!("{}", err),
    }
}

fn read_source(path: &Path) -> Result<String> {
    debug!("reading {}", path.display());
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

fn chunk_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
