//! LEGE runtime configuration
//!
//! Every section is optional; missing keys take their defaults.
//!
//! ```toml
//! [scheduler]
//! retain_dead_toplevel = true
//!
//! [runtime]
//! frame_interval_ms = 16
//! max_ticks = 100000
//!
//! [log]
//! level = "info"
//!
//! [script]
//! max_call_depth = 200
//! trace_execution = false
//! ```
//!
//! # Usage
//!
//! ```rust
//! use lege::util::config::{load_config, RuntimeConfig};
//!
//! // A missing file yields the defaults.
//! let config = load_config(Some("does-not-exist.toml".as_ref())).unwrap();
//! assert_eq!(config, RuntimeConfig::default());
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::runtime::scheduler::SchedulerConfig;
use crate::script::InterpreterConfig;
use crate::util::logger::LogLevel;

/// Project-level file name looked up in the working directory.
pub const CONFIG_FILE: &str = "lege.toml";

/// Full runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Host loop settings
    #[serde(default)]
    pub runtime: LoopConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Interpreter settings
    #[serde(default)]
    pub script: InterpreterConfig,
}

/// Host loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Minimum time between ticks, in milliseconds. Zero ticks as fast as
    /// possible.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Give up after this many ticks. Zero means no limit.
    #[serde(default)]
    pub max_ticks: u64,
}

fn default_frame_interval_ms() -> u64 {
    0
}

impl LoopConfig {
    #[inline]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// The tick limit, if there is one.
    #[inline]
    pub fn tick_limit(&self) -> Option<u64> {
        (self.max_ticks > 0).then_some(self.max_ticks)
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            max_ticks: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// `./lege.toml`, if it exists.
pub fn find_config() -> Option<PathBuf> {
    let path = PathBuf::from(CONFIG_FILE);
    path.is_file().then_some(path)
}

/// Parse configuration from TOML text.
pub fn parse_config(
    content: &str,
    path: &Path,
) -> Result<RuntimeConfig, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from `path`, or from `./lege.toml` when no path is
/// given. Returns the defaults if the file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(find_config) {
        Some(p) => p,
        None => return Ok(RuntimeConfig::default()),
    };

    if !path.exists() {
        debug!("no config at {}, using defaults", path.display());
        return Ok(RuntimeConfig::default());
    }

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&content, &path)?;
    debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Save configuration as pretty TOML, creating parent directories.
pub fn save_config(
    config: &RuntimeConfig,
    path: &Path,
) -> Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_error)?;
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(path, content).map_err(io_error)?;

    Ok(())
}

#[cfg(test)]
mod tests;
