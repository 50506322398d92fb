//! Configuration file loading for the analyzer.
//!
//! Settings come from a TOML file, `analyzer.toml` in the current directory
//! by default. Every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::AnalysisConfig;
use crate::engine::SessionConfig;
use crate::launcher::platform_binary_name;
use crate::scheduler::SchedulerConfig;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The `[engine]` section.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Engine executable. Defaults to the platform's Stockfish binary
    /// name, looked up in `PATH`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    #[serde(default = "default_quit_grace_ms")]
    pub quit_grace_ms: u64,
    #[serde(default = "default_multipv")]
    pub multipv: u32,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_hash_mb")]
    pub hash_mb: u32,
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_stop_grace_ms() -> u64 {
    2_000
}

fn default_quit_grace_ms() -> u64 {
    1_000
}

fn default_multipv() -> u32 {
    2
}

fn default_threads() -> u32 {
    1
}

fn default_hash_mb() -> u32 {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            quit_grace_ms: default_quit_grace_ms(),
            multipv: default_multipv(),
            threads: default_threads(),
            hash_mb: default_hash_mb(),
        }
    }
}

impl EngineConfig {
    /// The configured engine path, or the platform default.
    pub fn engine_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(platform_binary_name()))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            quit_grace: Duration::from_millis(self.quit_grace_ms),
            multipv: self.multipv,
            threads: self.threads,
            hash_mb: self.hash_mb,
        }
    }
}

/// The `[scheduler]` section.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerSettings {
    pub base_timeout_ms: u64,
    pub per_depth_ms: u64,
    pub max_timeout_ms: u64,
    pub depth_decrement: u32,
    pub min_depth: u32,
    pub max_attempts: u32,
    pub restart_after_failures: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            base_timeout_ms: 15_000,
            per_depth_ms: 2_000,
            max_timeout_ms: 60_000,
            depth_decrement: 4,
            min_depth: 8,
            max_attempts: 3,
            restart_after_failures: 1,
        }
    }
}

impl SchedulerSettings {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            base_timeout: Duration::from_millis(self.base_timeout_ms),
            per_depth: Duration::from_millis(self.per_depth_ms),
            max_timeout: Duration::from_millis(self.max_timeout_ms),
            depth_decrement: self.depth_decrement,
            min_depth: self.min_depth,
            max_attempts: self.max_attempts,
            restart_after_failures: self.restart_after_failures,
        }
    }
}

/// Main analyzer configuration structure.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl AnalyzerConfig {
    /// Loads the configuration.
    ///
    /// With an explicit path the file must exist. Without one,
    /// [`Self::config_path()`] is used and a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read,
    /// [`ConfigError::ParseError`] if it is not valid TOML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn config_path() -> PathBuf {
        PathBuf::from("analyzer.toml")
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.engine.multipv >= 1, "engine.multipv must be at least 1"),
            (self.engine.threads >= 1, "engine.threads must be at least 1"),
            (self.scheduler.max_attempts >= 1, "scheduler.max_attempts must be at least 1"),
            (self.scheduler.min_depth >= 1, "scheduler.min_depth must be at least 1"),
            (
                self.scheduler.max_timeout_ms >= self.scheduler.base_timeout_ms,
                "scheduler.max_timeout_ms must not be below base_timeout_ms",
            ),
            (self.analysis.depth >= 1, "analysis.depth must be at least 1"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(ConfigError::Invalid(message.to_string())),
            None => Ok(()),
        }
    }
}
