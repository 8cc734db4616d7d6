//! Configuration models for the mirror channel and logging.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed local endpoint the observer listens on.
pub const DEFAULT_MIRROR_ENDPOINT: &str = "ws://localhost:18998";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Mirror channel configuration
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Mirror channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MirrorConfig {
    /// WebSocket endpoint of the observer
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Retries per message while the connection is still being established
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Added to the delay on every further retry, in milliseconds
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

fn default_endpoint() -> String {
    DEFAULT_MIRROR_ENDPOINT.to_string()
}

const fn default_max_retries() -> u32 {
    10
}

const fn default_initial_backoff_ms() -> u64 {
    300
}

const fn default_backoff_step_ms() -> u64 {
    100
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

impl MirrorConfig {
    /// Same settings, different endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Delay before the first retry.
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Increase of the delay per retry.
    pub const fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
