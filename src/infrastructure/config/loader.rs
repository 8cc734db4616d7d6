//! Hierarchical configuration loading and validation.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;
use url::Url;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Endpoint is not a ws:// or wss:// URL.
    #[error("Invalid mirror endpoint: {0}. Must be a ws:// or wss:// URL")]
    InvalidEndpoint(String),

    /// Retry budget of zero.
    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    /// First retry delay of zero.
    #[error("Invalid initial_backoff_ms: {0}. Must be positive")]
    InvalidInitialBackoff(u64),

    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown rotation policy.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Project config file, relative to the working directory.
    pub const PROJECT_CONFIG: &'static str = ".rsc-cache/config.yaml";

    /// Optional local overrides, relative to the working directory.
    pub const LOCAL_CONFIG: &'static str = ".rsc-cache/local.yaml";

    /// Environment variable prefix; nested keys are separated by `__`.
    pub const ENV_PREFIX: &'static str = "RSC_CACHE_";

    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .rsc-cache/config.yaml
    /// 3. .rsc-cache/local.yaml (optional)
    /// 4. Environment variables (`RSC_CACHE_*`, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(Self::PROJECT_CONFIG))
            .merge(Yaml::file(Self::LOCAL_CONFIG))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment variables still
    /// take precedence.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let endpoint = &config.mirror.endpoint;
        let scheme_ok = Url::parse(endpoint)
            .map(|url| matches!(url.scheme(), "ws" | "wss"))
            .unwrap_or(false);
        if !scheme_ok {
            return Err(ConfigError::InvalidEndpoint(endpoint.clone()));
        }

        if config.mirror.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.mirror.max_retries));
        }

        if config.mirror.initial_backoff_ms == 0 {
            return Err(ConfigError::InvalidInitialBackoff(
                config.mirror.initial_backoff_ms,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(
                config.logging.rotation.clone(),
            ));
        }

        Ok(())
    }
}
