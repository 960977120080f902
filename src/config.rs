//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! The compiler core itself is configuration-free; what lives here are
//! the caller-facing policy switches (whether to validate the
//! ascending-timestamp precondition before aggregating, logging) that
//! should not be hard-coded into library behavior.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub temporal: TemporalConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Temporal aggregation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TemporalConfig {
    /// Validate that time series are strictly ascending before
    /// aggregating. The aggregator itself never checks (violations give
    /// undefined numeric results); this switch makes evaluation fail
    /// loudly instead, at the cost of a scan per series.
    #[serde(default = "default_check_monotonic")]
    pub check_monotonic: bool,

    /// Default trailing window, in hours, for temporal functions called
    /// without an explicit period by interactive tools
    #[serde(default = "default_window_hours")]
    pub default_window_hours: i64,
}

fn default_check_monotonic() -> bool {
    false
}

fn default_window_hours() -> i64 {
    24
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            check_monotonic: default_check_monotonic(),
            default_window_hours: default_window_hours(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("twinscript").join("config.toml")),
            Some(PathBuf::from("/etc/twinscript/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(check) = std::env::var("TWINSCRIPT_CHECK_MONOTONIC") {
            if let Ok(value) = check.parse() {
                self.temporal.check_monotonic = value;
            }
        }
        if let Ok(hours) = std::env::var("TWINSCRIPT_DEFAULT_WINDOW_HOURS") {
            if let Ok(value) = hours.parse() {
                self.temporal.default_window_hours = value;
            }
        }
        if let Ok(level) = std::env::var("TWINSCRIPT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TWINSCRIPT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}
