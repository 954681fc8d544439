//! Configuration management for the sync bridge
//!
//! This module provides environment-based configuration management with
//! support for defaults, TOML files and validation.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bridge behaviour
    pub bridge: BridgeConfig,

    /// Record store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Replaces every secret in debug dumps
    pub debug_secret_placeholder: String,

    /// Batches buffered for asynchronous change subscribers
    pub broadcast_capacity: usize,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Enable WAL (Write-Ahead Log)
    pub enable_wal: bool,

    /// How long a statement waits on a locked database
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { debug_secret_placeholder: "hidden".to_string(), broadcast_capacity: 64 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./syncbridge.db"),
            enable_wal: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json_format: false, with_timestamp: true, with_target: true }
    }
}

fn parse_env<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(value) = env::var(var) else {
        return Ok(None);
    };
    match value.parse::<T>() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => Err(ConfigError::InvalidEnv { var, reason: e.to_string(), value }),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: SYNCBRIDGE_<SECTION>_<KEY>
    /// Example: SYNCBRIDGE_STORE_DB_PATH=/var/lib/syncbridge/records.db
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay any SYNCBRIDGE_* variables onto this configuration
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Bridge config
        if let Ok(placeholder) = env::var("SYNCBRIDGE_BRIDGE_DEBUG_SECRET_PLACEHOLDER") {
            self.bridge.debug_secret_placeholder = placeholder;
        }
        if let Some(capacity) = parse_env("SYNCBRIDGE_BRIDGE_BROADCAST_CAPACITY")? {
            self.bridge.broadcast_capacity = capacity;
        }

        // Store config
        if let Ok(path) = env::var("SYNCBRIDGE_STORE_DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(enable_wal) = parse_env("SYNCBRIDGE_STORE_ENABLE_WAL")? {
            self.store.enable_wal = enable_wal;
        }
        if let Ok(timeout) = env::var("SYNCBRIDGE_STORE_BUSY_TIMEOUT") {
            self.store.busy_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::InvalidEnv {
                    var: "SYNCBRIDGE_STORE_BUSY_TIMEOUT",
                    value: timeout.clone(),
                    reason: e.to_string(),
                })?;
        }

        // Logging config
        if let Ok(level) = env::var("SYNCBRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("SYNCBRIDGE_LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.broadcast_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "broadcast_capacity must be greater than 0".to_string(),
            ));
        }

        if self.store.db_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed("db_path must not be empty".to_string()));
        }

        if let Err(e) = self.logging.level.parse::<LogLevel>() {
            return Err(ConfigError::ValidationFailed(e.to_string()));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;

        Ok(())
    }
}
