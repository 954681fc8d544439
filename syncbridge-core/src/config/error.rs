//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to write configuration file {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid value {value:?} for {var}: {reason}")]
    InvalidEnv { var: &'static str, value: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}
