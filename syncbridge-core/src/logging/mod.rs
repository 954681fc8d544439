//! Logging subsystem for the sync bridge
//!
//! All diagnostics go through `tracing`. The subscriber installed here
//! writes to stderr, plain or JSON, so a command's own output on stdout
//! stays machine-readable.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// How the global subscriber formats and filters events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig::new(LogLevel::default())
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        LogConfig { level, with_timestamp: true, with_target: true, json_format: false }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(config: &LoggingConfig) -> Result<Self, Self::Error> {
        Ok(LogConfig::new(config.level.parse()?)
            .with_timestamp(config.with_timestamp)
            .with_target(config.with_target)
            .json_format(config.json_format))
    }
}

/// Install the default subscriber (info, plain text)
///
/// # Example
/// ```
/// use syncbridge_core::logging::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// ```
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Install the global subscriber
///
/// `RUST_LOG`, when set, replaces the level-derived filter.
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.level.filter_directive())
            .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?,
    };
    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(config.with_target);

    let result = match (config.json_format, config.with_timestamp) {
        (true, _) => registry.with(layer.json()).try_init(),
        (false, true) => registry.with(layer).try_init(),
        (false, false) => registry.with(layer.without_time()).try_init(),
    };

    result.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = LogConfig::new(LogLevel::Debug).with_timestamp(false).json_format(true);

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.with_timestamp);
        assert!(config.with_target);
        assert!(config.json_format);
        assert_eq!(LogConfig::default().level, LogLevel::Info);
    }

    #[test]
    fn test_from_logging_config() {
        let mut settings = LoggingConfig::default();
        settings.level = "warn".to_string();
        settings.json_format = true;

        let config = LogConfig::try_from(&settings).unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(config.json_format);

        settings.level = "loud".to_string();
        assert_eq!(
            LogConfig::try_from(&settings),
            Err(LoggingError::UnknownLevel("loud".to_string()))
        );
    }
}
