//! Subscriber setup for applications embedding the connector
//!
//! The connector only emits `tracing` events. Applications that have no
//! subscriber of their own can install one here, with the connector's
//! events filtered separately from those of the messaging client library.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Target prefix of every event emitted by this crate
pub const CONNECTOR_TARGET: &str = "jms_connector";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for the connector's own events
    pub connector_level: Level,
    /// Level for events no other directive matches
    pub default_level: Level,
    /// Extra `target=level` directives, e.g. for the messaging client crate
    pub directives: Vec<String>,
    pub json: bool,
    /// Include file and line of the emitting call
    pub file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            connector_level: Level::INFO,
            default_level: Level::WARN,
            directives: Vec::new(),
            json: false,
            file_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(connector_level: Level) -> Self {
        LoggingConfig {
            connector_level,
            ..Default::default()
        }
    }

    pub fn with_default_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Filter built from this configuration alone
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let connector = format!(
            "{}={}",
            CONNECTOR_TARGET,
            self.connector_level.as_str().to_ascii_lowercase()
        );

        let mut filter = EnvFilter::default().add_directive(self.default_level.into());
        for directive in std::iter::once(&connector).chain(&self.directives) {
            let parsed = directive.parse().map_err(|e| {
                Error::Configuration(format!("Invalid log directive '{}': {}", directive, e))
            })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, replaces the
/// configured directives. A second call fails instead of panicking.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.env_filter()?,
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::Configuration(format!("Failed to install logger: {}", e)))?;

    tracing::debug!("JMS connector logging at {}", config.connector_level);
    Ok(())
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Configuration(format!("Invalid log level: {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_connector_directive() {
        let filter = LoggingConfig::new(Level::DEBUG)
            .with_directive("amqp_client=error")
            .env_filter()
            .unwrap()
            .to_string()
            .to_lowercase();

        assert!(filter.contains("jms_connector=debug"), "{}", filter);
        assert!(filter.contains("amqp_client=error"), "{}", filter);
    }

    #[test]
    fn test_bad_directive_is_configuration_error() {
        let err = LoggingConfig::default()
            .with_directive("client=loudest")
            .env_filter()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_setup_logging_only_once() {
        let config = LoggingConfig::new(Level::DEBUG).with_file_info();
        assert!(setup_logging(config.clone()).is_ok());
        assert!(matches!(setup_logging(config), Err(Error::Configuration(_))));
    }
}
