//! Connector configuration
//!
//! A connector is configured with a flat map of string properties, consumed
//! verbatim by the messaging client. This module keeps that map intact and
//! exposes typed views over the keys the connector itself interprets:
//!
//! | Key                                        | Meaning                        |
//! |--------------------------------------------|--------------------------------|
//! | `transport.jms.SessionAcknowledgement`     | [`AcknowledgementMode`]        |
//! | `transport.jms.Destination`                | destination name               |
//! | `transport.jms.DestinationType`            | [`DestinationType`]            |
//! | `transport.jms.ConnectionFactoryJNDIName`  | connection factory lookup name |
//!
//! ## Example
//!
//! ```rust
//! use jms_connector::config::{AcknowledgementMode, ConnectorConfig, PARAM_ACK_MODE};
//!
//! let config = ConnectorConfig::new()
//!     .with_property(PARAM_ACK_MODE, "SESSION_TRANSACTED")
//!     .with_destination("orders.queue");
//!
//! assert_eq!(config.acknowledgement_mode(), AcknowledgementMode::SessionTransacted);
//! assert_eq!(config.destination(), Some("orders.queue"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Acknowledgement mode property key
pub const PARAM_ACK_MODE: &str = "transport.jms.SessionAcknowledgement";
/// Destination name property key
pub const PARAM_DESTINATION_NAME: &str = "transport.jms.Destination";
/// Destination type property key (`queue` or `topic`)
pub const PARAM_DESTINATION_TYPE: &str = "transport.jms.DestinationType";
/// Connection factory JNDI name property key
pub const PARAM_CONNECTION_FACTORY_JNDI_NAME: &str = "transport.jms.ConnectionFactoryJNDIName";

/// How delivery of messages sent through a session is acknowledged.
///
/// Only [`SessionTransacted`](Self::SessionTransacted) and
/// [`XaTransacted`](Self::XaTransacted) route sends through the transacted
/// path, and only when the caller is inside a transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AcknowledgementMode {
    #[default]
    #[serde(rename = "AUTO_ACKNOWLEDGE")]
    AutoAcknowledge,
    #[serde(rename = "CLIENT_ACKNOWLEDGE")]
    ClientAcknowledge,
    #[serde(rename = "DUPS_OK_ACKNOWLEDGE")]
    DupsOkAcknowledge,
    #[serde(rename = "SESSION_TRANSACTED")]
    SessionTransacted,
    #[serde(rename = "XA_TRANSACTED")]
    XaTransacted,
}

impl AcknowledgementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcknowledgementMode::AutoAcknowledge => "AUTO_ACKNOWLEDGE",
            AcknowledgementMode::ClientAcknowledge => "CLIENT_ACKNOWLEDGE",
            AcknowledgementMode::DupsOkAcknowledge => "DUPS_OK_ACKNOWLEDGE",
            AcknowledgementMode::SessionTransacted => "SESSION_TRANSACTED",
            AcknowledgementMode::XaTransacted => "XA_TRANSACTED",
        }
    }

    /// True for the local and XA transacted modes
    pub fn is_transacted(&self) -> bool {
        matches!(
            self,
            AcknowledgementMode::SessionTransacted | AcknowledgementMode::XaTransacted
        )
    }

    /// Resolve a configured value. Matching is exact and case-sensitive;
    /// absent or unrecognized values fall back to `AUTO_ACKNOWLEDGE`.
    pub fn resolve(value: Option<&str>) -> Self {
        match value {
            None => AcknowledgementMode::AutoAcknowledge,
            Some(v) => v.parse().unwrap_or_else(|_| {
                warn!("Unrecognized acknowledgement mode '{}', using AUTO_ACKNOWLEDGE", v);
                AcknowledgementMode::AutoAcknowledge
            }),
        }
    }
}

impl fmt::Display for AcknowledgementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcknowledgementMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AUTO_ACKNOWLEDGE" => Ok(AcknowledgementMode::AutoAcknowledge),
            "CLIENT_ACKNOWLEDGE" => Ok(AcknowledgementMode::ClientAcknowledge),
            "DUPS_OK_ACKNOWLEDGE" => Ok(AcknowledgementMode::DupsOkAcknowledge),
            "SESSION_TRANSACTED" => Ok(AcknowledgementMode::SessionTransacted),
            "XA_TRANSACTED" => Ok(AcknowledgementMode::XaTransacted),
            other => Err(Error::Configuration(format!(
                "Invalid acknowledgement mode: {}",
                other
            ))),
        }
    }
}

/// Kind of destination a connector sends to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    #[default]
    Queue,
    Topic,
}

/// Flat, string-keyed connector configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

impl ConnectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties(properties: BTreeMap<String, String>) -> Self {
        Self { properties }
    }

    /// Load a configuration from a TOML document with a `[properties]` table.
    ///
    /// ```toml
    /// [properties]
    /// "transport.jms.SessionAcknowledgement" = "XA_TRANSACTED"
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source)
            .map_err(|e| Error::Configuration(format!("Failed to parse connector config: {}", e)))
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Copy of this configuration targeting `destination`. The send argument
    /// always wins over any configured destination.
    pub fn with_destination(&self, destination: impl Into<String>) -> Self {
        self.clone()
            .with_property(PARAM_DESTINATION_NAME, destination)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn acknowledgement_mode(&self) -> AcknowledgementMode {
        AcknowledgementMode::resolve(self.get(PARAM_ACK_MODE))
    }

    pub fn destination(&self) -> Option<&str> {
        self.get(PARAM_DESTINATION_NAME).filter(|d| !d.is_empty())
    }

    pub fn destination_type(&self) -> DestinationType {
        match self.get(PARAM_DESTINATION_TYPE) {
            Some("topic") => DestinationType::Topic,
            _ => DestinationType::Queue,
        }
    }

    pub fn connection_factory_name(&self) -> Option<&str> {
        self.get(PARAM_CONNECTION_FACTORY_JNDI_NAME)
    }

    /// Check the keys a send cannot proceed without.
    pub fn validate(&self) -> Result<()> {
        if self.destination().is_none() {
            return Err(Error::Configuration(
                "Destination name is required".to_string(),
            ));
        }
        Ok(())
    }
}
