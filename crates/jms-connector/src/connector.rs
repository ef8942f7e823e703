use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ConnectorConfig;
use crate::coordinator::TransactedSendCoordinator;
use crate::error::{Error, Result};
use crate::identity::{ConnectorIdentity, IdentityCell};
use crate::message::JmsMessage;
use crate::transaction::TransactionManager;

/// Arguments a connector is declared with
#[derive(Debug, Clone, Default)]
pub struct ConnectorArgs {
    /// Connector properties. `None` when the declaration carried no
    /// property structure at all.
    pub properties: Option<BTreeMap<String, String>>,
}

impl ConnectorArgs {
    pub fn new(properties: BTreeMap<String, String>) -> Self {
        Self {
            properties: Some(properties),
        }
    }
}

/// A declared JMS connector and its send action
#[derive(Debug)]
pub struct JmsConnector {
    config: ConnectorConfig,
    identity: IdentityCell,
    coordinator: Arc<TransactedSendCoordinator>,
}

impl JmsConnector {
    /// Validate the declaration. A connector without a property structure is
    /// rejected here, before any client is created.
    pub fn new(args: ConnectorArgs, coordinator: Arc<TransactedSendCoordinator>) -> Result<Self> {
        let properties = args.properties.ok_or_else(|| {
            Error::Configuration("Connector parameters not defined correctly.".to_string())
        })?;

        Ok(Self {
            config: ConnectorConfig::from_properties(properties),
            identity: IdentityCell::new(),
            coordinator,
        })
    }

    /// Restore a previously stored identity; the empty string means none.
    pub fn with_stored_identity(mut self, raw: &str) -> Self {
        self.identity = IdentityCell::from_raw(raw);
        self
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<&ConnectorIdentity> {
        self.identity.get()
    }

    /// Connections are opened lazily by the messaging client, so there is
    /// nothing to set up.
    pub fn init(&self) -> Result<()> {
        debug!("JMS connector initialized");
        Ok(())
    }

    /// Send `message` to `destination`, enlisting in `scope` when the
    /// connector is configured for transacted sends.
    pub async fn send(
        &self,
        scope: Option<&dyn TransactionManager>,
        destination: &str,
        message: &JmsMessage,
    ) -> Result<()> {
        let config = self.config.with_destination(destination);
        config.validate()?;

        self.coordinator
            .send(&self.identity, &config, scope, destination, message)
            .await
    }
}
