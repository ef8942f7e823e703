use std::sync::Arc;

use tracing::debug;

use crate::client::{MessagingClient, Session};
use crate::error::{Error, Result};
use crate::identity::ConnectorIdentity;
use crate::transaction::xa::XaResource;

/// The session a connector sends through for the rest of a transaction scope
#[derive(Debug)]
pub struct JmsTransactionContext {
    identity: ConnectorIdentity,
    session: Arc<dyn Session>,
    client: Arc<dyn MessagingClient>,
    xa_resource: Option<Arc<dyn XaResource>>,
}

impl JmsTransactionContext {
    pub fn new(
        identity: ConnectorIdentity,
        session: Arc<dyn Session>,
        client: Arc<dyn MessagingClient>,
    ) -> Self {
        let xa_resource = session.xa_resource();
        Self {
            identity,
            session,
            client,
            xa_resource,
        }
    }

    pub fn identity(&self) -> &ConnectorIdentity {
        &self.identity
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn client(&self) -> &Arc<dyn MessagingClient> {
        &self.client
    }

    /// Present when the session takes part in an XA transaction
    pub fn xa_resource(&self) -> Option<&Arc<dyn XaResource>> {
        self.xa_resource.as_ref()
    }

    /// Commit the local session transaction
    pub async fn commit(&self) -> Result<()> {
        debug!("Committing session {} for connector {}", self.session.id(), self.identity);
        self.session.commit().await.map_err(|e| {
            Error::Transaction(format!("Commit failed for connector {}: {}", self.identity, e))
        })
    }

    /// Roll back the local session transaction
    pub async fn rollback(&self) -> Result<()> {
        debug!("Rolling back session {} for connector {}", self.session.id(), self.identity);
        self.session.rollback().await.map_err(|e| {
            Error::Transaction(format!("Rollback failed for connector {}: {}", self.identity, e))
        })
    }

    /// Release the session once the scope has ended
    pub async fn done(&self) -> Result<()> {
        self.session.close().await.map_err(|e| {
            Error::Transaction(format!("Closing session for connector {} failed: {}", self.identity, e))
        })
    }
}
