//! Messaging client boundary
//!
//! The connector does no broker I/O of its own. Connections, framing,
//! acknowledgement and retry belong to the messaging client, reached through
//! the traits in this module:
//!
//! - [`ClientFactory`] builds a client from the effective connector
//!   configuration.
//! - [`MessagingClient`] sends directly, or hands out a [`Session`] for
//!   transacted sends.
//! - [`Session`] commits or rolls back the work sent through it and may
//!   expose an [`XaResource`] for distributed transactions.
//!
//! [`memory`] provides an in-process implementation of all three.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::ConnectorConfig;
use crate::error::ClientResult;
use crate::message::JmsMessage;
use crate::transaction::xa::XaResource;

/// Identifier of a session acquired from a messaging client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A transactional session on a broker connection
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    fn id(&self) -> SessionId;

    /// XA resource for this session, if it was created for XA
    fn xa_resource(&self) -> Option<Arc<dyn XaResource>>;

    async fn commit(&self) -> ClientResult<()>;

    async fn rollback(&self) -> ClientResult<()>;

    async fn close(&self) -> ClientResult<()>;
}

/// Sending side of a messaging client
#[async_trait]
pub trait MessagingClient: Send + Sync + fmt::Debug {
    /// Send outside any transaction
    async fn send(&self, message: &JmsMessage, destination: &str) -> ClientResult<()>;

    /// Acquire a session for transacted sends
    async fn acquire_session(&self) -> ClientResult<Arc<dyn Session>>;

    /// Send as part of the work of `session`
    async fn send_transacted(
        &self,
        message: &JmsMessage,
        destination: &str,
        session: &Arc<dyn Session>,
    ) -> ClientResult<()>;
}

/// Builds a messaging client for a connector configuration
pub trait ClientFactory: Send + Sync + fmt::Debug {
    fn create_client(&self, config: &ConnectorConfig) -> ClientResult<Arc<dyn MessagingClient>>;
}

/// Factory that always returns the same client
#[derive(Debug, Clone)]
pub struct SharedClientFactory {
    client: Arc<dyn MessagingClient>,
}

impl SharedClientFactory {
    pub fn new(client: Arc<dyn MessagingClient>) -> Self {
        Self { client }
    }
}

impl ClientFactory for SharedClientFactory {
    fn create_client(&self, _config: &ConnectorConfig) -> ClientResult<Arc<dyn MessagingClient>> {
        Ok(self.client.clone())
    }
}
