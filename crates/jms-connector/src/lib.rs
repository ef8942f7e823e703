//! JMS connector for the send side of a messaging integration
//!
//! This crate sits between an application and a messaging client library.
//! It owns no broker connection of its own; what it adds is the decision,
//! per send, whether the message belongs to the caller's transaction and,
//! if so, which session it must go through.
//!
//! ```text
//! +---------------------------+
//! |  Application              |  <- JmsConnector::send / init
//! +---------------------------+
//!              │
//! +---------------------------+
//! |  TransactedSendCoordinator|  <- plain vs transacted path, context reuse,
//! |                           |     XA enlistment
//! +---------------------------+
//!        │              │
//! +-------------+  +----------------------+
//! | Messaging   |  | TransactionManager   |  <- one per transaction scope
//! | client      |  | (+ XaCoordinator)    |
//! +-------------+  +----------------------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use jms_connector::prelude::*;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let broker = InMemoryBroker::new();
//! let coordinator = Arc::new(TransactedSendCoordinator::with_client_factory(Arc::new(broker.clone())));
//!
//! let mut properties = BTreeMap::new();
//! properties.insert(PARAM_ACK_MODE.to_string(), "SESSION_TRANSACTED".to_string());
//! let connector = JmsConnector::new(ConnectorArgs::new(properties), coordinator).unwrap();
//!
//! let scope = ScopedTransactionManager::new();
//! connector.send(Some(&scope), "orders.queue", &JmsMessage::text("order-1")).await.unwrap();
//! assert!(broker.messages("orders.queue").is_empty());
//!
//! scope.commit().await.unwrap();
//! assert_eq!(broker.messages("orders.queue").len(), 1);
//! # });
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connector;
pub mod coordinator;
mod error;
pub mod identity;
pub mod logging;
pub mod message;
pub mod transaction;

pub use client::{ClientFactory, MessagingClient, Session, SessionId, SharedClientFactory};
pub use config::{AcknowledgementMode, ConnectorConfig, DestinationType};
pub use connector::{ConnectorArgs, JmsConnector};
pub use coordinator::TransactedSendCoordinator;
pub use error::{ClientError, ClientResult, Error, PropertyError, Result};
pub use identity::{ConnectorIdentity, IdentityCell};
pub use message::{DeliveryMode, JmsMessage, MessageBody, MessageHeaders, PropertyValue};
pub use transaction::{
    JmsTransactionContext, ScopeId, ScopedTransactionManager, TransactionManager,
};

/// Re-export of common types and functions
pub mod prelude {
    pub use crate::client::memory::InMemoryBroker;
    pub use crate::config::{PARAM_ACK_MODE, PARAM_DESTINATION_NAME};
    pub use crate::{
        AcknowledgementMode, ClientError, ClientFactory, ConnectorArgs, ConnectorConfig,
        ConnectorIdentity, Error, IdentityCell, JmsConnector, JmsMessage, JmsTransactionContext,
        MessagingClient, Result, ScopedTransactionManager, Session, TransactedSendCoordinator,
        TransactionManager,
    };
}
