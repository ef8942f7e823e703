//! # Transacted send coordination
//!
//! Every send decides between two paths:
//!
//! ```text
//!                   send(identity, config, scope, destination, message)
//!                                     │
//!            ack mode transacted AND caller inside a transaction scope?
//!                    │                                   │
//!                    no                                 yes
//!                    ▼                                   ▼
//!          client.send(message)            identity = cell.get_or_generate()
//!                                                        │
//!                                      scope.transaction_context(identity)?
//!                                          │                       │
//!                                        found                   absent
//!                                          │                       ▼
//!                                          │           client.acquire_session()
//!                                          │           XA resource? ─► install coordinator,
//!                                          │                           begin XA transaction
//!                                          │           scope.register_transaction_context()
//!                                          ▼                       │
//!                             client.send_transacted(message, destination, session)
//! ```
//!
//! The configured acknowledgement mode alone never makes a send transacted;
//! the caller must also be inside a transaction scope. Client failures are
//! fatal to the call and returned as [`Error::SendFailure`] with the client
//! error as the source. Nothing is retried here.
//!
//! The lookup-or-create step is serialized per (connector identity, scope),
//! so concurrent sends from one connector in one scope still end up sharing
//! a single context. XA initialization is serialized per scope, so two
//! connectors enlisting at once still start one global transaction.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, MessagingClient};
use crate::config::ConnectorConfig;
use crate::error::{Error, Result};
use crate::identity::{ConnectorIdentity, IdentityCell};
use crate::message::JmsMessage;
use crate::transaction::manager::{ScopeId, TransactionManager};
use crate::transaction::xa::{LazyXaCoordinatorProvider, XaCoordinatorProvider};
use crate::transaction::JmsTransactionContext;

/// Async locks created on demand per key and dropped once unused
struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.locks.len()
    }

    fn lock_for(&self, key: &K) -> Arc<Mutex<()>> {
        self.locks.entry(key.clone()).or_default().value().clone()
    }

    fn release(&self, key: &K, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Routes sends between the plain and the transacted path
pub struct TransactedSendCoordinator {
    client_factory: Arc<dyn ClientFactory>,
    xa_provider: Arc<dyn XaCoordinatorProvider>,
    enlist_locks: KeyedLocks<(ConnectorIdentity, ScopeId)>,
    xa_init_locks: KeyedLocks<ScopeId>,
}

impl TransactedSendCoordinator {
    pub fn new(
        client_factory: Arc<dyn ClientFactory>,
        xa_provider: Arc<dyn XaCoordinatorProvider>,
    ) -> Self {
        Self {
            client_factory,
            xa_provider,
            enlist_locks: KeyedLocks::new(),
            xa_init_locks: KeyedLocks::new(),
        }
    }

    /// Coordinator with its own lazily built two-phase commit coordinator
    pub fn with_client_factory(client_factory: Arc<dyn ClientFactory>) -> Self {
        Self::new(client_factory, Arc::new(LazyXaCoordinatorProvider::new()))
    }

    /// Whether a send with `config` from a caller in `scope` is transacted
    pub fn is_transacted(config: &ConnectorConfig, scope: Option<&dyn TransactionManager>) -> bool {
        config.acknowledgement_mode().is_transacted()
            && scope.map_or(false, |s| s.is_in_transaction_scope())
    }

    pub async fn send(
        &self,
        identity: &IdentityCell,
        config: &ConnectorConfig,
        scope: Option<&dyn TransactionManager>,
        destination: &str,
        message: &JmsMessage,
    ) -> Result<()> {
        if destination.is_empty() {
            return Err(Error::Configuration("Destination name is required".to_string()));
        }

        let client = self
            .client_factory
            .create_client(config)
            .map_err(Error::send_failure)?;

        debug!("Sending JMS message to {}", destination);

        let scope = match scope.filter(|_| Self::is_transacted(config, scope)) {
            Some(scope) => scope,
            None => {
                return client
                    .send(message, destination)
                    .await
                    .map_err(Error::send_failure);
            }
        };

        let id = identity.get_or_generate().clone();
        let context = self.enlist(&id, &client, scope).await?;

        client
            .send_transacted(message, destination, context.session())
            .await
            .map_err(Error::send_failure)
    }

    async fn enlist(
        &self,
        id: &ConnectorIdentity,
        client: &Arc<dyn MessagingClient>,
        scope: &dyn TransactionManager,
    ) -> Result<Arc<JmsTransactionContext>> {
        let key = (id.clone(), scope.scope_id());
        let lock = self.enlist_locks.lock_for(&key);

        let result = {
            let _guard = lock.lock().await;
            self.lookup_or_create(id, client, scope).await
        };

        self.enlist_locks.release(&key, lock);
        result
    }

    async fn lookup_or_create(
        &self,
        id: &ConnectorIdentity,
        client: &Arc<dyn MessagingClient>,
        scope: &dyn TransactionManager,
    ) -> Result<Arc<JmsTransactionContext>> {
        if let Some(context) = scope.transaction_context(id).await {
            debug!("Reusing transaction context of connector {} in {}", id, scope.scope_id());
            return Ok(context);
        }

        let session = client.acquire_session().await.map_err(Error::send_failure)?;
        let context = Arc::new(JmsTransactionContext::new(id.clone(), session, client.clone()));
        info!(
            "Acquired session {} for connector {} in {}",
            context.session().id(),
            id,
            scope.scope_id()
        );

        if context.xa_resource().is_some() {
            if let Err(e) = self.initialize_xa_transaction(scope).await {
                release(&context).await;
                return Err(e);
            }
        }

        if let Err(e) = scope
            .register_transaction_context(id.clone(), context.clone())
            .await
        {
            release(&context).await;
            return Err(e);
        }

        Ok(context)
    }

    async fn initialize_xa_transaction(&self, scope: &dyn TransactionManager) -> Result<()> {
        let key = scope.scope_id();
        let lock = self.xa_init_locks.lock_for(&key);

        let result = {
            let _guard = lock.lock().await;
            if !scope.has_xa_coordinator() {
                scope.set_xa_coordinator(self.xa_provider.coordinator());
            }
            if scope.is_in_xa_transaction() {
                Ok(())
            } else {
                scope.begin_xa_transaction().await
            }
        };

        self.xa_init_locks.release(&key, lock);
        result
    }
}

impl fmt::Debug for TransactedSendCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactedSendCoordinator")
            .field("client_factory", &self.client_factory)
            .field("xa_provider", &self.xa_provider)
            .field("pending_enlistments", &self.enlist_locks.len())
            .field("pending_xa_inits", &self.xa_init_locks.len())
            .finish()
    }
}

// A context that never made it into the scope must not keep its session open.
async fn release(context: &JmsTransactionContext) {
    if let Err(e) = context.done().await {
        warn!("{}", e);
    }
}
