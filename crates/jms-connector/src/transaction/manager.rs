use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::ConnectorIdentity;
use crate::transaction::context::JmsTransactionContext;
use crate::transaction::xa::{XaCoordinator, XaResource, Xid};

/// Identifier of one transaction scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub fn new() -> Self {
        ScopeId(Uuid::new_v4())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Transaction bookkeeping for one execution scope.
///
/// Contexts are keyed by connector identity; at most one context exists per
/// identity for the lifetime of the scope. Ending the scope (commit or
/// rollback, and the teardown of every context) is owned by the
/// implementation, not by the send path.
#[async_trait]
pub trait TransactionManager: Send + Sync + fmt::Debug {
    fn scope_id(&self) -> ScopeId;

    /// True while the caller is inside a transaction block
    fn is_in_transaction_scope(&self) -> bool;

    async fn transaction_context(
        &self,
        id: &ConnectorIdentity,
    ) -> Option<Arc<JmsTransactionContext>>;

    /// Fails if a context is already registered for `id` or the scope has
    /// already ended
    async fn register_transaction_context(
        &self,
        id: ConnectorIdentity,
        context: Arc<JmsTransactionContext>,
    ) -> Result<()>;

    fn has_xa_coordinator(&self) -> bool;

    fn set_xa_coordinator(&self, coordinator: Arc<dyn XaCoordinator>);

    fn is_in_xa_transaction(&self) -> bool;

    /// Fails if the scope is already inside an XA transaction
    async fn begin_xa_transaction(&self) -> Result<()>;
}

/// In-memory transaction manager for a single scope
pub struct ScopedTransactionManager {
    scope_id: ScopeId,
    in_scope: AtomicBool,
    contexts: Mutex<HashMap<ConnectorIdentity, Arc<JmsTransactionContext>>>,
    xa_coordinator: RwLock<Option<Arc<dyn XaCoordinator>>>,
    xa_transaction: Mutex<Option<Xid>>,
    xa_begin: AsyncMutex<()>,
}

impl ScopedTransactionManager {
    /// Manager for a scope the caller has just entered
    pub fn new() -> Self {
        Self {
            scope_id: ScopeId::new(),
            in_scope: AtomicBool::new(true),
            contexts: Mutex::new(HashMap::new()),
            xa_coordinator: RwLock::new(None),
            xa_transaction: Mutex::new(None),
            xa_begin: AsyncMutex::new(()),
        }
    }

    /// Manager for a caller that is not inside any transaction block
    pub fn outside_scope() -> Self {
        let manager = Self::new();
        manager.in_scope.store(false, Ordering::SeqCst);
        manager
    }

    /// Install the XA coordinator up front
    pub fn with_xa_coordinator(self, coordinator: Arc<dyn XaCoordinator>) -> Self {
        *self.xa_coordinator.write() = Some(coordinator);
        self
    }

    pub fn context_count(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn current_xid(&self) -> Option<Xid> {
        self.xa_transaction.lock().clone()
    }

    /// Commit all work done in the scope and end it
    pub async fn commit(&self) -> Result<()> {
        self.end_scope(true).await
    }

    /// Discard all work done in the scope and end it
    pub async fn rollback(&self) -> Result<()> {
        self.end_scope(false).await
    }

    async fn end_scope(&self, commit: bool) -> Result<()> {
        self.in_scope.store(false, Ordering::SeqCst);
        let contexts: Vec<Arc<JmsTransactionContext>> =
            self.contexts.lock().drain().map(|(_, ctx)| ctx).collect();
        let xid = self.xa_transaction.lock().take();
        let coordinator = self.xa_coordinator.read().clone();

        info!(
            "Ending {} with {} contexts ({})",
            self.scope_id,
            contexts.len(),
            if commit { "commit" } else { "rollback" }
        );

        let mut outcome = Ok(());

        let (xa, local): (Vec<_>, Vec<_>) =
            contexts.iter().partition(|ctx| ctx.xa_resource().is_some());

        if !xa.is_empty() {
            let resources: Vec<Arc<dyn XaResource>> = xa
                .iter()
                .filter_map(|ctx| ctx.xa_resource().cloned())
                .collect();
            outcome = match (xid, coordinator) {
                (Some(xid), Some(coordinator)) => {
                    if commit {
                        coordinator.commit(&xid, &resources).await
                    } else {
                        coordinator.rollback(&xid, &resources).await
                    }
                }
                _ => Err(Error::Transaction(format!(
                    "{} has XA resources but no open XA transaction",
                    self.scope_id
                ))),
            };
        }

        for ctx in local {
            let result = if commit && outcome.is_ok() {
                ctx.commit().await
            } else {
                ctx.rollback().await
            };
            if let Err(e) = result {
                warn!("{}", e);
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        for ctx in &contexts {
            if let Err(e) = ctx.done().await {
                warn!("{}", e);
            }
        }

        outcome
    }
}

impl Default for ScopedTransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopedTransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedTransactionManager")
            .field("scope_id", &self.scope_id)
            .field("in_scope", &self.in_scope.load(Ordering::SeqCst))
            .field("contexts", &self.context_count())
            .field("xa_transaction", &self.current_xid())
            .finish()
    }
}

#[async_trait]
impl TransactionManager for ScopedTransactionManager {
    fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    fn is_in_transaction_scope(&self) -> bool {
        self.in_scope.load(Ordering::SeqCst)
    }

    async fn transaction_context(
        &self,
        id: &ConnectorIdentity,
    ) -> Option<Arc<JmsTransactionContext>> {
        self.contexts.lock().get(id).cloned()
    }

    async fn register_transaction_context(
        &self,
        id: ConnectorIdentity,
        context: Arc<JmsTransactionContext>,
    ) -> Result<()> {
        let mut contexts = self.contexts.lock();
        if !self.is_in_transaction_scope() {
            return Err(Error::Transaction(format!(
                "{} has ended, cannot register connector {}",
                self.scope_id, id
            )));
        }
        if contexts.contains_key(&id) {
            return Err(Error::Transaction(format!(
                "Connector {} already has a transaction context in {}",
                id, self.scope_id
            )));
        }
        debug!("Registered transaction context for {} in {}", id, self.scope_id);
        contexts.insert(id, context);
        Ok(())
    }

    fn has_xa_coordinator(&self) -> bool {
        self.xa_coordinator.read().is_some()
    }

    fn set_xa_coordinator(&self, coordinator: Arc<dyn XaCoordinator>) {
        *self.xa_coordinator.write() = Some(coordinator);
    }

    fn is_in_xa_transaction(&self) -> bool {
        self.xa_transaction.lock().is_some()
    }

    async fn begin_xa_transaction(&self) -> Result<()> {
        // Held across coordinator.begin() so a second caller sees the Xid.
        let _guard = self.xa_begin.lock().await;
        if self.is_in_xa_transaction() {
            return Err(Error::Transaction(format!(
                "{} is already inside an XA transaction",
                self.scope_id
            )));
        }
        let coordinator = self.xa_coordinator.read().clone().ok_or_else(|| {
            Error::Transaction(format!("No XA coordinator installed for {}", self.scope_id))
        })?;

        let xid = coordinator.begin().await?;
        debug!("{} joined XA transaction {}", self.scope_id, xid);
        *self.xa_transaction.lock() = Some(xid);
        Ok(())
    }
}
