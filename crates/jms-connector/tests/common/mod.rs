// Recording doubles for the messaging client and transaction manager
// boundaries, used to count and inspect the calls the coordinator makes.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use jms_connector::transaction::{XaCoordinator, XaResource, XaVote, Xid};
use jms_connector::{
    ClientError, ClientFactory, ClientResult, ConnectorConfig, ConnectorIdentity, Error,
    JmsMessage, JmsTransactionContext, MessagingClient, Result, ScopeId,
    ScopedTransactionManager, Session, SessionId, TransactionManager,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Send { destination: String },
    AcquireSession,
    SendTransacted { destination: String, session: SessionId },
}

#[derive(Debug, Default)]
pub struct MockXaResource;

#[async_trait]
impl XaResource for MockXaResource {
    fn resource_id(&self) -> &str {
        "mock-xa"
    }

    async fn prepare(&self, _xid: &Xid) -> ClientResult<XaVote> {
        Ok(XaVote::Ok)
    }

    async fn commit(&self, _xid: &Xid, _one_phase: bool) -> ClientResult<()> {
        Ok(())
    }

    async fn rollback(&self, _xid: &Xid) -> ClientResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockSession {
    id: SessionId,
    xa: bool,
    pub closed: Mutex<bool>,
}

#[async_trait]
impl Session for MockSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn xa_resource(&self) -> Option<Arc<dyn XaResource>> {
        if self.xa {
            Some(Arc::new(MockXaResource))
        } else {
            None
        }
    }

    async fn commit(&self) -> ClientResult<()> {
        Ok(())
    }

    async fn rollback(&self) -> ClientResult<()> {
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

/// Messaging client that records every call
#[derive(Debug, Default)]
pub struct RecordingClient {
    pub calls: Mutex<Vec<ClientCall>>,
    pub sessions: Mutex<Vec<Arc<MockSession>>>,
    xa: bool,
    send_error: Option<ClientError>,
    session_error: Option<ClientError>,
    // Fails the next transacted send only.
    transacted_send_error: Mutex<Option<ClientError>>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn xa() -> Arc<Self> {
        Arc::new(Self {
            xa: true,
            ..Default::default()
        })
    }

    pub fn failing_send(error: ClientError) -> Arc<Self> {
        Arc::new(Self {
            send_error: Some(error),
            ..Default::default()
        })
    }

    pub fn failing_session(error: ClientError) -> Arc<Self> {
        Arc::new(Self {
            session_error: Some(error),
            ..Default::default()
        })
    }

    pub fn failing_transacted_send(error: ClientError) -> Arc<Self> {
        Arc::new(Self {
            transacted_send_error: Mutex::new(Some(error)),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&ClientCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn acquired(&self) -> usize {
        self.count(|c| matches!(c, ClientCall::AcquireSession))
    }

    pub fn plain_sends(&self) -> usize {
        self.count(|c| matches!(c, ClientCall::Send { .. }))
    }

    pub fn transacted_sessions(&self) -> Vec<SessionId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ClientCall::SendTransacted { session, .. } => Some(*session),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessagingClient for RecordingClient {
    async fn send(&self, _message: &JmsMessage, destination: &str) -> ClientResult<()> {
        self.calls.lock().push(ClientCall::Send {
            destination: destination.to_string(),
        });
        match &self.send_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn acquire_session(&self) -> ClientResult<Arc<dyn Session>> {
        self.calls.lock().push(ClientCall::AcquireSession);
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        if let Some(e) = &self.session_error {
            return Err(e.clone());
        }
        let session = Arc::new(MockSession {
            id: SessionId::new(),
            xa: self.xa,
            closed: Mutex::new(false),
        });
        self.sessions.lock().push(session.clone());
        Ok(session)
    }

    async fn send_transacted(
        &self,
        _message: &JmsMessage,
        destination: &str,
        session: &Arc<dyn Session>,
    ) -> ClientResult<()> {
        self.calls.lock().push(ClientCall::SendTransacted {
            destination: destination.to_string(),
            session: session.id(),
        });
        match self.transacted_send_error.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Client factory that never produces a client
#[derive(Debug)]
pub struct FailingClientFactory {
    pub error: ClientError,
    pub attempts: AtomicUsize,
}

impl FailingClientFactory {
    pub fn new(error: ClientError) -> Arc<Self> {
        Arc::new(Self {
            error,
            attempts: AtomicUsize::new(0),
        })
    }
}

impl ClientFactory for FailingClientFactory {
    fn create_client(&self, _config: &ConnectorConfig) -> ClientResult<Arc<dyn MessagingClient>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// XA coordinator whose `begin` suspends once, so concurrent enlistments
/// interleave around it
#[derive(Debug, Default)]
pub struct YieldingXaCoordinator {
    pub begins: AtomicUsize,
}

#[async_trait]
impl XaCoordinator for YieldingXaCoordinator {
    async fn begin(&self) -> Result<Xid> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Xid::generate())
    }

    async fn commit(&self, _xid: &Xid, _resources: &[Arc<dyn XaResource>]) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self, _xid: &Xid, _resources: &[Arc<dyn XaResource>]) -> Result<()> {
        Ok(())
    }
}

/// Transaction manager that counts calls and delegates to a real scope
#[derive(Debug)]
pub struct RecordingTransactionManager {
    inner: ScopedTransactionManager,
    pub registered: Mutex<Vec<ConnectorIdentity>>,
    pub coordinators_set: AtomicUsize,
    pub xa_begins: AtomicUsize,
    fail_xa_begin: bool,
}

impl RecordingTransactionManager {
    pub fn in_scope() -> Self {
        Self::wrap(ScopedTransactionManager::new(), false)
    }

    pub fn outside_scope() -> Self {
        Self::wrap(ScopedTransactionManager::outside_scope(), false)
    }

    pub fn failing_xa_begin() -> Self {
        Self::wrap(ScopedTransactionManager::new(), true)
    }

    fn wrap(inner: ScopedTransactionManager, fail_xa_begin: bool) -> Self {
        Self {
            inner,
            registered: Mutex::new(Vec::new()),
            coordinators_set: AtomicUsize::new(0),
            xa_begins: AtomicUsize::new(0),
            fail_xa_begin,
        }
    }

    pub fn register_calls(&self) -> usize {
        self.registered.lock().len()
    }

    pub fn coordinator_installs(&self) -> usize {
        self.coordinators_set.load(Ordering::SeqCst)
    }

    pub fn xa_begin_calls(&self) -> usize {
        self.xa_begins.load(Ordering::SeqCst)
    }

    pub fn scope(&self) -> &ScopedTransactionManager {
        &self.inner
    }
}

#[async_trait]
impl TransactionManager for RecordingTransactionManager {
    fn scope_id(&self) -> ScopeId {
        self.inner.scope_id()
    }

    fn is_in_transaction_scope(&self) -> bool {
        self.inner.is_in_transaction_scope()
    }

    async fn transaction_context(
        &self,
        id: &ConnectorIdentity,
    ) -> Option<Arc<JmsTransactionContext>> {
        self.inner.transaction_context(id).await
    }

    async fn register_transaction_context(
        &self,
        id: ConnectorIdentity,
        context: Arc<JmsTransactionContext>,
    ) -> Result<()> {
        self.registered.lock().push(id.clone());
        self.inner.register_transaction_context(id, context).await
    }

    fn has_xa_coordinator(&self) -> bool {
        self.inner.has_xa_coordinator()
    }

    fn set_xa_coordinator(&self, coordinator: Arc<dyn XaCoordinator>) {
        self.coordinators_set.fetch_add(1, Ordering::SeqCst);
        self.inner.set_xa_coordinator(coordinator)
    }

    fn is_in_xa_transaction(&self) -> bool {
        self.inner.is_in_xa_transaction()
    }

    async fn begin_xa_transaction(&self) -> Result<()> {
        self.xa_begins.fetch_add(1, Ordering::SeqCst);
        if self.fail_xa_begin {
            return Err(Error::Transaction("coordinator offline".to_string()));
        }
        self.inner.begin_xa_transaction().await
    }
}
