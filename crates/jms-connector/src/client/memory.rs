//! In-process broker
//!
//! Plain sends are delivered to the destination immediately. Transacted
//! sends are held on their session until it commits, and dropped if it rolls
//! back. Clients created for an `XA_TRANSACTED` configuration hand out
//! sessions with an XA resource whose commit and rollback act on the same
//! pending work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::client::{ClientFactory, MessagingClient, Session, SessionId};
use crate::config::{AcknowledgementMode, ConnectorConfig};
use crate::error::{ClientError, ClientResult};
use crate::message::JmsMessage;
use crate::transaction::xa::{XaResource, XaVote, Xid};

/// Destinations and open sessions of an in-process broker
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    destinations: DashMap<String, Vec<JmsMessage>>,
    sessions: DashMap<SessionId, Arc<SessionState>>,
    offline: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn client(self: &Arc<Self>) -> InMemoryClient {
        InMemoryClient {
            broker: self.clone(),
            xa: false,
        }
    }

    /// Client whose sessions take part in XA transactions
    pub fn xa_client(self: &Arc<Self>) -> InMemoryClient {
        InMemoryClient {
            broker: self.clone(),
            xa: true,
        }
    }

    /// Messages delivered to `destination`, oldest first
    pub fn messages(&self, destination: &str) -> Vec<JmsMessage> {
        self.destinations
            .get(destination)
            .map(|queue| queue.value().clone())
            .unwrap_or_default()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Make every subsequent client call fail as if the broker were down
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> ClientResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ClientError::Connection("broker unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    fn deliver(&self, destination: &str, mut message: JmsMessage) {
        let headers = message.headers_mut();
        headers.message_id = Some(format!("ID:{}", Uuid::new_v4()));
        headers.timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| i64::try_from(d.as_millis()).ok());

        trace!("Delivering message to {}", destination);
        self.destinations
            .entry(destination.to_string())
            .or_default()
            .push(message);
    }

    fn session(&self, id: SessionId) -> ClientResult<Arc<SessionState>> {
        self.sessions
            .get(&id)
            .map(|s| s.value().clone())
            .ok_or_else(|| ClientError::Session(format!("unknown or closed {}", id)))
    }
}

impl ClientFactory for Arc<InMemoryBroker> {
    fn create_client(&self, config: &ConnectorConfig) -> ClientResult<Arc<dyn MessagingClient>> {
        let client = match config.acknowledgement_mode() {
            AcknowledgementMode::XaTransacted => self.xa_client(),
            _ => self.client(),
        };
        Ok(Arc::new(client))
    }
}

// Weak because the broker's session table owns the state.
#[derive(Debug)]
struct SessionState {
    id: SessionId,
    broker: Weak<InMemoryBroker>,
    pending: Mutex<Vec<(String, JmsMessage)>>,
}

impl SessionState {
    fn broker(&self) -> ClientResult<Arc<InMemoryBroker>> {
        self.broker.upgrade().ok_or(ClientError::Closed)
    }

    fn commit(&self) -> ClientResult<()> {
        let broker = self.broker()?;
        broker.check_online()?;
        let pending = std::mem::take(&mut *self.pending.lock());
        debug!("Committing {} messages on {}", pending.len(), self.id);
        for (destination, message) in pending {
            broker.deliver(&destination, message);
        }
        Ok(())
    }

    fn rollback(&self) {
        let dropped = std::mem::take(&mut *self.pending.lock());
        debug!("Rolled back {} messages on {}", dropped.len(), self.id);
    }
}

/// Client handle onto an [`InMemoryBroker`]
#[derive(Debug, Clone)]
pub struct InMemoryClient {
    broker: Arc<InMemoryBroker>,
    xa: bool,
}

#[async_trait]
impl MessagingClient for InMemoryClient {
    async fn send(&self, message: &JmsMessage, destination: &str) -> ClientResult<()> {
        self.broker.check_online()?;
        self.broker.deliver(destination, message.clone());
        Ok(())
    }

    async fn acquire_session(&self) -> ClientResult<Arc<dyn Session>> {
        self.broker.check_online()?;
        let state = Arc::new(SessionState {
            id: SessionId::new(),
            broker: Arc::downgrade(&self.broker),
            pending: Mutex::new(Vec::new()),
        });
        self.broker.sessions.insert(state.id, state.clone());
        debug!("Opened {} (xa: {})", state.id, self.xa);
        Ok(Arc::new(InMemorySession { state, xa: self.xa }))
    }

    async fn send_transacted(
        &self,
        message: &JmsMessage,
        destination: &str,
        session: &Arc<dyn Session>,
    ) -> ClientResult<()> {
        self.broker.check_online()?;
        let state = self.broker.session(session.id())?;
        state
            .pending
            .lock()
            .push((destination.to_string(), message.clone()));
        Ok(())
    }
}

/// Session of an [`InMemoryClient`]
#[derive(Debug)]
pub struct InMemorySession {
    state: Arc<SessionState>,
    xa: bool,
}

#[async_trait]
impl Session for InMemorySession {
    fn id(&self) -> SessionId {
        self.state.id
    }

    fn xa_resource(&self) -> Option<Arc<dyn XaResource>> {
        if !self.xa {
            return None;
        }
        Some(Arc::new(InMemoryXaResource {
            name: self.state.id.to_string(),
            state: self.state.clone(),
        }))
    }

    async fn commit(&self) -> ClientResult<()> {
        self.state.commit()
    }

    async fn rollback(&self) -> ClientResult<()> {
        self.state.rollback();
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        self.state.rollback();
        if let Some(broker) = self.state.broker.upgrade() {
            broker.sessions.remove(&self.state.id);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct InMemoryXaResource {
    name: String,
    state: Arc<SessionState>,
}

#[async_trait]
impl XaResource for InMemoryXaResource {
    fn resource_id(&self) -> &str {
        &self.name
    }

    async fn prepare(&self, _xid: &Xid) -> ClientResult<XaVote> {
        self.state.broker()?.check_online()?;
        if self.state.pending.lock().is_empty() {
            Ok(XaVote::ReadOnly)
        } else {
            Ok(XaVote::Ok)
        }
    }

    async fn commit(&self, _xid: &Xid, _one_phase: bool) -> ClientResult<()> {
        self.state.commit()
    }

    async fn rollback(&self, _xid: &Xid) -> ClientResult<()> {
        self.state.rollback();
        Ok(())
    }
}
