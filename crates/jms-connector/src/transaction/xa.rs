//! XA distributed transaction support
//!
//! Sessions created for an `XA_TRANSACTED` connector expose an
//! [`XaResource`]. The scope's transaction manager drives every enlisted
//! resource through two-phase commit using an [`XaCoordinator`]:
//!
//! ```text
//!   begin ──► prepare(all) ──► all voted OK? ──yes──► commit(all)
//!                                   │
//!                                   no
//!                                   ▼
//!                              rollback(all)
//! ```
//!
//! The coordinator is built at most once per [`XaCoordinatorProvider`] and
//! then shared by every scope the provider is injected into.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ClientResult, Error, Result};

/// Format identifier used for generated transaction ids
pub const DEFAULT_FORMAT_ID: i32 = 0x4A4D53;

/// XA transaction branch identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    format_id: i32,
    global_id: Vec<u8>,
    branch_id: Vec<u8>,
}

impl Xid {
    pub fn new(format_id: i32, global_id: &[u8], branch_id: &[u8]) -> Self {
        Self {
            format_id,
            global_id: global_id.to_vec(),
            branch_id: branch_id.to_vec(),
        }
    }

    /// A new global transaction with an empty branch qualifier
    pub fn generate() -> Self {
        Self::new(DEFAULT_FORMAT_ID, Uuid::new_v4().as_bytes(), &[])
    }

    /// Same global transaction, different branch
    pub fn branch(&self, branch_id: &[u8]) -> Self {
        Self::new(self.format_id, &self.global_id, branch_id)
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    pub fn global_id(&self) -> &[u8] {
        &self.global_id
    }

    pub fn branch_id(&self) -> &[u8] {
        &self.branch_id
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:", self.format_id)?;
        for b in &self.global_id {
            write!(f, "{:02x}", b)?;
        }
        f.write_str(":")?;
        for b in &self.branch_id {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Outcome of the prepare phase for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaVote {
    /// Ready to commit
    Ok,
    /// Nothing was written; the resource takes no part in phase two
    ReadOnly,
}

/// A resource manager taking part in a distributed transaction
#[async_trait]
pub trait XaResource: Send + Sync + fmt::Debug {
    /// Identifier used in logs
    fn resource_id(&self) -> &str;

    async fn prepare(&self, xid: &Xid) -> ClientResult<XaVote>;

    async fn commit(&self, xid: &Xid, one_phase: bool) -> ClientResult<()>;

    async fn rollback(&self, xid: &Xid) -> ClientResult<()>;
}

/// Drives a set of XA resources to a common outcome
#[async_trait]
pub trait XaCoordinator: Send + Sync + fmt::Debug {
    /// Start a new global transaction
    async fn begin(&self) -> Result<Xid>;

    async fn commit(&self, xid: &Xid, resources: &[Arc<dyn XaResource>]) -> Result<()>;

    async fn rollback(&self, xid: &Xid, resources: &[Arc<dyn XaResource>]) -> Result<()>;
}

/// Presumed-abort two-phase commit coordinator
#[derive(Debug, Default)]
pub struct TwoPhaseCommitCoordinator {
    started: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl TwoPhaseCommitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn transactions_committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    pub fn transactions_rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    async fn rollback_all(&self, xid: &Xid, resources: &[Arc<dyn XaResource>]) -> Result<()> {
        let outcomes = join_all(resources.iter().map(|r| r.rollback(xid))).await;
        self.rolled_back.fetch_add(1, Ordering::Relaxed);

        let mut first_error = None;
        for (resource, outcome) in resources.iter().zip(outcomes) {
            if let Err(e) = outcome {
                warn!("Rollback of {} failed for {}: {}", resource.resource_id(), xid, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(Error::Transaction(format!("Rollback of {} incomplete: {}", xid, e))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl XaCoordinator for TwoPhaseCommitCoordinator {
    async fn begin(&self) -> Result<Xid> {
        let xid = Xid::generate();
        self.started.fetch_add(1, Ordering::Relaxed);
        info!("Started XA transaction {}", xid);
        Ok(xid)
    }

    async fn commit(&self, xid: &Xid, resources: &[Arc<dyn XaResource>]) -> Result<()> {
        if let [only] = resources {
            debug!("One-phase commit of {} on {}", xid, only.resource_id());
            only.commit(xid, true).await.map_err(|e| {
                Error::Transaction(format!("One-phase commit of {} failed: {}", xid, e))
            })?;
            self.committed.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let votes = join_all(resources.iter().map(|r| r.prepare(xid))).await;

        let mut to_commit = Vec::with_capacity(resources.len());
        for (resource, vote) in resources.iter().zip(votes) {
            match vote {
                Ok(XaVote::Ok) => to_commit.push(resource.clone()),
                Ok(XaVote::ReadOnly) => {
                    debug!("{} is read-only in {}", resource.resource_id(), xid)
                }
                Err(e) => {
                    warn!("Prepare of {} failed for {}: {}", resource.resource_id(), xid, e);
                    if let Err(rollback) = self.rollback_all(xid, resources).await {
                        debug!("{}", rollback);
                    }
                    return Err(Error::Transaction(format!(
                        "Prepare of {} failed on {}: {}",
                        xid,
                        resource.resource_id(),
                        e
                    )));
                }
            }
        }

        let outcomes = join_all(to_commit.iter().map(|r| r.commit(xid, false))).await;
        let failed: Vec<String> = to_commit
            .iter()
            .zip(outcomes)
            .filter_map(|(r, outcome)| outcome.err().map(|e| format!("{}: {}", r.resource_id(), e)))
            .collect();

        if !failed.is_empty() {
            return Err(Error::Transaction(format!(
                "Heuristic outcome for {}, commit failed on {}",
                xid,
                failed.join(", ")
            )));
        }

        self.committed.fetch_add(1, Ordering::Relaxed);
        info!("Committed XA transaction {} across {} resources", xid, resources.len());
        Ok(())
    }

    async fn rollback(&self, xid: &Xid, resources: &[Arc<dyn XaResource>]) -> Result<()> {
        info!("Rolling back XA transaction {}", xid);
        self.rollback_all(xid, resources).await
    }
}

/// Source of the shared XA coordinator
pub trait XaCoordinatorProvider: Send + Sync + fmt::Debug {
    fn coordinator(&self) -> Arc<dyn XaCoordinator>;
}

type CoordinatorFactory = Box<dyn Fn() -> Arc<dyn XaCoordinator> + Send + Sync>;

/// Builds its coordinator on first use and hands out the same instance
/// afterwards.
pub struct LazyXaCoordinatorProvider {
    cell: OnceCell<Arc<dyn XaCoordinator>>,
    factory: CoordinatorFactory,
}

impl LazyXaCoordinatorProvider {
    /// Provider of a [`TwoPhaseCommitCoordinator`]
    pub fn new() -> Self {
        Self::with_factory(|| Arc::new(TwoPhaseCommitCoordinator::new()))
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn XaCoordinator> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Default for LazyXaCoordinatorProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LazyXaCoordinatorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyXaCoordinatorProvider")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl XaCoordinatorProvider for LazyXaCoordinatorProvider {
    fn coordinator(&self) -> Arc<dyn XaCoordinator> {
        self.cell
            .get_or_init(|| {
                info!("Initializing XA transaction coordinator");
                (self.factory)()
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct ScriptedResource {
        id: String,
        vote: ClientResult<XaVote>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedResource {
        fn new(id: &str, vote: ClientResult<XaVote>, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn XaResource> {
            Arc::new(Self {
                id: id.to_string(),
                vote,
                log: log.clone(),
            })
        }
    }

    #[async_trait]
    impl XaResource for ScriptedResource {
        fn resource_id(&self) -> &str {
            &self.id
        }

        async fn prepare(&self, _xid: &Xid) -> ClientResult<XaVote> {
            self.log.lock().push(format!("prepare {}", self.id));
            self.vote.clone()
        }

        async fn commit(&self, _xid: &Xid, one_phase: bool) -> ClientResult<()> {
            self.log.lock().push(format!("commit {} {}", self.id, one_phase));
            Ok(())
        }

        async fn rollback(&self, _xid: &Xid) -> ClientResult<()> {
            self.log.lock().push(format!("rollback {}", self.id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_single_resource_uses_one_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = TwoPhaseCommitCoordinator::new();
        let xid = coordinator.begin().await.unwrap();

        let resources = vec![ScriptedResource::new("a", Ok(XaVote::Ok), &log)];
        coordinator.commit(&xid, &resources).await.unwrap();

        assert_eq!(*log.lock(), vec!["commit a true".to_string()]);
        assert_eq!(coordinator.transactions_committed(), 1);
    }

    #[tokio::test]
    async fn test_two_phase_skips_read_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = TwoPhaseCommitCoordinator::new();
        let xid = coordinator.begin().await.unwrap();

        let resources = vec![
            ScriptedResource::new("a", Ok(XaVote::Ok), &log),
            ScriptedResource::new("b", Ok(XaVote::ReadOnly), &log),
        ];
        coordinator.commit(&xid, &resources).await.unwrap();

        let log = log.lock();
        assert!(log.contains(&"prepare a".to_string()));
        assert!(log.contains(&"prepare b".to_string()));
        assert!(log.contains(&"commit a false".to_string()));
        assert!(!log.iter().any(|l| l.starts_with("commit b")));
    }

    #[tokio::test]
    async fn test_failed_prepare_rolls_back_everything() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = TwoPhaseCommitCoordinator::new();
        let xid = coordinator.begin().await.unwrap();

        let resources = vec![
            ScriptedResource::new("a", Ok(XaVote::Ok), &log),
            ScriptedResource::new("b", Err(ClientError::Session("disk full".into())), &log),
        ];
        let err = coordinator.commit(&xid, &resources).await.unwrap_err();
        assert!(matches!(err, Error::Transaction(_)));

        let log = log.lock();
        assert!(log.contains(&"rollback a".to_string()));
        assert!(log.contains(&"rollback b".to_string()));
        assert!(!log.iter().any(|l| l.starts_with("commit")));
        assert_eq!(coordinator.transactions_rolled_back(), 1);
    }

    #[test]
    fn test_provider_builds_once() {
        let builds = Arc::new(AtomicU64::new(0));
        let counter = builds.clone();
        let provider = LazyXaCoordinatorProvider::with_factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(TwoPhaseCommitCoordinator::new())
        });

        assert!(!provider.is_initialized());
        let first = provider.coordinator();
        let second = provider.coordinator();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_xid_branch_keeps_global_id() {
        let xid = Xid::generate();
        let branch = xid.branch(b"b1");
        assert_eq!(xid.global_id(), branch.global_id());
        assert_eq!(branch.branch_id(), b"b1");
        assert_ne!(xid, branch);
        assert!(xid.to_string().starts_with("4a4d53:"));
    }
}
