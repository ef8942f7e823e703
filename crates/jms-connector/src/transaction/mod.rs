//! Transaction scope bookkeeping
//!
//! A transacted send does not commit anything itself. It enlists the
//! connector's session in the caller's transaction scope:
//!
//! ```text
//!   send ──► TransactionManager (one per scope)
//!                │
//!                ├── connector A ──► JmsTransactionContext ──► Session (+ XaResource)
//!                ├── connector B ──► JmsTransactionContext ──► Session (+ XaResource)
//!                │
//!                └── XaCoordinator (shared, installed on first XA enlistment)
//! ```
//!
//! When the scope ends the manager commits or rolls back every context it
//! holds, through the XA coordinator when an XA transaction is open.

pub mod context;
pub mod manager;
pub mod xa;

pub use context::JmsTransactionContext;
pub use manager::{ScopeId, ScopedTransactionManager, TransactionManager};
pub use xa::{
    LazyXaCoordinatorProvider, TwoPhaseCommitCoordinator, XaCoordinator, XaCoordinatorProvider,
    XaResource, XaVote, Xid,
};
