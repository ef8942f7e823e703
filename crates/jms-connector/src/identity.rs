//! Connector identity
//!
//! Every connector instance is known to a scope's transaction manager by a
//! stable opaque string. The identity is generated lazily, on the first
//! transacted send, and then cached on the connector for its whole lifetime.

use std::fmt;

use once_cell::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

/// Stable identifier of one logical connector instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorIdentity(String);

impl ConnectorIdentity {
    /// Create a fresh random identity
    pub fn generate() -> Self {
        ConnectorIdentity(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectorIdentity {
    fn from(s: &str) -> Self {
        ConnectorIdentity(s.to_string())
    }
}

/// Single-slot holder for a connector's identity.
///
/// Empty until the first call to [`get_or_generate`](Self::get_or_generate);
/// afterwards every call returns the same value.
#[derive(Debug, Default)]
pub struct IdentityCell {
    slot: OnceCell<ConnectorIdentity>,
}

impl IdentityCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell already holding `identity`
    pub fn with_identity(identity: ConnectorIdentity) -> Self {
        Self {
            slot: OnceCell::with_value(identity),
        }
    }

    /// Build a cell from a raw stored value, where the empty string is the
    /// "not yet generated" sentinel.
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            Self::new()
        } else {
            Self::with_identity(ConnectorIdentity::from(raw))
        }
    }

    pub fn get(&self) -> Option<&ConnectorIdentity> {
        self.slot.get()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.get().is_none()
    }

    pub fn get_or_generate(&self) -> &ConnectorIdentity {
        self.slot.get_or_init(|| {
            let identity = ConnectorIdentity::generate();
            debug!("Generated connector identity {}", identity);
            identity
        })
    }
}
