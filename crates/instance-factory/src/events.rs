//! # Event Schema
//!
//! Events appended to the factory's log after a creation commits. The log is
//! the discovery index for instances: the factory keeps no registry of what
//! it created.
//!
//! ## Ordering
//!
//! - One entry per successful creation, never for a failed one
//! - `sequence` follows the global serial order of committed operations
//! - `correlation_id` ties the entry to the `tracing` span of the call

use crate::domain::services::keccak256;
use crate::domain::value_objects::{Address, Hash, Salt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// EVENTS
// =============================================================================

/// Creation event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum FactoryEvent {
    /// A minimal-delegate clone was created.
    CloneDeployed {
        /// New instance.
        instance: Address,
        /// Salt the address was derived from.
        salt: Salt,
    },
    /// An upgradable proxy was created.
    UpgradableProxyDeployed {
        /// New instance.
        instance: Address,
        /// Salt the address was derived from.
        salt: Salt,
    },
}

impl FactoryEvent {
    /// Event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CloneDeployed { .. } => "CloneDeployed",
            Self::UpgradableProxyDeployed { .. } => "UpgradableProxyDeployed",
        }
    }

    /// Event kind, for filtering.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CloneDeployed { .. } => EventKind::CloneDeployed,
            Self::UpgradableProxyDeployed { .. } => EventKind::UpgradableProxyDeployed,
        }
    }

    /// Created instance.
    #[must_use]
    pub fn instance(&self) -> Address {
        match self {
            Self::CloneDeployed { instance, .. } | Self::UpgradableProxyDeployed { instance, .. } => {
                *instance
            }
        }
    }

    /// Salt used.
    #[must_use]
    pub fn salt(&self) -> Salt {
        match self {
            Self::CloneDeployed { salt, .. } | Self::UpgradableProxyDeployed { salt, .. } => *salt,
        }
    }

    /// Canonical signature topic.
    #[must_use]
    pub fn topic(&self) -> Hash {
        self.kind().topic()
    }
}

/// Event discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// [`FactoryEvent::CloneDeployed`]
    CloneDeployed,
    /// [`FactoryEvent::UpgradableProxyDeployed`]
    UpgradableProxyDeployed,
}

impl EventKind {
    /// Canonical signature.
    #[must_use]
    pub fn signature(self) -> &'static str {
        match self {
            Self::CloneDeployed => topics::CLONE_DEPLOYED,
            Self::UpgradableProxyDeployed => topics::UPGRADABLE_PROXY_DEPLOYED,
        }
    }

    /// `keccak256(signature)`, as indexers key on it.
    #[must_use]
    pub fn topic(self) -> Hash {
        keccak256(self.signature().as_bytes())
    }
}

/// Canonical event signatures.
pub mod topics {
    /// `CloneDeployed(address,bytes32)`
    pub const CLONE_DEPLOYED: &str = "CloneDeployed(address,bytes32)";
    /// `UpgradableProxyDeployed(address,bytes32)`
    pub const UPGRADABLE_PROXY_DEPLOYED: &str = "UpgradableProxyDeployed(address,bytes32)";
}

// =============================================================================
// LOG ENTRY
// =============================================================================

/// One committed log record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// Correlation id of the operation that produced it.
    pub correlation_id: Uuid,
    /// Emitting factory.
    pub factory: Address,
    /// The event.
    pub event: FactoryEvent,
}

impl LogEntry {
    /// JSON form for off-process indexers.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
