//! # Factory Service
//!
//! Async entry points over the shared ledger.
//!
//! ## Serial Ordering
//!
//! Every mutating operation takes the ledger's write lock, runs against a
//! fresh [`Journal`](crate::adapters::Journal) and applies the journal only
//! on success. The event for a creation is appended while the lock is still
//! held, so log order equals commit order. Reads take the read lock and
//! always see the latest committed state.

pub mod factory;
pub mod gateway;

pub use factory::{FactoryService, FACTORY_RUNTIME_CODE};
pub use gateway::LedgerGateway;

use serde::{Deserialize, Serialize};

/// Statistics for the factory service and its gateway.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Clones created.
    pub clones_deployed: u64,
    /// Proxies created.
    pub proxies_deployed: u64,
    /// Proxy upgrades committed.
    pub upgrades: u64,
    /// Operations rejected for an unauthorized caller.
    pub rejected_unauthorized: u64,
    /// Deployments rejected because the target was occupied.
    pub collisions: u64,
    /// Deployments that failed for any reason, collisions and
    /// authorization failures included.
    pub failed_deployments: u64,
}

impl ServiceStats {
    /// Total successful creations.
    #[must_use]
    pub fn instances_deployed(&self) -> u64 {
        self.clones_deployed + self.proxies_deployed
    }
}
