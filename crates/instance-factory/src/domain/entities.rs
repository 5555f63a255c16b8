//! # Core Domain Entities
//!
//! Main business entities of the factory domain: the factory itself, the
//! instances it creates, the call context threaded through dispatch, and the
//! journaled state changes a deployment produces.

use crate::domain::governance::AdminSet;
use crate::domain::value_objects::{Address, Bytes, Hash, Salt, StorageKey, StorageValue};
use serde::{Deserialize, Serialize};

// =============================================================================
// FACTORY
// =============================================================================

/// Immutable factory record.
///
/// Holds the base registry (one implementation address, fixed at
/// construction) and the factory-level admin set. Neither has a mutation
/// path; replacing either means deploying a new factory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FactoryState {
    address: Address,
    base_implementation: Address,
    admins: AdminSet,
}

impl FactoryState {
    /// Creates the factory record.
    #[must_use]
    pub fn new(address: Address, base_implementation: Address, admins: AdminSet) -> Self {
        Self {
            address,
            base_implementation,
            admins,
        }
    }

    /// The factory's own address, mixed into every derived address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The base implementation every instance starts from.
    #[must_use]
    pub const fn base_implementation(&self) -> Address {
        self.base_implementation
    }

    /// Factory-level governance.
    #[must_use]
    pub const fn admins(&self) -> &AdminSet {
        &self.admins
    }
}

// =============================================================================
// INSTANCES
// =============================================================================

/// How an account's code routes calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceKind {
    /// Minimal delegator to a fixed implementation.
    Clone,
    /// Proxy whose implementation lives in a reserved slot.
    UpgradableProxy,
    /// Published implementation logic running on its own storage.
    Implementation,
}

/// Result of a successful deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Address of the new instance.
    pub instance: Address,
    /// Creation strategy.
    pub kind: InstanceKind,
    /// Salt the address was derived from.
    pub salt: Salt,
    /// Hash of the creation template.
    pub template_hash: Hash,
}

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// Execution frame for a call.
///
/// `address` is the account whose storage is in scope. Under delegation the
/// code being run belongs to a different account but `address` and `caller`
/// are preserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Direct caller of the outermost call.
    pub caller: Address,
    /// Account whose storage is being read and written.
    pub address: Address,
    /// Delegation depth.
    pub depth: u16,
    /// Read-only call.
    pub is_static: bool,
}

impl CallContext {
    /// Top-level frame for a call from `caller` to `address`.
    #[must_use]
    pub fn new(caller: Address, address: Address) -> Self {
        Self {
            caller,
            address,
            depth: 0,
            is_static: false,
        }
    }

    /// Same frame, read-only.
    #[must_use]
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Frame for delegating into another account's code.
    #[must_use]
    pub fn delegated(&self) -> Self {
        Self {
            depth: self.depth.saturating_add(1),
            ..*self
        }
    }
}

// =============================================================================
// STATE CHANGE
// =============================================================================

/// State change recorded by a journal.
///
/// These changes are collected during an operation and applied atomically
/// on success. On failure, all changes are discarded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    /// Code materialized at an address.
    CodeDeployed { address: Address, code: Bytes },
    /// Write to account storage.
    StorageWrite {
        address: Address,
        key: StorageKey,
        value: StorageValue,
    },
    /// Increment account nonce.
    NonceIncrement { address: Address },
}

impl StateChange {
    /// Account touched by this change.
    #[must_use]
    pub fn address(&self) -> Address {
        match self {
            Self::CodeDeployed { address, .. }
            | Self::StorageWrite { address, .. }
            | Self::NonceIncrement { address } => *address,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
