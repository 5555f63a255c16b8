//! # Driven Ports (SPI - Outbound)
//!
//! These are the interfaces the factory depends on:
//! - Ledger state (code, storage, nonces, registered implementation logic)
//! - The per-account storage arena handed to implementation logic
//! - The append-only event log consumed by indexers
//!
//! ## Architecture Compliance
//!
//! - Dependencies point INWARD (adapters implement these traits)
//! - Engines only ever see a journaled `LedgerState`; commits happen in the
//!   service once an operation has fully succeeded

use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue};
use crate::errors::{ExecutionError, StateError};
use crate::events::{EventKind, FactoryEvent, LogEntry};
use crate::implementations::Implementation;
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// LEDGER STATE
// =============================================================================

/// Interface for reading and writing ledger state.
///
/// ## Implementation Notes
///
/// Code is write-once: `set_code` on an occupied address must fail with
/// [`StateError::CodeAlreadyPresent`]. Storage reads of unwritten slots
/// return zero.
pub trait LedgerState: Send + Sync {
    /// Contract code (empty if none).
    fn code(&self, address: &Address) -> Bytes;

    /// Storage word (zero if never written).
    fn storage(&self, address: &Address, key: &StorageKey) -> StorageValue;

    /// Account nonce.
    fn nonce(&self, address: &Address) -> u64;

    /// Logic registered for code with the given hash.
    fn implementation_logic(&self, code_hash: &Hash) -> Option<Arc<dyn Implementation>>;

    /// Materialize code at an address.
    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError>;

    /// Write a storage word.
    fn set_storage(&mut self, address: Address, key: StorageKey, value: StorageValue);

    /// Increment the nonce, returning the value before the increment.
    fn increment_nonce(&mut self, address: Address) -> u64;

    /// Check if an address hosts code.
    fn has_code(&self, address: &Address) -> bool {
        !self.code(address).is_empty()
    }
}

// =============================================================================
// STORAGE ARENA
// =============================================================================

/// Private storage of the account a call is executing against.
///
/// Implementation logic never sees any other account's storage: under
/// delegation the arena belongs to the delegating instance, not to the
/// implementation.
pub trait StorageArena {
    /// Read a word.
    fn sload(&self, key: &StorageKey) -> StorageValue;

    /// Write a word. Fails in a read-only frame.
    fn sstore(&mut self, key: StorageKey, value: StorageValue) -> Result<(), ExecutionError>;
}

// =============================================================================
// EVENT LOG
// =============================================================================

/// Append-only log of successful creations.
pub trait EventLog: Send + Sync {
    /// Append one event emitted by `factory`, returning the stored entry.
    fn append(&self, factory: Address, correlation_id: Uuid, event: FactoryEvent) -> LogEntry;

    /// Snapshot of all entries in sequence order.
    fn entries(&self) -> Vec<LogEntry>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// True when nothing has been logged.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries of one kind, in sequence order.
    fn filter(&self, kind: EventKind) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.event.kind() == kind)
            .collect()
    }
}
