//! # Ledger Adapter
//!
//! In-memory ledger hosting code, storage and nonces, plus the [`Journal`]
//! overlay every operation runs against.
//!
//! Operations never write to the ledger directly: they run on a journal,
//! and the service applies the journal's recorded changes only once the
//! whole operation has succeeded. Dropping a journal discards everything.

use crate::domain::entities::StateChange;
use crate::domain::services::{compute_contract_address, keccak256};
use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue};
use crate::errors::StateError;
use crate::implementations::Implementation;
use crate::ports::outbound::LedgerState;
use std::collections::HashMap;
use std::sync::Arc;

/// Ledger shared between the service and its readers.
pub type SharedLedger = Arc<tokio::sync::RwLock<InMemoryLedger>>;

// =============================================================================
// IN-MEMORY LEDGER
// =============================================================================

/// Committed ledger state.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    code: HashMap<Address, Bytes>,
    storage: HashMap<(Address, StorageKey), StorageValue>,
    nonces: HashMap<Address, u64>,
    logic: HashMap<Hash, Arc<dyn Implementation>>,
    revision: usize,
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in the shared handle the service expects.
    #[must_use]
    pub fn into_shared(self) -> SharedLedger {
        Arc::new(tokio::sync::RwLock::new(self))
    }

    /// Register logic so any account running its runtime code can execute it.
    pub fn register_logic(&mut self, logic: Arc<dyn Implementation>) -> Hash {
        let hash = keccak256(logic.runtime_code().as_slice());
        self.logic.insert(hash, logic);
        hash
    }

    /// Publish an implementation at `CREATE(deployer, nonce)`.
    ///
    /// Registers its logic, writes its runtime code and bumps the deployer's
    /// nonce.
    pub fn publish(
        &mut self,
        deployer: Address,
        logic: Arc<dyn Implementation>,
    ) -> Result<Address, StateError> {
        let code = logic.runtime_code();
        let address = compute_contract_address(deployer, self.nonce(&deployer));
        self.set_code(address, code)?;
        self.increment_nonce(deployer);
        self.register_logic(logic);
        Ok(address)
    }

    /// Apply journaled changes, returning how many were applied.
    pub fn apply(&mut self, changes: Vec<StateChange>) -> usize {
        let count = changes.len();
        self.revision += count;
        for change in changes {
            match change {
                StateChange::CodeDeployed { address, code } => {
                    self.code.insert(address, code);
                }
                StateChange::StorageWrite {
                    address,
                    key,
                    value,
                } => {
                    self.storage.insert((address, key), value);
                }
                StateChange::NonceIncrement { address } => {
                    *self.nonces.entry(address).or_insert(0) += 1;
                }
            }
        }
        count
    }

    /// Number of writes committed so far, direct or applied.
    #[must_use]
    pub fn revision(&self) -> usize {
        self.revision
    }

    /// Number of accounts hosting code.
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.code.len()
    }
}

impl LedgerState for InMemoryLedger {
    fn code(&self, address: &Address) -> Bytes {
        self.code.get(address).cloned().unwrap_or_default()
    }

    fn storage(&self, address: &Address, key: &StorageKey) -> StorageValue {
        self.storage
            .get(&(*address, *key))
            .copied()
            .unwrap_or(StorageValue::ZERO)
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.nonces.get(address).copied().unwrap_or(0)
    }

    fn implementation_logic(&self, code_hash: &Hash) -> Option<Arc<dyn Implementation>> {
        self.logic.get(code_hash).cloned()
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        if code.is_empty() {
            return Err(StateError::EmptyCode(address));
        }
        if self.code.contains_key(&address) {
            return Err(StateError::CodeAlreadyPresent(address));
        }
        self.code.insert(address, code);
        self.revision += 1;
        Ok(())
    }

    fn set_storage(&mut self, address: Address, key: StorageKey, value: StorageValue) {
        self.storage.insert((address, key), value);
        self.revision += 1;
    }

    fn increment_nonce(&mut self, address: Address) -> u64 {
        self.revision += 1;
        let nonce = self.nonces.entry(address).or_insert(0);
        let previous = *nonce;
        *nonce += 1;
        previous
    }
}

// =============================================================================
// JOURNAL
// =============================================================================

/// Uncommitted overlay over a base state.
///
/// Reads fall through to the base; writes land in the overlay and are
/// recorded in order. Journals nest: a journal can use another journal as
/// its base.
pub struct Journal<'a> {
    base: &'a dyn LedgerState,
    code: HashMap<Address, Bytes>,
    storage: HashMap<(Address, StorageKey), StorageValue>,
    nonces: HashMap<Address, u64>,
    changes: Vec<StateChange>,
}

impl<'a> Journal<'a> {
    /// Opens an empty journal over `base`.
    pub fn new(base: &'a dyn LedgerState) -> Self {
        Self {
            base,
            code: HashMap::new(),
            storage: HashMap::new(),
            nonces: HashMap::new(),
            changes: Vec::new(),
        }
    }

    /// Changes recorded so far.
    #[must_use]
    pub fn changes(&self) -> &[StateChange] {
        &self.changes
    }

    /// Consumes the journal, yielding the changes to commit.
    #[must_use]
    pub fn into_changes(self) -> Vec<StateChange> {
        self.changes
    }
}

impl LedgerState for Journal<'_> {
    fn code(&self, address: &Address) -> Bytes {
        match self.code.get(address) {
            Some(code) => code.clone(),
            None => self.base.code(address),
        }
    }

    fn storage(&self, address: &Address, key: &StorageKey) -> StorageValue {
        match self.storage.get(&(*address, *key)) {
            Some(value) => *value,
            None => self.base.storage(address, key),
        }
    }

    fn nonce(&self, address: &Address) -> u64 {
        match self.nonces.get(address) {
            Some(nonce) => *nonce,
            None => self.base.nonce(address),
        }
    }

    fn implementation_logic(&self, code_hash: &Hash) -> Option<Arc<dyn Implementation>> {
        self.base.implementation_logic(code_hash)
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        if code.is_empty() {
            return Err(StateError::EmptyCode(address));
        }
        if self.has_code(&address) {
            return Err(StateError::CodeAlreadyPresent(address));
        }
        self.code.insert(address, code.clone());
        self.changes.push(StateChange::CodeDeployed { address, code });
        Ok(())
    }

    fn set_storage(&mut self, address: Address, key: StorageKey, value: StorageValue) {
        self.storage.insert((address, key), value);
        self.changes.push(StateChange::StorageWrite {
            address,
            key,
            value,
        });
    }

    fn increment_nonce(&mut self, address: Address) -> u64 {
        let previous = self.nonce(&address);
        self.nonces.insert(address, previous + 1);
        self.changes.push(StateChange::NonceIncrement { address });
        previous
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implementations::ExampleContract;

    const A: Address = Address::new([0xaa; 20]);

    fn word(b: u8) -> StorageValue {
        StorageValue::new([b; 32])
    }

    #[test]
    fn test_code_is_write_once() {
        let mut ledger = InMemoryLedger::new();
        ledger.set_code(A, Bytes::from_slice(&[0xfe])).unwrap();

        assert_eq!(
            ledger.set_code(A, Bytes::from_slice(&[0xfe, 0x00])),
            Err(StateError::CodeAlreadyPresent(A))
        );
        assert_eq!(
            ledger.set_code(Address::ZERO, Bytes::new()),
            Err(StateError::EmptyCode(Address::ZERO))
        );
    }

    #[test]
    fn test_publish_uses_create_address_and_registers_logic() {
        let mut ledger = InMemoryLedger::new();
        let deployer = Address::new([0xde; 20]);

        let first = ledger.publish(deployer, Arc::new(ExampleContract)).unwrap();
        assert_eq!(first, compute_contract_address(deployer, 0));
        assert_eq!(ledger.nonce(&deployer), 1);

        let hash = keccak256(ledger.code(&first).as_slice());
        assert!(ledger.implementation_logic(&hash).is_some());
    }

    #[test]
    fn test_journal_reads_through_and_records() {
        let mut ledger = InMemoryLedger::new();
        ledger.set_storage(A, StorageKey::ZERO, word(1));

        let mut journal = Journal::new(&ledger);
        assert_eq!(journal.storage(&A, &StorageKey::ZERO), word(1));

        journal.set_storage(A, StorageKey::ZERO, word(2));
        journal.set_code(A, Bytes::from_slice(&[0xfe])).unwrap();
        journal.increment_nonce(A);

        assert_eq!(journal.storage(&A, &StorageKey::ZERO), word(2));
        assert_eq!(journal.nonce(&A), 1);
        assert_eq!(journal.changes().len(), 3);

        // base untouched until applied
        let changes = journal.into_changes();
        assert_eq!(ledger.storage(&A, &StorageKey::ZERO), word(1));

        let revision = ledger.revision();
        assert_eq!(ledger.apply(changes), 3);
        assert_eq!(ledger.revision(), revision + 3);
        assert_eq!(ledger.storage(&A, &StorageKey::ZERO), word(2));
        assert!(ledger.has_code(&A));
        assert_eq!(ledger.nonce(&A), 1);
    }

    #[test]
    fn test_journal_rejects_code_present_in_base() {
        let mut ledger = InMemoryLedger::new();
        ledger.set_code(A, Bytes::from_slice(&[0xfe])).unwrap();

        let mut journal = Journal::new(&ledger);
        assert_eq!(
            journal.set_code(A, Bytes::from_slice(&[0xfe])),
            Err(StateError::CodeAlreadyPresent(A))
        );
        assert!(journal.changes().is_empty());
    }

    #[test]
    fn test_dropped_journal_discards() {
        let ledger = InMemoryLedger::new();
        {
            let mut journal = Journal::new(&ledger);
            journal.set_storage(A, StorageKey::ZERO, word(9));
        }
        assert_eq!(ledger.storage(&A, &StorageKey::ZERO), StorageValue::ZERO);
    }

    #[test]
    fn test_nested_journal() {
        let ledger = InMemoryLedger::new();
        let mut outer = Journal::new(&ledger);
        outer.set_storage(A, StorageKey::ZERO, word(1));

        let inner_changes = {
            let mut inner = Journal::new(&outer);
            assert_eq!(inner.storage(&A, &StorageKey::ZERO), word(1));
            inner.set_storage(A, StorageKey::ZERO, word(2));
            inner.into_changes()
        };
        assert_eq!(inner_changes.len(), 1);
        assert_eq!(outer.storage(&A, &StorageKey::ZERO), word(1));
    }
}
