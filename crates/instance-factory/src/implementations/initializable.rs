//! One-time initializer guard.
//!
//! Instances created through indirection never run a constructor, so state
//! setup happens in an explicit `initialize` call guarded by a flag in slot 0
//! of the instance's own storage.

use crate::domain::value_objects::{StorageKey, StorageValue, U256};
use crate::errors::ExecutionError;
use crate::ports::outbound::StorageArena;

/// Slot holding the initialized flag.
pub const INITIALIZED_SLOT: StorageKey = StorageKey::ZERO;

/// True once `initialize` has completed on this arena.
#[must_use]
pub fn is_initialized(storage: &dyn StorageArena) -> bool {
    !storage.sload(&INITIALIZED_SLOT).is_zero()
}

/// Marks the arena initialized, failing if it already is.
///
/// Call before any other initializer writes; the caller's journal discards
/// the flag if the rest of the initializer fails.
pub fn begin(storage: &mut dyn StorageArena) -> Result<(), ExecutionError> {
    if is_initialized(storage) {
        return Err(ExecutionError::AlreadyInitialized);
    }
    storage.sstore(INITIALIZED_SLOT, StorageValue::from_u256(U256::one()))
}
