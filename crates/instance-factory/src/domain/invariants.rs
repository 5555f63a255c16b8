//! # Domain Invariants
//!
//! Invariants that MUST hold after every instance creation. Engines gather a
//! [`CreationSnapshot`] from the pending journal and check it before the
//! journal is committed; a violation aborts the whole operation.
//!
//! - INVARIANT-1: Deterministic Placement (instance lands at the predicted address)
//! - INVARIANT-2: Clone Code Identity (byte-exact minimal delegator to the base)
//! - INVARIANT-3: Proxy Initial Pointer (implementation slot equals the base)
//! - INVARIANT-4: Single Occupancy (target address was empty before creation)
//! - INVARIANT-5: Failure Atomicity (failed operations leave no changes and no events)

use crate::domain::entities::InstanceKind;
use crate::domain::services::{clone_runtime_code, PROXY_RUNTIME_CODE};
use crate::domain::value_objects::{Address, Bytes};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// State observed for a freshly created instance, before commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreationSnapshot {
    /// Creation strategy.
    pub kind: InstanceKind,
    /// Address computed before materialization.
    pub predicted: Address,
    /// Address the code was actually written to.
    pub instance: Address,
    /// Base implementation registered on the factory.
    pub base_implementation: Address,
    /// Whether the target hosted code before this operation.
    pub was_occupied: bool,
    /// Code at `instance` after creation.
    pub code: Bytes,
    /// Implementation slot of the instance (proxies only).
    pub implementation_slot: Option<Address>,
}

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// INVARIANT-1: Deterministic Placement
#[must_use]
pub fn check_placement_invariant(snapshot: &CreationSnapshot) -> bool {
    snapshot.predicted == snapshot.instance
}

/// INVARIANT-2: Clone Code Identity
///
/// A clone's code is exactly the minimal delegator embedding the base
/// implementation address; it has no other behavior.
#[must_use]
pub fn check_clone_code_invariant(snapshot: &CreationSnapshot) -> bool {
    match snapshot.kind {
        InstanceKind::Clone => snapshot.code == clone_runtime_code(snapshot.base_implementation),
        _ => true,
    }
}

/// INVARIANT-3: Proxy Initial Pointer
///
/// A fresh proxy runs the proxy stub and points at the base implementation.
#[must_use]
pub fn check_proxy_pointer_invariant(snapshot: &CreationSnapshot) -> bool {
    match snapshot.kind {
        InstanceKind::UpgradableProxy => {
            snapshot.code.as_slice() == PROXY_RUNTIME_CODE
                && snapshot.implementation_slot == Some(snapshot.base_implementation)
        }
        _ => true,
    }
}

/// INVARIANT-4: Single Occupancy
#[must_use]
pub fn check_single_occupancy_invariant(snapshot: &CreationSnapshot) -> bool {
    !snapshot.was_occupied
}

/// INVARIANT-5: Failure Atomicity
///
/// After a failed operation nothing was applied to the ledger and nothing
/// was appended to the event log.
#[must_use]
pub fn check_failure_atomicity_invariant(
    applied_changes: usize,
    events_before: usize,
    events_after: usize,
) -> bool {
    applied_changes == 0 && events_before == events_after
}

/// Check all creation invariants at once.
#[must_use]
pub fn check_creation_invariants(snapshot: &CreationSnapshot) -> InvariantCheckResult {
    let mut violations = Vec::new();

    if !check_placement_invariant(snapshot) {
        violations.push(InvariantViolation::AddressMismatch {
            predicted: snapshot.predicted,
            actual: snapshot.instance,
        });
    }

    if !check_clone_code_invariant(snapshot) {
        violations.push(InvariantViolation::CloneCodeMismatch {
            instance: snapshot.instance,
        });
    }

    if !check_proxy_pointer_invariant(snapshot) {
        violations.push(InvariantViolation::ProxyPointerMismatch {
            expected: snapshot.base_implementation,
            actual: snapshot.implementation_slot,
        });
    }

    if !check_single_occupancy_invariant(snapshot) {
        violations.push(InvariantViolation::AddressReused {
            instance: snapshot.instance,
        });
    }

    if violations.is_empty() {
        InvariantCheckResult::Valid
    } else {
        InvariantCheckResult::Invalid(violations)
    }
}

// =============================================================================
// INVARIANT TYPES
// =============================================================================

/// Result of checking all invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantCheckResult {
    /// All invariants hold.
    Valid,
    /// One or more invariants violated.
    Invalid(Vec<InvariantViolation>),
}

impl InvariantCheckResult {
    /// Returns true if all invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Specific invariant violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Instance did not land at the predicted address.
    AddressMismatch { predicted: Address, actual: Address },
    /// Clone code is not the canonical minimal delegator.
    CloneCodeMismatch { instance: Address },
    /// Proxy stub or initial implementation pointer is wrong.
    ProxyPointerMismatch {
        expected: Address,
        actual: Option<Address>,
    },
    /// Target address already hosted code.
    AddressReused { instance: Address },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressMismatch { predicted, actual } => {
                write!(f, "instance at {actual:?}, predicted {predicted:?}")
            }
            Self::CloneCodeMismatch { instance } => {
                write!(f, "clone code mismatch at {instance:?}")
            }
            Self::ProxyPointerMismatch { expected, actual } => {
                write!(f, "proxy pointer {actual:?}, expected {expected:?}")
            }
            Self::AddressReused { instance } => {
                write!(f, "address {instance:?} already occupied")
            }
        }
    }
}

// =============================================================================
// LIMIT CONSTANTS
// =============================================================================

/// Execution limits.
pub mod limits {
    /// Maximum delegation depth.
    pub const MAX_CALL_DEPTH: u16 = 1024;
}

// =============================================================================
// TESTS
// =============================================================================
