//! # Creation Engines
//!
//! [`CloneEngine`] and [`ProxyEngine`] share one pipeline:
//!
//! 1. authorize the caller against the factory admin set
//! 2. require code at the base implementation
//! 3. derive the target from (factory, salt, template hash)
//! 4. materialize code, failing on an occupied target
//! 5. run the one-time initializer with the caller's payload
//! 6. check the creation invariants
//!
//! Engines write only to the `LedgerState` they are handed. The service
//! hands them a journal and commits it only if the engine returns `Ok`.

pub mod clone;
pub mod proxy;

pub use clone::CloneEngine;
pub use proxy::ProxyEngine;

use crate::domain::abi::{Call, Token};
use crate::domain::entities::FactoryState;
use crate::domain::invariants::{check_creation_invariants, CreationSnapshot, InvariantCheckResult};
use crate::domain::value_objects::{Address, Bytes, Salt};
use crate::errors::{ExecutionError, FactoryError, StateError};
use crate::ports::outbound::LedgerState;
use tracing::warn;

/// Initializer every instance is created with. The caller's payload is
/// passed verbatim as its single `bytes` argument.
pub const INITIALIZER_SIGNATURE: &str = "initialize(bytes)";

/// Builds the initializer call for a payload.
#[must_use]
pub fn initializer_call(init_data: &[u8]) -> Call {
    Call::new(INITIALIZER_SIGNATURE, &[Token::Bytes(init_data.to_vec())])
}

/// Turns caller-supplied salt bytes into a [`Salt`].
///
/// Inputs shorter than 32 bytes are right-padded with zeroes.
///
/// # Errors
///
/// [`FactoryError::InvalidSalt`] if `bytes` is longer than 32 bytes.
pub fn parse_salt(bytes: &[u8]) -> Result<Salt, FactoryError> {
    Salt::from_slice(bytes).ok_or(FactoryError::InvalidSalt { len: bytes.len() })
}

fn authorize(factory: &FactoryState, caller: Address) -> Result<(), FactoryError> {
    factory.admins().ensure_admin(caller)
}

fn require_base(state: &dyn LedgerState, factory: &FactoryState) -> Result<Address, FactoryError> {
    let base = factory.base_implementation();
    if state.has_code(&base) {
        Ok(base)
    } else {
        Err(FactoryError::InvalidBaseImplementation(base))
    }
}

/// Writes `code` at `instance` and bumps the factory nonce.
fn materialize(
    state: &mut dyn LedgerState,
    factory: &FactoryState,
    instance: Address,
    code: Bytes,
) -> Result<(), FactoryError> {
    if state.has_code(&instance) {
        return Err(FactoryError::AddressCollision(instance));
    }
    state.set_code(instance, code).map_err(|err| match err {
        StateError::CodeAlreadyPresent(address) => FactoryError::AddressCollision(address),
        other => FactoryError::State(other),
    })?;
    state.increment_nonce(factory.address());
    Ok(())
}

fn initialization_failed(instance: Address) -> impl FnOnce(ExecutionError) -> FactoryError {
    move |err| FactoryError::InitializationFailed {
        instance,
        reason: err.to_string(),
    }
}

fn verify(snapshot: &CreationSnapshot) -> Result<(), FactoryError> {
    match check_creation_invariants(snapshot) {
        InvariantCheckResult::Valid => Ok(()),
        InvariantCheckResult::Invalid(violations) => {
            let reason = violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!(instance = ?snapshot.instance, %reason, "Creation invariant violated");
            Err(FactoryError::InvariantViolated(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_salt_pads_and_bounds() {
        let salt = parse_salt(b"abc").unwrap();
        assert_eq!(&salt.as_bytes()[..3], b"abc");
        assert!(salt.as_bytes()[3..].iter().all(|b| *b == 0));

        assert_eq!(parse_salt(&[7u8; 32]).unwrap(), Salt::new([7u8; 32]));
        assert_eq!(
            parse_salt(&[0u8; 33]),
            Err(FactoryError::InvalidSalt { len: 33 })
        );
    }

    #[test]
    fn test_initializer_call_wraps_payload() {
        let call = initializer_call(&[1, 2, 3]);
        let args = call
            .decode_args(&[crate::domain::abi::ParamType::Bytes])
            .unwrap();
        assert_eq!(args, vec![Token::Bytes(vec![1, 2, 3])]);
    }
}
