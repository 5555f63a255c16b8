//! # Example Contract
//!
//! The base implementation instances are cloned from. Holds its own
//! admin list, set once by `initialize(bytes)`.
//!
//! ## Storage Layout
//!
//! | Slot | Content |
//! |------|---------|
//! | 0 | initialized flag |
//! | 1 | admin count |
//! | `keccak(addr . 2)` | `1` if `addr` is an admin |

use crate::domain::abi::{self, Call, ParamType, Selector, Token};
use crate::domain::entities::CallContext;
use crate::domain::services::mapping_slot;
use crate::domain::value_objects::{Address, Bytes, StorageKey, StorageValue, U256};
use crate::errors::{AbiError, ExecutionError};
use crate::implementations::{initializable, Implementation};
use crate::ports::outbound::StorageArena;

/// Value returned by `CONTRACT_NAME()`.
pub const CONTRACT_NAME: &str = "Example Contract";

const ADMIN_COUNT_SLOT: u64 = 1;
const ADMINS_MAPPING_SLOT: u64 = 2;

/// Function signatures understood by [`ExampleContract`].
pub mod signatures {
    /// `CONTRACT_NAME() -> string`
    pub const CONTRACT_NAME: &str = "CONTRACT_NAME()";
    /// `initialize(bytes)` where the payload is an ABI-encoded `address[]`.
    pub const INITIALIZE: &str = "initialize(bytes)";
    /// `isAdmin(address) -> bool`
    pub const IS_ADMIN: &str = "isAdmin(address)";
    /// `adminCount() -> uint256`
    pub const ADMIN_COUNT: &str = "adminCount()";
}

/// Base implementation logic.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExampleContract;

impl ExampleContract {
    /// Creates the logic object.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the `initialize(bytes)` call for an admin list.
    #[must_use]
    pub fn initialize_call(admins: &[Address]) -> Call {
        Call::new(
            signatures::INITIALIZE,
            &[Token::Bytes(init_payload(admins))],
        )
    }

    fn initialize(
        call: &Call,
        storage: &mut dyn StorageArena,
    ) -> Result<Bytes, ExecutionError> {
        initializable::begin(storage)?;

        let payload = abi::decode_one(ParamType::Bytes, call.args.as_slice())?
            .into_bytes()
            .ok_or_else(|| unexpected(ParamType::Bytes))?;
        let admins = abi::decode_one(ParamType::AddressArray, &payload)?
            .into_address_array()
            .ok_or_else(|| unexpected(ParamType::AddressArray))?;

        let mut count = 0u64;
        for admin in admins {
            if admin.is_zero() {
                return Err(ExecutionError::Revert("zero address admin".to_string()));
            }
            let slot = mapping_slot(admin, ADMINS_MAPPING_SLOT);
            if storage.sload(&slot).is_zero() {
                storage.sstore(slot, StorageValue::from_u256(U256::one()))?;
                count += 1;
            }
        }
        storage.sstore(
            StorageKey::from_u256(U256::from(ADMIN_COUNT_SLOT)),
            StorageValue::from_u256(U256::from(count)),
        )?;

        Ok(Bytes::new())
    }

    fn is_admin(call: &Call, storage: &dyn StorageArena) -> Result<Bytes, ExecutionError> {
        let who = abi::decode_one(ParamType::Address, call.args.as_slice())?
            .into_address()
            .ok_or_else(|| unexpected(ParamType::Address))?;
        let flag = !storage.sload(&mapping_slot(who, ADMINS_MAPPING_SLOT)).is_zero();
        Ok(Bytes::from(abi::encode(&[Token::Bool(flag)])))
    }
}

fn unexpected(kind: ParamType) -> ExecutionError {
    ExecutionError::Abi(AbiError::UnexpectedType(kind))
}

/// ABI-encodes an admin list as the inner `initialize` payload.
#[must_use]
pub fn init_payload(admins: &[Address]) -> Vec<u8> {
    abi::encode(&[Token::AddressArray(admins.to_vec())])
}

impl Implementation for ExampleContract {
    fn name(&self) -> &'static str {
        CONTRACT_NAME
    }

    fn runtime_code(&self) -> Bytes {
        let mut code = vec![0xfe];
        code.extend_from_slice(b"example-contract.v1");
        Bytes::from(code)
    }

    fn execute(
        &self,
        _ctx: &CallContext,
        call: &Call,
        storage: &mut dyn StorageArena,
    ) -> Result<Bytes, ExecutionError> {
        let selector = call.selector;
        if selector == Selector::from_signature(signatures::CONTRACT_NAME) {
            Ok(Bytes::from(abi::encode(&[Token::String(
                CONTRACT_NAME.to_string(),
            )])))
        } else if selector == Selector::from_signature(signatures::INITIALIZE) {
            Self::initialize(call, storage)
        } else if selector == Selector::from_signature(signatures::IS_ADMIN) {
            Self::is_admin(call, storage)
        } else if selector == Selector::from_signature(signatures::ADMIN_COUNT) {
            let count = storage
                .sload(&StorageKey::from_u256(U256::from(ADMIN_COUNT_SLOT)))
                .to_u256();
            Ok(Bytes::from(abi::encode(&[Token::Uint(count)])))
        } else {
            Err(ExecutionError::UnknownSelector(selector.0))
        }
    }
}
