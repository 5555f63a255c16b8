//! # Instance Dispatch
//!
//! Every account with code is one of three instance kinds. Resolution is
//! purely a function of the account's code; routing of a call is purely a
//! function of that code, the caller and the account's own storage.
//!
//! | Kind | Code | Routing |
//! |------|------|---------|
//! | [`DelegatingInstance`] | EIP-1167 minimal delegator | always delegate to the embedded target |
//! | [`UpgradableProxy`] | proxy stub | admin: upgrade/readers; others: delegate to slot |
//! | [`ImplementationInstance`] | registered logic | run logic on own storage |
//!
//! Instances never execute logic themselves: they return a [`Dispatch`]
//! decision and the executor carries it out, so delegation is an explicit
//! capability rather than something hidden in bytecode.

use crate::domain::abi::{self, Call, ParamType, Selector, Token};
use crate::domain::entities::{CallContext, InstanceKind};
use crate::domain::governance::InstanceAdmin;
use crate::domain::services::{is_proxy_code, parse_clone_target, slots};
use crate::domain::value_objects::{Address, Bytes, StorageValue};
use crate::errors::{AbiError, ExecutionError};
use crate::ports::outbound::StorageArena;

/// Proxy management signatures.
pub mod signatures {
    /// `upgradeTo(address)`
    pub const UPGRADE_TO: &str = "upgradeTo(address)";
    /// `upgradeToAndCall(address,bytes)`
    pub const UPGRADE_TO_AND_CALL: &str = "upgradeToAndCall(address,bytes)";
    /// `implementation() -> address`
    pub const IMPLEMENTATION: &str = "implementation()";
    /// `admin() -> address`
    pub const ADMIN: &str = "admin()";
}

/// What the executor should do with a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Return this output without running any logic.
    Return(Bytes),
    /// Run the code of `target` against the current account's storage.
    Delegate(Address),
    /// Run the logic registered for the current account's own code.
    Execute,
    /// Point the proxy at a new implementation, then optionally delegate a
    /// follow-up call to it.
    Upgrade {
        /// New implementation address.
        implementation: Address,
        /// Call delegated after the slot is rewritten.
        then_call: Option<Call>,
    },
}

/// Call routing for one account.
pub trait Instance {
    /// Account address.
    fn address(&self) -> Address;

    /// Instance kind.
    fn kind(&self) -> InstanceKind;

    /// Decide how to handle `call` in frame `ctx`.
    fn dispatch(
        &self,
        ctx: &CallContext,
        call: &Call,
        storage: &dyn StorageArena,
    ) -> Result<Dispatch, ExecutionError>;
}

// =============================================================================
// CLONE
// =============================================================================

/// Minimal delegator: forwards everything to a fixed target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelegatingInstance {
    address: Address,
    target: Address,
}

impl DelegatingInstance {
    /// Wraps a clone at `address` delegating to `target`.
    #[must_use]
    pub const fn new(address: Address, target: Address) -> Self {
        Self { address, target }
    }

    /// Address embedded in the clone's code.
    #[must_use]
    pub const fn target(&self) -> Address {
        self.target
    }
}

impl Instance for DelegatingInstance {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> InstanceKind {
        InstanceKind::Clone
    }

    fn dispatch(
        &self,
        _ctx: &CallContext,
        _call: &Call,
        _storage: &dyn StorageArena,
    ) -> Result<Dispatch, ExecutionError> {
        Ok(Dispatch::Delegate(self.target))
    }
}

// =============================================================================
// PROXY
// =============================================================================

/// Transparent upgradable proxy.
///
/// The implementation and the admin live in the EIP-1967 reserved slots of
/// the proxy's own storage, so they can never collide with the
/// implementation's sequential layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpgradableProxy {
    address: Address,
}

impl UpgradableProxy {
    /// Wraps the proxy at `address`.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self { address }
    }

    /// Current implementation pointer.
    #[must_use]
    pub fn implementation(storage: &dyn StorageArena) -> Address {
        storage.sload(&slots::IMPLEMENTATION_SLOT).to_address()
    }

    /// The proxy's own admin.
    #[must_use]
    pub fn admin(storage: &dyn StorageArena) -> InstanceAdmin {
        InstanceAdmin::new(storage.sload(&slots::ADMIN_SLOT).to_address())
    }

    /// Writes both reserved slots. Used once, when the proxy is created.
    pub fn install(
        storage: &mut dyn StorageArena,
        implementation: Address,
        admin: Address,
    ) -> Result<(), ExecutionError> {
        storage.sstore(
            slots::IMPLEMENTATION_SLOT,
            StorageValue::from_address(implementation),
        )?;
        storage.sstore(slots::ADMIN_SLOT, StorageValue::from_address(admin))
    }

    fn admin_dispatch(call: &Call, storage: &dyn StorageArena) -> Result<Dispatch, ExecutionError> {
        let selector = call.selector;
        if selector == Selector::from_signature(signatures::UPGRADE_TO) {
            let implementation = abi::decode_one(ParamType::Address, call.args.as_slice())?
                .into_address()
                .ok_or(AbiError::UnexpectedType(ParamType::Address))?;
            Ok(Dispatch::Upgrade {
                implementation,
                then_call: None,
            })
        } else if selector == Selector::from_signature(signatures::UPGRADE_TO_AND_CALL) {
            let mut tokens = call
                .decode_args(&[ParamType::Address, ParamType::Bytes])?
                .into_iter();
            let implementation = tokens
                .next()
                .and_then(Token::into_address)
                .ok_or(AbiError::UnexpectedType(ParamType::Address))?;
            let data = tokens
                .next()
                .and_then(Token::into_bytes)
                .ok_or(AbiError::UnexpectedType(ParamType::Bytes))?;
            Ok(Dispatch::Upgrade {
                implementation,
                then_call: Some(Call::from_calldata(&data)?),
            })
        } else if selector == Selector::from_signature(signatures::IMPLEMENTATION) {
            let out = abi::encode(&[Token::Address(Self::implementation(storage))]);
            Ok(Dispatch::Return(Bytes::from(out)))
        } else if selector == Selector::from_signature(signatures::ADMIN) {
            let out = abi::encode(&[Token::Address(Self::admin(storage).address())]);
            Ok(Dispatch::Return(Bytes::from(out)))
        } else {
            Err(ExecutionError::AdminCannotFallback)
        }
    }

    fn is_management(selector: Selector) -> bool {
        selector == Selector::from_signature(signatures::UPGRADE_TO)
            || selector == Selector::from_signature(signatures::UPGRADE_TO_AND_CALL)
    }
}

impl Instance for UpgradableProxy {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> InstanceKind {
        InstanceKind::UpgradableProxy
    }

    fn dispatch(
        &self,
        ctx: &CallContext,
        call: &Call,
        storage: &dyn StorageArena,
    ) -> Result<Dispatch, ExecutionError> {
        let admin = Self::admin(storage);
        if Self::is_management(call.selector) {
            admin.ensure(ctx.caller)?;
            return Self::admin_dispatch(call, storage);
        }
        if admin.is(&ctx.caller) {
            return Self::admin_dispatch(call, storage);
        }
        Ok(Dispatch::Delegate(Self::implementation(storage)))
    }
}

// =============================================================================
// IMPLEMENTATION
// =============================================================================

/// A published implementation called directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImplementationInstance {
    address: Address,
}

impl ImplementationInstance {
    /// Wraps the implementation account at `address`.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self { address }
    }
}

impl Instance for ImplementationInstance {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> InstanceKind {
        InstanceKind::Implementation
    }

    fn dispatch(
        &self,
        _ctx: &CallContext,
        _call: &Call,
        _storage: &dyn StorageArena,
    ) -> Result<Dispatch, ExecutionError> {
        Ok(Dispatch::Execute)
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolves the instance hosted at `address` from its code.
pub fn resolve_instance(address: Address, code: &[u8]) -> Result<Box<dyn Instance>, ExecutionError> {
    if code.is_empty() {
        return Err(ExecutionError::NoCode(address));
    }
    if let Some(target) = parse_clone_target(code) {
        return Ok(Box::new(DelegatingInstance::new(address, target)));
    }
    if is_proxy_code(code) {
        return Ok(Box::new(UpgradableProxy::new(address)));
    }
    Ok(Box::new(ImplementationInstance::new(address)))
}

// =============================================================================
// TESTS
// =============================================================================
