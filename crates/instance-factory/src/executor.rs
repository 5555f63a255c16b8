//! # Call Executor
//!
//! Carries out calls against instances on a [`LedgerState`].
//!
//! Each frame resolves the code at the code address into an [`Instance`],
//! asks it for a [`Dispatch`] decision and executes that decision. Storage in
//! scope is always that of `ctx.address`, so delegation runs foreign logic
//! against the delegating account's own storage.

use crate::adapters::Journal;
use crate::domain::abi::Call;
use crate::domain::entities::CallContext;
use crate::domain::instance::{resolve_instance, Dispatch, Instance};
use crate::domain::invariants::limits;
use crate::domain::services::{is_proxy_code, keccak256, parse_clone_target, slots};
use crate::domain::value_objects::{Address, Bytes, StorageKey, StorageValue};
use crate::errors::ExecutionError;
use crate::ports::outbound::{LedgerState, StorageArena};
use std::borrow::Cow;
use tracing::{debug, trace};

// =============================================================================
// STORAGE ARENA
// =============================================================================

/// Storage of one account, viewed through the ledger.
pub struct AccountStorage<'a> {
    state: &'a mut dyn LedgerState,
    address: Address,
    is_static: bool,
}

impl<'a> AccountStorage<'a> {
    /// Arena for `address`.
    pub fn new(state: &'a mut dyn LedgerState, address: Address, is_static: bool) -> Self {
        Self {
            state,
            address,
            is_static,
        }
    }
}

impl StorageArena for AccountStorage<'_> {
    fn sload(&self, key: &StorageKey) -> StorageValue {
        self.state.storage(&self.address, key)
    }

    fn sstore(&mut self, key: StorageKey, value: StorageValue) -> Result<(), ExecutionError> {
        if self.is_static {
            return Err(ExecutionError::WriteInStaticContext);
        }
        self.state.set_storage(self.address, key, value);
        Ok(())
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Call executor.
#[derive(Clone, Copy, Debug)]
pub struct Executor {
    max_call_depth: u16,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(limits::MAX_CALL_DEPTH)
    }
}

impl Executor {
    /// Create an executor with a delegation depth limit.
    #[must_use]
    pub const fn new(max_call_depth: u16) -> Self {
        Self { max_call_depth }
    }

    /// Maximum delegation depth.
    #[must_use]
    pub const fn max_call_depth(&self) -> u16 {
        self.max_call_depth
    }

    /// Call `to` as `caller`.
    pub fn call(
        &self,
        state: &mut dyn LedgerState,
        caller: Address,
        to: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        self.run(state, CallContext::new(caller, to), to, call)
    }

    /// Read-only call. Runs on a throwaway journal; every storage write in
    /// the frame fails with [`ExecutionError::WriteInStaticContext`].
    pub fn static_call(
        &self,
        state: &dyn LedgerState,
        caller: Address,
        to: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        let mut journal = Journal::new(state);
        self.run(
            &mut journal,
            CallContext::new(caller, to).into_static(),
            to,
            call,
        )
    }

    /// Run the code at `code_address` in the frame `ctx`, one level deeper.
    ///
    /// This is how a proxy runs its initializer while being created: the
    /// implementation's logic executes against the proxy's storage without
    /// going through the proxy's own routing.
    pub fn delegate(
        &self,
        state: &mut dyn LedgerState,
        ctx: &CallContext,
        code_address: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        self.run(state, ctx.delegated(), code_address, call)
    }

    /// Executes frames until one returns.
    ///
    /// Delegation and the call following an upgrade are tail positions, so
    /// each next frame replaces the current one instead of nesting. Stack use
    /// stays flat and only `max_call_depth` bounds a delegation chain.
    fn run(
        &self,
        state: &mut dyn LedgerState,
        mut ctx: CallContext,
        mut code_address: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        let mut call = Cow::Borrowed(call);

        loop {
            if ctx.depth > self.max_call_depth {
                return Err(ExecutionError::CallDepthExceeded {
                    depth: ctx.depth,
                    max: self.max_call_depth,
                });
            }

            let code = state.code(&code_address);
            let instance = resolve_instance(code_address, code.as_slice())?;
            let decision = {
                let arena = AccountStorage::new(state, ctx.address, ctx.is_static);
                instance.dispatch(&ctx, &call, &arena)?
            };

            trace!(
                depth = ctx.depth,
                kind = ?instance.kind(),
                code_address = ?code_address,
                selector = ?call.selector,
                "Dispatch"
            );

            match decision {
                Dispatch::Return(out) => return Ok(out),
                Dispatch::Delegate(target) => {
                    ctx = ctx.delegated();
                    code_address = target;
                }
                Dispatch::Execute => {
                    let logic = state
                        .implementation_logic(&keccak256(code.as_slice()))
                        .ok_or(ExecutionError::UnknownCode(code_address))?;
                    let mut arena = AccountStorage::new(state, ctx.address, ctx.is_static);
                    return logic.execute(&ctx, &call, &mut arena);
                }
                Dispatch::Upgrade {
                    implementation,
                    then_call,
                } => {
                    check_upgrade_target(&*state, ctx.address, implementation)?;
                    AccountStorage::new(state, ctx.address, ctx.is_static).sstore(
                        slots::IMPLEMENTATION_SLOT,
                        StorageValue::from_address(implementation),
                    )?;
                    debug!(
                        proxy = ?ctx.address,
                        implementation = ?implementation,
                        "Implementation upgraded"
                    );
                    match then_call {
                        Some(inner) => {
                            ctx = ctx.delegated();
                            code_address = implementation;
                            call = Cow::Owned(inner);
                        }
                        None => return Ok(Bytes::new()),
                    }
                }
            }
        }
    }
}

/// A proxy may only point at code that ends the delegation chain: not at
/// itself, not at another proxy, and not at a clone of itself.
fn check_upgrade_target(
    state: &dyn LedgerState,
    proxy: Address,
    implementation: Address,
) -> Result<(), ExecutionError> {
    let code = state.code(&implementation);
    let rejected = code.is_empty()
        || implementation == proxy
        || is_proxy_code(code.as_slice())
        || parse_clone_target(code.as_slice()) == Some(proxy);
    if rejected {
        return Err(ExecutionError::InvalidImplementation(implementation));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
