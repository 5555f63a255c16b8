//! Minimal-delegate clone creation.

use super::{authorize, initialization_failed, initializer_call, materialize, require_base, verify};
use crate::domain::entities::{Deployment, FactoryState, InstanceKind};
use crate::domain::invariants::CreationSnapshot;
use crate::domain::services::{
    clone_creation_code, clone_runtime_code, clone_template_hash, derive_address, keccak256,
    predict_clone_address,
};
use crate::domain::value_objects::{Address, Salt};
use crate::errors::FactoryError;
use crate::executor::Executor;
use crate::ports::outbound::LedgerState;
use tracing::debug;

/// Creates EIP-1167 clones of the factory's base implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloneEngine {
    executor: Executor,
}

impl CloneEngine {
    /// Engine running initializers on `executor`.
    #[must_use]
    pub const fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Address a clone with `salt` would get.
    #[must_use]
    pub fn predict(factory: &FactoryState, salt: Salt) -> Address {
        derive_address(
            factory.address(),
            salt,
            clone_template_hash(factory.base_implementation()),
        )
    }

    /// Creates a clone at the derived address and initializes it.
    ///
    /// The initializer is called on the clone with the factory as caller.
    ///
    /// # Errors
    ///
    /// - [`FactoryError::Unauthorized`]: caller is not a factory admin
    /// - [`FactoryError::InvalidBaseImplementation`]: no code at the base
    /// - [`FactoryError::AddressCollision`]: target already hosts code
    /// - [`FactoryError::InitializationFailed`]: initializer rejected `init_data`
    pub fn deploy(
        &self,
        state: &mut dyn LedgerState,
        factory: &FactoryState,
        caller: Address,
        salt: Salt,
        init_data: &[u8],
    ) -> Result<Deployment, FactoryError> {
        authorize(factory, caller)?;
        let base = require_base(state, factory)?;

        let predicted = predict_clone_address(factory.address(), salt, base);
        let code = clone_runtime_code(base);
        let template_hash = keccak256(clone_creation_code(base).as_slice());
        let instance = derive_address(factory.address(), salt, template_hash);
        debug!(instance = ?instance, template_hash = ?template_hash, "Derived clone address");

        let was_occupied = state.has_code(&instance);
        materialize(state, factory, instance, code)?;

        self.executor
            .call(state, factory.address(), instance, &initializer_call(init_data))
            .map_err(initialization_failed(instance))?;

        verify(&CreationSnapshot {
            kind: InstanceKind::Clone,
            predicted,
            instance,
            base_implementation: base,
            was_occupied,
            code: state.code(&instance),
            implementation_slot: None,
        })?;

        Ok(Deployment {
            instance,
            kind: InstanceKind::Clone,
            salt,
            template_hash,
        })
    }
}
