//! Transparent upgradable proxy creation.

use super::{authorize, initialization_failed, initializer_call, materialize, require_base, verify};
use crate::domain::entities::{CallContext, Deployment, FactoryState, InstanceKind};
use crate::domain::instance::UpgradableProxy;
use crate::domain::invariants::CreationSnapshot;
use crate::domain::services::{
    derive_address, keccak256, predict_proxy_address, proxy_creation_code, proxy_template_hash,
    PROXY_RUNTIME_CODE,
};
use crate::domain::value_objects::{Address, Bytes, Salt};
use crate::errors::FactoryError;
use crate::executor::{AccountStorage, Executor};
use crate::ports::outbound::LedgerState;
use tracing::debug;

/// Creates upgradable proxies pointing at the factory's base implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProxyEngine {
    executor: Executor,
}

impl ProxyEngine {
    /// Engine running initializers on `executor`.
    #[must_use]
    pub const fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Address a proxy with `salt` and `admin` would get.
    #[must_use]
    pub fn predict(factory: &FactoryState, salt: Salt, admin: Address) -> Address {
        derive_address(
            factory.address(),
            salt,
            proxy_template_hash(factory.base_implementation(), admin),
        )
    }

    /// Creates a proxy at the derived address, points it at the base
    /// implementation, records `admin` and runs the initializer through the
    /// proxy's delegate path.
    ///
    /// # Errors
    ///
    /// Same as [`CloneEngine::deploy`](super::CloneEngine::deploy), plus
    /// [`FactoryError::ZeroProxyAdmin`].
    pub fn deploy(
        &self,
        state: &mut dyn LedgerState,
        factory: &FactoryState,
        caller: Address,
        salt: Salt,
        admin: Address,
        init_data: &[u8],
    ) -> Result<Deployment, FactoryError> {
        authorize(factory, caller)?;
        let base = require_base(state, factory)?;
        if admin.is_zero() {
            return Err(FactoryError::ZeroProxyAdmin);
        }

        let predicted = predict_proxy_address(factory.address(), salt, base, admin);
        let template_hash = keccak256(proxy_creation_code(base, admin).as_slice());
        let instance = derive_address(factory.address(), salt, template_hash);
        debug!(instance = ?instance, admin = ?admin, "Derived proxy address");

        let was_occupied = state.has_code(&instance);
        materialize(
            state,
            factory,
            instance,
            Bytes::from_slice(PROXY_RUNTIME_CODE),
        )?;
        UpgradableProxy::install(&mut AccountStorage::new(state, instance, false), base, admin)
            .map_err(initialization_failed(instance))?;

        let ctx = CallContext::new(factory.address(), instance);
        self.executor
            .delegate(state, &ctx, base, &initializer_call(init_data))
            .map_err(initialization_failed(instance))?;

        let implementation_slot = {
            let arena = AccountStorage::new(state, instance, true);
            UpgradableProxy::implementation(&arena)
        };
        verify(&CreationSnapshot {
            kind: InstanceKind::UpgradableProxy,
            predicted,
            instance,
            base_implementation: base,
            was_occupied,
            code: state.code(&instance),
            implementation_slot: Some(implementation_slot),
        })?;

        Ok(Deployment {
            instance,
            kind: InstanceKind::UpgradableProxy,
            salt,
            template_hash,
        })
    }
}
