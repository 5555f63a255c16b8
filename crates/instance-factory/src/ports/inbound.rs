//! # Driving Ports (API - Inbound)
//!
//! Interfaces exposed to callers of the factory and of the instances it
//! creates.
//!
//! ## Architecture Compliance
//!
//! - These traits define the public API of the crate
//! - Every mutating operation is atomic: it commits fully or not at all
//! - Authorization is always checked against the direct `caller` argument

use crate::domain::abi::Call;
use crate::domain::value_objects::{Address, Bytes, Salt, StorageKey, StorageValue};
use crate::errors::{ExecutionError, FactoryError};
use async_trait::async_trait;

// =============================================================================
// FACTORY API
// =============================================================================

/// Deterministic instance factory.
#[async_trait]
pub trait FactoryApi: Send + Sync {
    /// The factory's own address.
    fn factory_address(&self) -> Address;

    /// The implementation every instance starts from.
    fn base_implementation(&self) -> Address;

    /// Factory-level admin check.
    fn is_admin(&self, address: &Address) -> bool;

    /// Address a clone with `salt` would be created at.
    fn predict_clone_address(&self, salt: Salt) -> Address;

    /// Address a proxy with `salt` and `admin` would be created at.
    fn predict_proxy_address(&self, salt: Salt, admin: Address) -> Address;

    /// Create and initialize a minimal-delegate clone.
    ///
    /// `init_data` is forwarded verbatim to the instance's initializer.
    async fn deploy_deterministic_clone(
        &self,
        caller: Address,
        salt: Salt,
        init_data: &[u8],
    ) -> Result<Address, FactoryError>;

    /// Create and initialize an upgradable proxy administered by `admin`.
    async fn deploy_deterministic_upgradable_proxy(
        &self,
        caller: Address,
        salt: Salt,
        admin: Address,
        init_data: &[u8],
    ) -> Result<Address, FactoryError>;
}

// =============================================================================
// INSTANCE API
// =============================================================================

/// Calls against any account hosting code.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// State-changing call. Committed only if it succeeds.
    async fn call(&self, caller: Address, to: Address, call: &Call) -> Result<Bytes, ExecutionError>;

    /// Read-only call.
    async fn static_call(
        &self,
        caller: Address,
        to: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError>;

    /// Retarget a proxy. Only the proxy's own admin may do this.
    async fn upgrade_to(
        &self,
        caller: Address,
        proxy: Address,
        implementation: Address,
    ) -> Result<(), ExecutionError>;

    /// Retarget a proxy and run `then_call` through it, atomically.
    async fn upgrade_to_and_call(
        &self,
        caller: Address,
        proxy: Address,
        implementation: Address,
        then_call: &Call,
    ) -> Result<Bytes, ExecutionError>;

    /// Raw storage read, open to anyone.
    async fn storage_at(&self, address: Address, key: StorageKey) -> StorageValue;

    /// Code at an address (empty if none).
    async fn code_at(&self, address: Address) -> Bytes;

    /// A proxy's implementation pointer, read from its reserved slot.
    async fn implementation_of(&self, proxy: Address) -> Address;
}
