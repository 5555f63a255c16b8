//! # Implementation Logic
//!
//! Logic that instances delegate to. An implementation is published once at
//! a nonce-derived address; its runtime code is registered with the ledger
//! by hash so any account whose code resolves to it (the implementation
//! itself, a clone, a proxy) can run it against that account's own storage.

pub mod dummy;
pub mod example;
pub mod initializable;

pub use dummy::DummyImplementation;
pub use example::ExampleContract;

use crate::domain::abi::Call;
use crate::domain::entities::CallContext;
use crate::domain::value_objects::Bytes;
use crate::errors::ExecutionError;
use crate::ports::outbound::StorageArena;
use std::fmt;

/// Logic shared by every instance that delegates to it.
pub trait Implementation: Send + Sync + fmt::Debug {
    /// Human-readable contract name.
    fn name(&self) -> &'static str;

    /// Runtime code published at the implementation's address. Must be
    /// unique per implementation type; the ledger routes by its hash.
    fn runtime_code(&self) -> Bytes;

    /// Execute `call` against `storage`.
    ///
    /// `ctx.address` is the account owning `storage`, which under delegation
    /// is the clone or proxy, never the implementation.
    fn execute(
        &self,
        ctx: &CallContext,
        call: &Call,
        storage: &mut dyn StorageArena,
    ) -> Result<Bytes, ExecutionError>;
}
