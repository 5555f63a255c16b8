//! # Instance Factory - Deterministic Clones and Upgradable Proxies
//!
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! An admin-gated factory that creates instances of a single base
//! implementation at addresses computable in advance from the factory
//! address, a 32-byte salt and the creation template (CREATE2 derivation).
//! Two instance kinds are supported:
//!
//! - **Clones**: minimal forwarding instances (EIP-1167 layout) that
//!   delegate every call to the base implementation.
//! - **Upgradable proxies**: transparent proxies whose implementation
//!   pointer lives in the EIP-1967 slot and can be retargeted by the
//!   proxy's own admin.
//!
//! Every instance is initialized exactly once, in the same atomic step that
//! creates it, and every successful creation appends exactly one event.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Address Determinism | `domain/services.rs` - `derive_address()` |
//! | INVARIANT-2 | Single Occupancy | `engine/mod.rs` - `materialize()` |
//! | INVARIANT-3 | Clone Embeds Base | `domain/invariants.rs` - `check_clone_code_invariant()` |
//! | INVARIANT-4 | Proxy Points At Base | `domain/invariants.rs` - `check_proxy_pointer_invariant()` |
//! | INVARIANT-5 | Failure Atomicity | `service/factory.rs` - `transact()` |
//! | INVARIANT-6 | Static Call Purity | `executor.rs` - `AccountStorage::sstore()` |
//! | INVARIANT-7 | One-Time Initialization | `implementations/initializable.rs` - `begin()` |
//!
//! ## Authorization
//!
//! | Operation | Authorized Caller(s) | Enforcement |
//! |-----------|---------------------|-------------|
//! | `deploy_deterministic_clone` | Factory admins | `engine/mod.rs` - `authorize()` |
//! | `deploy_deterministic_upgradable_proxy` | Factory admins | `engine/mod.rs` - `authorize()` |
//! | `upgradeTo` / `upgradeToAndCall` | Proxy admin only | `domain/instance.rs` - `UpgradableProxy` |
//! | Any other proxy call | Anyone except the proxy admin | `domain/instance.rs` - `UpgradableProxy` |
//!
//! ### Execution Limits
//!
//! | Limit | Value | Purpose |
//! |-------|-------|---------|
//! | `max_call_depth` | 1024 | Bound delegation chains (frames run iteratively) |
//! | `event_channel_capacity` | 1024 | Per-subscriber buffer |
//!
//! ## Usage Example
//!
//! ```ignore
//! use instance_factory::prelude::*;
//!
//! let system = bootstrap(deployer, vec![admin], ServiceConfig::default()).await?;
//! let salt = Salt::new([1u8; 32]);
//!
//! let predicted = system.factory.predict_clone_address(salt);
//! let clone = system
//!     .factory
//!     .deploy_deterministic_clone(admin, salt, &init_payload(&[admin]))
//!     .await?;
//! assert_eq!(clone, predicted);
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod deployment;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod events;
pub mod executor;
pub mod implementations;
pub mod ports;
pub mod service;
pub mod telemetry;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        CallContext, Deployment, FactoryState, InstanceKind, StateChange,
    };
    pub use crate::domain::governance::{AdminSet, InstanceAdmin};

    // Value objects
    pub use crate::domain::value_objects::{
        Address, Bytes, Hash, Salt, StorageKey, StorageValue, U256,
    };

    // ABI
    pub use crate::domain::abi::{Call, ParamType, Selector, Token};

    // Domain services
    pub use crate::domain::services::{
        clone_template_hash, compute_contract_address, compute_contract_address_create2,
        derive_address, keccak256, predict_clone_address, predict_proxy_address,
        proxy_template_hash, slots,
    };

    // Invariants
    pub use crate::domain::invariants::{limits, InvariantCheckResult, InvariantViolation};

    // Ports
    pub use crate::ports::inbound::{FactoryApi, InstanceApi};
    pub use crate::ports::outbound::{EventLog, LedgerState, StorageArena};

    // Events
    pub use crate::events::{topics, EventKind, FactoryEvent, LogEntry};

    // Errors
    pub use crate::errors::{
        AbiError, ConfigError, DeploymentError, ExecutionError, FactoryError, StateError,
    };

    // Implementations
    pub use crate::implementations::example::init_payload;
    pub use crate::implementations::{DummyImplementation, ExampleContract, Implementation};

    // Adapters
    pub use crate::adapters::{InMemoryEventLog, InMemoryLedger, SharedLedger};

    // Engines
    pub use crate::engine::{parse_salt, CloneEngine, ProxyEngine};
    pub use crate::executor::Executor;

    // Service
    pub use crate::config::{FactoryConfig, ServiceConfig};
    pub use crate::deployment::{bootstrap, deploy_factory, publish_implementation, DeployedSystem};
    pub use crate::service::{FactoryService, LedgerGateway, ServiceStats};
    pub use crate::telemetry::{init_tracing, TelemetryConfig};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
