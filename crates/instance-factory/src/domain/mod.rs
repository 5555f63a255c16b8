//! # Domain Layer (Inner Hexagon)
//!
//! Pure business logic for deterministic instance creation.
//! NO I/O, NO async.
//!
//! ## Architecture Compliance
//!
//! - This is the **inner layer** of the hexagonal architecture.
//! - All types here are pure domain concepts.
//! - Dependencies point INWARD only (adapters depend on this, not vice versa).

pub mod abi;
pub mod entities;
pub mod governance;
pub mod instance;
pub mod invariants;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use governance::*;
pub use instance::{
    resolve_instance, DelegatingInstance, Dispatch, ImplementationInstance, Instance,
    UpgradableProxy,
};
pub use invariants::*;
pub use services::*;
pub use value_objects::*;
