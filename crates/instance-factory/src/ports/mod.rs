//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions for the factory and the instances it creates.
//!
//! ## Architecture Compliance
//!
//! - **Driving Ports (Inbound)**: `FactoryApi`, `InstanceApi`
//! - **Driven Ports (Outbound)**: `LedgerState`, `StorageArena`, `EventLog`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
