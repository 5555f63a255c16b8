//! # Adapters Layer (Outer Hexagon)
//!
//! Concrete implementations of the outbound ports.
//!
//! ## Architecture Compliance
//!
//! - Adapters implement domain ports
//! - The in-memory ledger stands in for the underlying chain

pub mod event_log;
pub mod ledger;

pub use event_log::*;
pub use ledger::*;
