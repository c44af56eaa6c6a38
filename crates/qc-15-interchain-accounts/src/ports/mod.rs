//! # Ports
//!
//! Hexagonal boundaries of the subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
