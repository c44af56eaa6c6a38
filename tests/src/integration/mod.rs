//! # Integration Tests
//!
//! Two in-memory chains, a controller and a host, driven against each other
//! by a relayer that performs every handshake and packet step.

pub mod harness;
mod ica_flows;
