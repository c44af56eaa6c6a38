//! # Host Submodule
//!
//! Accepts channels opened by controllers, creates interchain accounts and
//! executes the transaction batches they send.

mod handshake;
mod keeper;
mod module;
mod relay;

pub use keeper::{HostKeeper, HOST_SUBMODULE};
pub use module::IcaHostModule;
