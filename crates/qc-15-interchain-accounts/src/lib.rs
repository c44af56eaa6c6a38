//! # QC-15 Interchain Accounts
//!
//! Lets a controller chain own and drive accounts on a host chain over an
//! ordered channel.
//!
//! **Subsystem ID:** 15
//! **Protocol Version:** `ics27-1`
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - The controller registers an account per `(owner, connection)` and sends
//!   transaction batches to it.
//! - The host creates the account on the first channel handshake, authenticates
//!   every sub-operation against it and executes the batch atomically.
//! - One active channel per `(connection, port)`. A channel closed by a timeout
//!   is re-opened with identical metadata and the same account.
//!
//! ## Safety Rules
//!
//! | Rule | Enforced by |
//! |------|-------------|
//! | Ordered channels only | `invariant_ordered` |
//! | Controller port derived from owner | `new_controller_port_id` |
//! | Host port is `icahost` | `invariant_host_port` |
//! | One non-closed active channel per key | `ActiveChannelRegistry` |
//! | Signers must be the interchain account | `invariant_signers_authorized` |
//! | Batch is all-or-nothing | `CacheStore` |
//! | Account identity survives upgrades | `invariant_metadata_identity_unchanged` |
//!
//! ## Module Structure
//!
//! ```text
//! qc-15-interchain-accounts/
//! ├── domain/      # Identifiers, metadata, packets, accounts, invariants, errors
//! ├── ports/       # IbcModule (inbound), KvStore/ChannelKeeper/... (outbound)
//! ├── registry     # Active channel and account bookkeeping
//! ├── controller/  # Registration, controller handshake, send path, middleware
//! ├── host/        # Host handshake, authentication, batch execution
//! ├── adapters/    # In-memory store, transport, capabilities, bank
//! ├── config       # Module parameters and environment configuration
//! └── telemetry    # Tracing subscriber setup
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod controller;
pub mod domain;
pub mod host;
pub mod ports;
pub mod registry;
pub mod telemetry;

// Re-exports
pub use config::{ControllerParams, HostParams, IcaConfig, DEFAULT_ADDRESS_PREFIX};
pub use controller::{
    ControllerKeeper, IcaControllerMiddleware, MsgRegisterInterchainAccount,
    MsgRegisterInterchainAccountResponse, MsgSendTx, MsgSendTxResponse, CONTROLLER_SUBMODULE,
};
pub use domain::{
    generate_address, new_controller_port_id, Acknowledgement, AnyMsg, ChannelEnd, ChannelState,
    Encoding, IcaError, InterchainAccount, Metadata, Order, Packet, PacketData, TxMsgData, TxType,
    CONTROLLER_PORT_PREFIX, HOST_PORT_ID,
};
pub use host::{HostKeeper, IcaHostModule, HOST_SUBMODULE};
pub use ports::{
    AccountKeeper, CapabilityKeeper, ChannelKeeper, IbcModule, KvStore, MessageRouter, MsgHandler,
    TimeSource, UpgradableModule,
};
pub use registry::{ActiveChannelRegistry, RegistrySide};
pub use telemetry::{init_tracing, TelemetryConfig};

/// Crate version
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
