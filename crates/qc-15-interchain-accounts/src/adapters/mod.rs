//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports: key-value state,
//! capability store, account store, message routing, block clock, and a
//! channel transport that drives the inbound callbacks.

mod accounts;
mod bank;
mod capability;
mod memory_store;
mod time;
mod transport;

pub use accounts::InMemoryAccountKeeper;
pub use bank::{
    balance, set_balance, BankMsgHandler, InMemoryMsgRouter, MsgSend, MSG_SEND_RESPONSE_TYPE_URL,
    MSG_SEND_TYPE_URL,
};
pub use capability::{CapabilityRegistry, ScopedCapabilityKeeper};
pub use memory_store::MemoryStore;
pub use time::{ManualTimeSource, SystemTimeSource};
pub use transport::{InMemoryTransport, OpenTryParams, TRANSPORT_MODULE};
