//! # Domain Module
//!
//! Core domain types for Interchain Accounts: identifiers, the metadata and
//! packet codecs, port derivation, address derivation, invariants and the
//! batch execution overlay.

pub mod account;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod metadata;
pub mod overlay;
pub mod packet;
pub mod port;
pub mod value_objects;

pub use account::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use metadata::*;
pub use overlay::CacheStore;
pub use packet::{
    deserialize_tx, serialize_tx, Acknowledgement, AnyMsg, InterchainTx, MsgResponse, PacketData,
    PacketType, TxMsgData,
};
pub use port::*;
pub use value_objects::*;
