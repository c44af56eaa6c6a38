//! # Controller Submodule
//!
//! Registers interchain accounts, negotiates their channels and sends
//! transaction batches to the host.

mod handshake;
mod keeper;
mod middleware;
mod msg_server;
mod relay;

pub use keeper::{ControllerKeeper, CONTROLLER_SUBMODULE};
pub use middleware::IcaControllerMiddleware;
pub use msg_server::{
    MsgRegisterInterchainAccount, MsgRegisterInterchainAccountResponse, MsgSendTx,
    MsgSendTxResponse,
};
