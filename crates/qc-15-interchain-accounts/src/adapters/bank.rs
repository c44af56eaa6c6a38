//! In-memory message router and a token transfer handler.
//!
//! Balances live in the same [`KvStore`] the handler executes against, under
//! `bank/balances/{address}` as 16-byte little-endian amounts, so a
//! [`CacheStore`](crate::domain::CacheStore) branch covers them.

use crate::domain::{AnyMsg, IcaError, MsgResponse};
use crate::ports::{KvStore, MessageRouter, MsgHandler};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Type URL of [`MsgSend`].
pub const MSG_SEND_TYPE_URL: &str = "/bank.MsgSend";

/// Type URL of the [`MsgSend`] response.
pub const MSG_SEND_RESPONSE_TYPE_URL: &str = "/bank.MsgSendResponse";

/// Token transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    /// Amount moved.
    pub amount: u128,
    /// Sender, the only signer.
    pub from_address: String,
    /// Recipient.
    pub to_address: String,
}

impl MsgSend {
    /// Create a transfer.
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u128) -> Self {
        Self {
            amount,
            from_address: from.into(),
            to_address: to.into(),
        }
    }

    /// Pack as a type-tagged sub-operation.
    pub fn to_any(&self) -> Result<AnyMsg, IcaError> {
        let value = serde_json::to_vec(self)
            .map_err(|e| IcaError::InvalidType(format!("cannot encode MsgSend: {}", e)))?;
        Ok(AnyMsg::new(MSG_SEND_TYPE_URL, value))
    }

    fn from_any(msg: &AnyMsg) -> Result<Self, IcaError> {
        serde_json::from_slice(&msg.value)
            .map_err(|e| IcaError::InvalidType(format!("cannot decode MsgSend: {}", e)))
    }
}

fn balance_key(address: &str) -> Vec<u8> {
    format!("bank/balances/{}", address).into_bytes()
}

/// Read a balance.
pub fn balance(store: &dyn KvStore, address: &str) -> Result<u128, IcaError> {
    match store.get(&balance_key(address))? {
        None => Ok(0),
        Some(bytes) => {
            let raw: [u8; 16] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| IcaError::Store(format!("corrupt balance for {}", address)))?;
            Ok(u128::from_le_bytes(raw))
        }
    }
}

/// Overwrite a balance.
pub fn set_balance(store: &dyn KvStore, address: &str, amount: u128) -> Result<(), IcaError> {
    store.set(&balance_key(address), &amount.to_le_bytes())
}

/// Executes [`MsgSend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BankMsgHandler;

impl MsgHandler for BankMsgHandler {
    fn signers(&self, msg: &AnyMsg) -> Result<Vec<String>, IcaError> {
        Ok(vec![MsgSend::from_any(msg)?.from_address])
    }

    fn validate_basic(&self, msg: &AnyMsg) -> Result<(), IcaError> {
        let send = MsgSend::from_any(msg)?;
        if send.from_address.trim().is_empty() || send.to_address.trim().is_empty() {
            return Err(IcaError::InvalidRequest("addresses cannot be blank".to_string()));
        }
        if send.amount == 0 {
            return Err(IcaError::InvalidRequest("amount must be positive".to_string()));
        }
        Ok(())
    }

    fn execute(&self, store: &dyn KvStore, msg: &AnyMsg) -> Result<MsgResponse, IcaError> {
        let send = MsgSend::from_any(msg)?;

        let from_balance = balance(store, &send.from_address)?;
        let remaining = from_balance.checked_sub(send.amount).ok_or_else(|| {
            IcaError::MessageExecution(format!(
                "insufficient funds: {} has {}, needs {}",
                send.from_address, from_balance, send.amount
            ))
        })?;
        set_balance(store, &send.from_address, remaining)?;

        let to_balance = balance(store, &send.to_address)?;
        let credited = to_balance
            .checked_add(send.amount)
            .ok_or_else(|| IcaError::MessageExecution("balance overflow".to_string()))?;
        set_balance(store, &send.to_address, credited)?;

        Ok(MsgResponse {
            type_url: MSG_SEND_RESPONSE_TYPE_URL.to_string(),
            value: Vec::new(),
        })
    }
}

/// Router backed by a map of type URL to handler.
#[derive(Default)]
pub struct InMemoryMsgRouter {
    handlers: RwLock<HashMap<String, Arc<dyn MsgHandler>>>,
}

impl InMemoryMsgRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with [`BankMsgHandler`] registered.
    pub fn with_bank() -> Self {
        let router = Self::new();
        router.register(MSG_SEND_TYPE_URL, Arc::new(BankMsgHandler));
        router
    }

    /// Register a handler, replacing any previous one for the type URL.
    pub fn register(&self, type_url: impl Into<String>, handler: Arc<dyn MsgHandler>) {
        self.handlers.write().insert(type_url.into(), handler);
    }
}

impl MessageRouter for InMemoryMsgRouter {
    fn handler(&self, type_url: &str) -> Option<Arc<dyn MsgHandler>> {
        self.handlers.read().get(type_url).cloned()
    }
}
