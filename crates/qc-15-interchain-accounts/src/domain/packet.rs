//! # Packet Codec
//!
//! Wire types carried over an interchain accounts channel:
//!
//! - [`InterchainTx`]: the ordered batch of sub-operations, serialized with the
//!   channel's negotiated [`Encoding`].
//! - [`PacketData`]: the JSON envelope wrapping a serialized batch.
//! - [`Acknowledgement`]: the JSON result written back by the host.
//!
//! Every struct declares its fields in sorted key order so equal values always
//! produce identical bytes.

use super::errors::IcaError;
use super::value_objects::{Encoding, MAX_MEMO_CHAR_LENGTH};
use serde::{Deserialize, Serialize};

/// Hex in human-readable formats, raw bytes otherwise.
pub(crate) mod hex_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            hex::encode(bytes).serialize(serializer)
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let encoded = String::deserialize(deserializer)?;
            hex::decode(encoded).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

// =============================================================================
// TRANSACTION BATCH
// =============================================================================

/// A type-tagged sub-operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnyMsg {
    /// Message type URL used for routing and allow-listing.
    pub type_url: String,
    /// Message body, interpreted by the handler registered for `type_url`.
    #[serde(with = "hex_serde")]
    pub value: Vec<u8>,
}

impl AnyMsg {
    /// Create a message.
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }
}

/// Ordered batch of sub-operations executed atomically by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterchainTx {
    /// Sub-operations, executed in order.
    pub messages: Vec<AnyMsg>,
}

/// Serialize a batch with the given encoding.
pub fn serialize_tx(messages: &[AnyMsg], encoding: Encoding) -> Result<Vec<u8>, IcaError> {
    let tx = InterchainTx {
        messages: messages.to_vec(),
    };
    match encoding {
        Encoding::Bincode => bincode::serialize(&tx)
            .map_err(|e| IcaError::InvalidType(format!("cannot encode transaction: {}", e))),
        Encoding::Json => serde_json::to_vec(&tx)
            .map_err(|e| IcaError::InvalidType(format!("cannot encode transaction: {}", e))),
    }
}

/// Deserialize a batch with the given encoding.
pub fn deserialize_tx(data: &[u8], encoding: Encoding) -> Result<Vec<AnyMsg>, IcaError> {
    let tx: InterchainTx = match encoding {
        Encoding::Bincode => bincode::deserialize(data)
            .map_err(|e| IcaError::InvalidType(format!("cannot decode transaction: {}", e)))?,
        Encoding::Json => serde_json::from_slice(data)
            .map_err(|e| IcaError::InvalidType(format!("cannot decode transaction: {}", e)))?,
    };
    Ok(tx.messages)
}

// =============================================================================
// PACKET ENVELOPE
// =============================================================================

/// Operation carried by a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketType {
    /// Default value. Always rejected.
    #[serde(rename = "TYPE_UNSPECIFIED")]
    Unspecified,
    /// Execute the enclosed transaction batch.
    #[serde(rename = "TYPE_EXECUTE_TX")]
    ExecuteTx,
}

/// Packet envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacketData {
    /// Serialized [`InterchainTx`].
    #[serde(with = "hex_serde")]
    pub data: Vec<u8>,
    /// Free-form memo.
    #[serde(default)]
    pub memo: String,
    /// Operation type.
    #[serde(rename = "type")]
    pub packet_type: PacketType,
}

impl PacketData {
    /// Build an execute-tx envelope.
    pub fn execute_tx(data: Vec<u8>, memo: impl Into<String>) -> Self {
        Self {
            data,
            memo: memo.into(),
            packet_type: PacketType::ExecuteTx,
        }
    }

    /// Stateless validation.
    pub fn validate_basic(&self) -> Result<(), IcaError> {
        if self.packet_type == PacketType::Unspecified {
            return Err(IcaError::InvalidPacketData(
                "packet data type cannot be unspecified".to_string(),
            ));
        }
        if self.data.is_empty() {
            return Err(IcaError::InvalidPacketData(
                "packet data cannot be empty".to_string(),
            ));
        }
        let memo_len = self.memo.chars().count();
        if memo_len > MAX_MEMO_CHAR_LENGTH {
            return Err(IcaError::InvalidPacketData(format!(
                "memo must not exceed {} characters, got {}",
                MAX_MEMO_CHAR_LENGTH, memo_len
            )));
        }
        Ok(())
    }

    /// Canonical JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IcaError> {
        serde_json::to_vec(self)
            .map_err(|e| IcaError::InvalidType(format!("cannot marshal packet data: {}", e)))
    }

    /// Parse canonical JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IcaError> {
        serde_json::from_slice(bytes).map_err(|_| {
            IcaError::InvalidType("cannot unmarshal interchain account packet data".to_string())
        })
    }
}

// =============================================================================
// ACKNOWLEDGEMENT
// =============================================================================

/// Response produced by one sub-operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgResponse {
    /// Response type URL.
    pub type_url: String,
    /// Response body.
    #[serde(with = "hex_serde")]
    pub value: Vec<u8>,
}

/// Result payload of a successful batch: one response per sub-operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMsgData {
    /// Responses, in message order.
    pub msg_responses: Vec<MsgResponse>,
}

impl TxMsgData {
    /// Binary encoding placed in a success acknowledgement.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IcaError> {
        bincode::serialize(self)
            .map_err(|e| IcaError::InvalidType(format!("cannot marshal tx data: {}", e)))
    }

    /// Decode a success acknowledgement's result.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IcaError> {
        bincode::deserialize(bytes)
            .map_err(|e| IcaError::InvalidType(format!("cannot unmarshal tx data: {}", e)))
    }
}

/// Packet acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgement {
    /// Execution succeeded.
    Result(#[serde(with = "hex_serde")] Vec<u8>),
    /// Execution failed. Carries only a deterministic message.
    Error(String),
}

impl Acknowledgement {
    /// Success acknowledgement.
    pub fn success(result: Vec<u8>) -> Self {
        Self::Result(result)
    }

    /// Error acknowledgement. Only the error code is exposed so the bytes are
    /// identical on every node.
    pub fn error(err: &IcaError) -> Self {
        Self::Error(format!(
            "ABCI code: {}: error handling packet: see events for details",
            err.code()
        ))
    }

    /// Whether the acknowledgement reports success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Canonical JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IcaError> {
        serde_json::to_vec(self)
            .map_err(|e| IcaError::InvalidType(format!("cannot marshal acknowledgement: {}", e)))
    }

    /// Parse canonical JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IcaError> {
        serde_json::from_slice(bytes)
            .map_err(|e| IcaError::InvalidType(format!("cannot unmarshal acknowledgement: {}", e)))
    }
}
