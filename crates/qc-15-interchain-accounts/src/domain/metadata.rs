//! # Metadata Codec
//!
//! The channel version string of an interchain accounts channel is the JSON
//! encoding of [`Metadata`]. Fields are declared in sorted key order so two
//! equal records always encode to identical bytes.
//!
//! Validation is pure: callers resolve the channel's connection hops and the
//! counterparty connection from the transport and pass them in.

use super::errors::IcaError;
use super::value_objects::{ConnectionId, Encoding, TxType, DEFAULT_MAX_ADDR_LENGTH, VERSION};
use serde::{Deserialize, Serialize};

/// Negotiated channel parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Metadata {
    /// Interchain account address on the host. Empty until open-try.
    pub address: String,
    /// Connection identifier on the controller chain.
    pub controller_connection_id: ConnectionId,
    /// Encoding of transaction batches.
    pub encoding: String,
    /// Connection identifier on the host chain.
    pub host_connection_id: ConnectionId,
    /// Transaction batch type.
    pub tx_type: String,
    /// Protocol version tag.
    pub version: String,
}

impl Metadata {
    /// Create metadata from explicit values.
    pub fn new(
        version: impl Into<String>,
        controller_connection_id: impl Into<String>,
        host_connection_id: impl Into<String>,
        address: impl Into<String>,
        encoding: Encoding,
        tx_type: TxType,
    ) -> Self {
        Self {
            address: address.into(),
            controller_connection_id: controller_connection_id.into(),
            encoding: encoding.as_str().to_string(),
            host_connection_id: host_connection_id.into(),
            tx_type: tx_type.as_str().to_string(),
            version: version.into(),
        }
    }

    /// Default metadata for a fresh registration. The address is left empty.
    pub fn new_default(
        controller_connection_id: impl Into<String>,
        host_connection_id: impl Into<String>,
    ) -> Self {
        Self::new(
            VERSION,
            controller_connection_id,
            host_connection_id,
            "",
            Encoding::Bincode,
            TxType::MultiMsg,
        )
    }

    /// Encode as a channel version string.
    pub fn encode(&self) -> Result<String, IcaError> {
        serde_json::to_string(self)
            .map_err(|e| IcaError::InvalidType(format!("cannot marshal metadata: {}", e)))
    }

    /// Decode a channel version string.
    pub fn decode(version: &str) -> Result<Self, IcaError> {
        serde_json::from_str(version).map_err(|_| {
            IcaError::InvalidType("cannot unmarshal interchain accounts metadata".to_string())
        })
    }

    /// Parsed encoding.
    pub fn encoding(&self) -> Result<Encoding, IcaError> {
        Encoding::parse(&self.encoding)
    }

    /// Parsed transaction type.
    pub fn tx_type(&self) -> Result<TxType, IcaError> {
        TxType::parse(&self.tx_type)
    }
}

/// Encode default metadata for the given connection pair.
pub fn new_default_metadata_string(
    controller_connection_id: &str,
    host_connection_id: &str,
) -> Result<String, IcaError> {
    Metadata::new_default(controller_connection_id, host_connection_id).encode()
}

/// Compare metadata against a previously negotiated version string.
///
/// Every field except the address must match. An undecodable previous
/// version never matches.
pub fn is_previous_metadata_equal(previous_version: &str, metadata: &Metadata) -> bool {
    let Ok(previous) = Metadata::decode(previous_version) else {
        return false;
    };

    previous.version == metadata.version
        && previous.controller_connection_id == metadata.controller_connection_id
        && previous.host_connection_id == metadata.host_connection_id
        && previous.encoding == metadata.encoding
        && previous.tx_type == metadata.tx_type
}

/// Validate an interchain account address.
pub fn validate_account_address(address: &str) -> Result<(), IcaError> {
    if address.trim().is_empty() {
        return Err(IcaError::InvalidAccountAddress(
            "address cannot be blank".to_string(),
        ));
    }
    if address.len() > DEFAULT_MAX_ADDR_LENGTH {
        return Err(IcaError::InvalidAccountAddress(format!(
            "address must not exceed {} bytes, got {}",
            DEFAULT_MAX_ADDR_LENGTH,
            address.len()
        )));
    }
    Ok(())
}

/// Validate metadata on the controller chain.
///
/// `connection_hops` are the channel's hops on the controller chain and
/// `counterparty_connection_id` is the host-side id of `connection_hops[0]`.
pub fn validate_controller_metadata(
    metadata: &Metadata,
    connection_hops: &[ConnectionId],
    counterparty_connection_id: &str,
) -> Result<(), IcaError> {
    let connection_id = first_hop(connection_hops)?;
    validate_common(metadata, connection_id, counterparty_connection_id)
}

/// Validate metadata on the host chain.
///
/// `connection_hops` are the channel's hops on the host chain and
/// `counterparty_connection_id` is the controller-side id of `connection_hops[0]`.
pub fn validate_host_metadata(
    metadata: &Metadata,
    connection_hops: &[ConnectionId],
    counterparty_connection_id: &str,
) -> Result<(), IcaError> {
    let connection_id = first_hop(connection_hops)?;
    validate_common(metadata, counterparty_connection_id, connection_id)
}

fn first_hop(connection_hops: &[ConnectionId]) -> Result<&str, IcaError> {
    match connection_hops {
        [single] => Ok(single.as_str()),
        other => Err(IcaError::InvalidRequest(format!(
            "expected exactly one connection hop, got {}",
            other.len()
        ))),
    }
}

fn validate_common(
    metadata: &Metadata,
    controller_connection_id: &str,
    host_connection_id: &str,
) -> Result<(), IcaError> {
    metadata.encoding()?;
    metadata.tx_type()?;

    if metadata.controller_connection_id != controller_connection_id {
        return Err(IcaError::InvalidConnection {
            expected: controller_connection_id.to_string(),
            got: metadata.controller_connection_id.clone(),
        });
    }
    if metadata.host_connection_id != host_connection_id {
        return Err(IcaError::InvalidConnection {
            expected: host_connection_id.to_string(),
            got: metadata.host_connection_id.clone(),
        });
    }

    if !metadata.address.is_empty() {
        validate_account_address(&metadata.address)?;
    }

    if metadata.version != VERSION {
        return Err(IcaError::InvalidVersion(format!(
            "expected {}, got {}",
            VERSION, metadata.version
        )));
    }

    Ok(())
}
