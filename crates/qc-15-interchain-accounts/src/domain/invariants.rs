//! # Domain Invariants
//!
//! Business rules shared by the controller and host handshakes and the host
//! authentication path.

use super::errors::IcaError;
use super::metadata::Metadata;
use super::port::is_controller_port;
use super::value_objects::{ConnectionId, Order, CONTROLLER_PORT_PREFIX, HOST_PORT_ID};

/// Invariant: interchain accounts channels are ordered.
pub fn invariant_ordered(order: Order) -> Result<(), IcaError> {
    if order != Order::Ordered {
        return Err(IcaError::InvalidChannelOrdering {
            expected: Order::Ordered.to_string(),
            got: order.to_string(),
        });
    }
    Ok(())
}

/// Invariant: controller operations run on a prefixed port that is not the host port.
pub fn invariant_controller_port(port_id: &str) -> Result<(), IcaError> {
    if port_id == HOST_PORT_ID {
        return Err(IcaError::InvalidControllerPort(format!(
            "port cannot be the host port {}",
            HOST_PORT_ID
        )));
    }
    if !is_controller_port(port_id) {
        return Err(IcaError::InvalidControllerPort(format!(
            "expected {}{{owner}}, got {}",
            CONTROLLER_PORT_PREFIX, port_id
        )));
    }
    Ok(())
}

/// Invariant: host operations run on the well-known host port.
pub fn invariant_host_port(port_id: &str) -> Result<(), IcaError> {
    if port_id != HOST_PORT_ID {
        return Err(IcaError::InvalidHostPort {
            expected: HOST_PORT_ID.to_string(),
            got: port_id.to_string(),
        });
    }
    Ok(())
}

/// Invariant: an upgrade keeps the single current connection hop.
pub fn invariant_connection_hops_unchanged(
    proposed_hops: &[ConnectionId],
    current_connection_id: &str,
) -> Result<(), IcaError> {
    match proposed_hops {
        [hop] if hop == current_connection_id => Ok(()),
        _ => Err(IcaError::InvalidUpgrade(format!(
            "expected connection hops [{}], got {:?}",
            current_connection_id, proposed_hops
        ))),
    }
}

/// Invariant: the account address and both connection ids survive an upgrade.
pub fn invariant_metadata_identity_unchanged(
    current: &Metadata,
    proposed: &Metadata,
) -> Result<(), IcaError> {
    if current.address != proposed.address {
        return Err(IcaError::InvalidAccountAddress(
            "interchain account address cannot be changed".to_string(),
        ));
    }
    if current.controller_connection_id != proposed.controller_connection_id {
        return Err(IcaError::InvalidConnection {
            expected: current.controller_connection_id.clone(),
            got: proposed.controller_connection_id.clone(),
        });
    }
    if current.host_connection_id != proposed.host_connection_id {
        return Err(IcaError::InvalidConnection {
            expected: current.host_connection_id.clone(),
            got: proposed.host_connection_id.clone(),
        });
    }
    Ok(())
}

/// Invariant: a sub-operation declares signers and every signer is the
/// registered interchain account.
pub fn invariant_signers_authorized(
    type_url: &str,
    signers: &[String],
    account_address: &str,
) -> Result<(), IcaError> {
    if signers.is_empty() {
        return Err(IcaError::Unauthorized(format!(
            "message {} declares no signers",
            type_url
        )));
    }
    if let Some(signer) = signers.iter().find(|s| s.as_str() != account_address) {
        return Err(IcaError::Unauthorized(format!(
            "unexpected signer address: expected {}, got {}",
            account_address, signer
        )));
    }
    Ok(())
}
