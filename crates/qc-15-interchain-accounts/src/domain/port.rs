//! # Port Identifier Deriver
//!
//! Controller ports are derived from the owner identifier. The host side
//! always uses [`HOST_PORT_ID`](super::value_objects::HOST_PORT_ID).

use super::errors::IcaError;
use super::value_objects::{PortId, CONTROLLER_PORT_PREFIX, MAX_OWNER_LENGTH};

/// Derive the controller port identifier for an owner.
pub fn new_controller_port_id(owner: &str) -> Result<PortId, IcaError> {
    if owner.trim().is_empty() {
        return Err(IcaError::InvalidOwner("owner address cannot be blank".to_string()));
    }
    if owner.len() > MAX_OWNER_LENGTH {
        return Err(IcaError::InvalidOwner(format!(
            "owner address must not exceed {} bytes",
            MAX_OWNER_LENGTH
        )));
    }

    Ok(format!("{}{}", CONTROLLER_PORT_PREFIX, owner))
}

/// Whether the port carries the controller prefix.
pub fn is_controller_port(port_id: &str) -> bool {
    port_id.starts_with(CONTROLLER_PORT_PREFIX)
}
