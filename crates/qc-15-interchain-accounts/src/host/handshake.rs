//! # Host Handshake
//!
//! Open-try, open-confirm, close-confirm and upgrade-try of the host chain.
//! Open-try creates the interchain account the first time a controller port
//! opens a channel over a connection and reuses it on every re-open.

use super::keeper::HostKeeper;
use crate::domain::{
    channel_capability_path, invariant_connection_hops_unchanged, invariant_host_port,
    invariant_metadata_identity_unchanged, invariant_ordered, validate_host_metadata,
    ConnectionId, IcaError, Metadata,
};
use crate::ports::{ChannelOpenRequest, ChannelUpgradeRequest};
use tracing::info;

impl HostKeeper {
    /// Validate an open-try and return the version to write on the host
    /// channel end: the controller's metadata with the account address set.
    pub fn on_chan_open_try(&self, request: &ChannelOpenRequest) -> Result<String, IcaError> {
        invariant_host_port(&request.port_id)?;
        invariant_ordered(request.order)?;

        let mut metadata = Metadata::decode(&request.version)?;
        let counterparty_connection_id = self.counterparty_connection_id(&request.connection_hops)?;
        validate_host_metadata(&metadata, &request.connection_hops, &counterparty_connection_id)?;

        let connection_id = &request.connection_hops[0];
        let controller_port = &request.counterparty.port_id;
        if let Some((active_channel_id, channel)) = self
            .registry
            .get_active_channel_end(connection_id, controller_port)?
        {
            if !channel.is_closed() {
                return Err(IcaError::ActiveChannelAlreadySet {
                    channel_id: active_channel_id,
                    port_id: request.port_id.clone(),
                });
            }
        }

        self.capabilities.claim_capability(
            &request.channel_capability,
            &channel_capability_path(&request.port_id, &request.channel_id),
        )?;

        let address = match self
            .registry
            .get_interchain_account_address(&metadata.host_connection_id, controller_port)?
        {
            Some(address) => {
                let reopenable = self
                    .accounts
                    .get_account(&address)
                    .is_some_and(|account| account.is_interchain());
                if !reopenable {
                    return Err(IcaError::InvalidAccountReopening(format!(
                        "existing account address {} does not have interchain account type",
                        address
                    )));
                }
                info!(address = %address, port_id = %controller_port, "Reopening existing interchain account");
                address
            }
            None => self.create_interchain_account(&metadata.host_connection_id, controller_port)?,
        };

        metadata.address = address;
        metadata.encode()
    }

    /// Point the registry at the confirmed channel.
    pub fn on_chan_open_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        let channel = self.require_channel(port_id, channel_id)?;
        let connection_id = channel.connection_id().ok_or_else(|| {
            IcaError::InvalidRequest(format!("channel {} has no connection hops", channel_id))
        })?;

        self.registry
            .set_active_channel_id(connection_id, &channel.counterparty.port_id, channel_id)?;

        info!(
            port_id,
            channel_id,
            connection_id,
            controller_port = %channel.counterparty.port_id,
            "Host channel open"
        );
        Ok(())
    }

    /// Close-confirm leaves the registry pointing at the closed channel.
    pub fn on_chan_close_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        info!(port_id, channel_id, "Host channel closed");
        Ok(())
    }

    /// Validate an upgrade proposed by the controller and return the version to agree to.
    pub fn on_chan_upgrade_try(&self, request: &ChannelUpgradeRequest) -> Result<String, IcaError> {
        invariant_host_port(&request.port_id)?;
        invariant_ordered(request.proposed_order)?;

        let channel = self.require_channel(&request.port_id, &request.channel_id)?;
        let connection_id = channel.connection_id().ok_or_else(|| {
            IcaError::InvalidRequest(format!("channel {} has no connection hops", request.channel_id))
        })?;
        invariant_connection_hops_unchanged(&request.proposed_connection_hops, connection_id)?;

        if request.version.trim().is_empty() {
            return Err(IcaError::InvalidVersion(
                "counterparty version cannot be empty".to_string(),
            ));
        }
        let proposed = Metadata::decode(&request.version)?;
        let current = Metadata::decode(&channel.version)?;

        let counterparty_connection_id =
            self.counterparty_connection_id(&request.proposed_connection_hops)?;
        validate_host_metadata(
            &proposed,
            &request.proposed_connection_hops,
            &counterparty_connection_id,
        )?;

        invariant_metadata_identity_unchanged(&current, &proposed)?;

        info!(
            port_id = %request.port_id,
            channel_id = %request.channel_id,
            "Host upgrade-try accepted"
        );
        Ok(request.version.clone())
    }

    fn counterparty_connection_id(&self, connection_hops: &[ConnectionId]) -> Result<String, IcaError> {
        let [connection_id] = connection_hops else {
            return Err(IcaError::InvalidRequest(format!(
                "expected exactly one connection hop, got {}",
                connection_hops.len()
            )));
        };
        Ok(self
            .channels
            .get_connection(connection_id)?
            .counterparty_connection_id)
    }
}
