//! # Controller Handshake
//!
//! Open-init, open-ack, close-confirm and the upgrade callbacks of the
//! controller chain.
//!
//! Open-init re-validates any previous active channel for the key: it must be
//! CLOSED, opened with the same ordering, and negotiated with the same
//! metadata. Open-ack commits the active channel pointer and the account
//! address the host reported.

use super::keeper::ControllerKeeper;
use crate::domain::{
    channel_capability_path, invariant_connection_hops_unchanged, invariant_controller_port,
    invariant_host_port, invariant_metadata_identity_unchanged, invariant_ordered,
    is_previous_metadata_equal, validate_controller_metadata, ConnectionId, IcaError, Metadata,
};
use crate::ports::{ChannelOpenRequest, ChannelUpgradeRequest};
use tracing::{debug, info};

impl ControllerKeeper {
    /// Validate an open-init and return the version to write on the channel end.
    ///
    /// A blank version is replaced by default metadata for the channel's
    /// connection. A pointer to a channel the transport does not know is an
    /// [`IcaError::InvariantViolation`].
    ///
    /// The request itself must be ORDERED, so the ordering comparison against
    /// the previous channel only rejects a previous end that was not ordered.
    pub fn on_chan_open_init(&self, request: &ChannelOpenRequest) -> Result<String, IcaError> {
        invariant_controller_port(&request.port_id)?;
        invariant_host_port(&request.counterparty.port_id)?;
        invariant_ordered(request.order)?;

        let counterparty_connection_id = self.counterparty_connection_id(&request.connection_hops)?;
        let metadata = if request.version.trim().is_empty() {
            Metadata::new_default(
                request.connection_hops[0].clone(),
                counterparty_connection_id.clone(),
            )
        } else {
            Metadata::decode(&request.version)?
        };

        validate_controller_metadata(
            &metadata,
            &request.connection_hops,
            &counterparty_connection_id,
        )?;

        let connection_id = &request.connection_hops[0];
        if let Some((active_channel_id, channel)) = self
            .registry
            .get_active_channel_end(connection_id, &request.port_id)?
        {
            if !channel.is_closed() {
                return Err(IcaError::ActiveChannelAlreadySet {
                    channel_id: active_channel_id,
                    port_id: request.port_id.clone(),
                });
            }
            if channel.ordering != request.order {
                return Err(IcaError::InvalidChannelOrdering {
                    expected: channel.ordering.to_string(),
                    got: request.order.to_string(),
                });
            }
            if !is_previous_metadata_equal(&channel.version, &metadata) {
                return Err(IcaError::InvalidVersion(
                    "previous active channel metadata does not match provided version".to_string(),
                ));
            }
            debug!(
                port_id = %request.port_id,
                previous_channel_id = %active_channel_id,
                "Reopening closed active channel"
            );
        }

        self.capabilities.claim_capability(
            &request.channel_capability,
            &channel_capability_path(&request.port_id, &request.channel_id),
        )?;

        let version = metadata.encode()?;
        info!(
            port_id = %request.port_id,
            channel_id = %request.channel_id,
            connection_id = %connection_id,
            "Controller open-init accepted"
        );
        Ok(version)
    }

    /// Commit the active channel and account address reported by the host.
    pub fn on_chan_open_ack(
        &self,
        port_id: &str,
        channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), IcaError> {
        invariant_controller_port(port_id)?;

        let metadata = Metadata::decode(counterparty_version)?;
        if let Some(active_channel_id) = self
            .registry
            .get_open_active_channel(&metadata.controller_connection_id, port_id)?
        {
            return Err(IcaError::ActiveChannelAlreadySet {
                channel_id: active_channel_id,
                port_id: port_id.to_string(),
            });
        }

        let channel = self.require_channel(port_id, channel_id)?;
        let counterparty_connection_id = self.counterparty_connection_id(&channel.connection_hops)?;
        validate_controller_metadata(&metadata, &channel.connection_hops, &counterparty_connection_id)?;

        if metadata.address.trim().is_empty() {
            return Err(IcaError::InvalidAccountAddress(
                "interchain account address cannot be empty".to_string(),
            ));
        }
        if let Some(previous) = self
            .registry
            .get_interchain_account_address(&metadata.controller_connection_id, port_id)?
        {
            if previous != metadata.address {
                return Err(IcaError::InvalidAccountAddress(format!(
                    "interchain account address {} does not match registered address {}",
                    metadata.address, previous
                )));
            }
        }

        self.registry
            .set_active_channel_id(&metadata.controller_connection_id, port_id, channel_id)?;
        self.registry.set_interchain_account_address(
            &metadata.controller_connection_id,
            port_id,
            &metadata.address,
        )?;

        info!(
            port_id,
            channel_id,
            connection_id = %metadata.controller_connection_id,
            address = %metadata.address,
            "Interchain account registered"
        );
        Ok(())
    }

    /// Close-confirm leaves the registry pointing at the closed channel so a
    /// later open-init can validate against it.
    pub fn on_chan_close_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        info!(port_id, channel_id, "Controller channel closed");
        Ok(())
    }

    // =========================================================================
    // UPGRADES
    // =========================================================================

    /// Validate an upgrade proposed by the controller and return the version to propose.
    pub fn on_chan_upgrade_init(&self, request: &ChannelUpgradeRequest) -> Result<String, IcaError> {
        invariant_controller_port(&request.port_id)?;
        invariant_ordered(request.proposed_order)?;

        let connection_id = self.get_connection_id(&request.port_id, &request.channel_id)?;
        invariant_connection_hops_unchanged(&request.proposed_connection_hops, &connection_id)?;

        if request.version.trim().is_empty() {
            return Err(IcaError::InvalidVersion("version cannot be empty".to_string()));
        }
        let proposed = Metadata::decode(&request.version)?;
        let current = self.app_metadata(&request.port_id, &request.channel_id)?;

        let counterparty_connection_id =
            self.counterparty_connection_id(&request.proposed_connection_hops)?;
        validate_controller_metadata(
            &proposed,
            &request.proposed_connection_hops,
            &counterparty_connection_id,
        )?;
        invariant_metadata_identity_unchanged(&current, &proposed)?;

        info!(
            port_id = %request.port_id,
            channel_id = %request.channel_id,
            "Controller upgrade-init accepted"
        );
        Ok(request.version.clone())
    }

    /// Validate the version the host agreed to in upgrade-try.
    pub fn on_chan_upgrade_ack(
        &self,
        port_id: &str,
        channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), IcaError> {
        invariant_controller_port(port_id)?;

        if counterparty_version.trim().is_empty() {
            return Err(IcaError::InvalidVersion("version cannot be empty".to_string()));
        }
        let proposed = Metadata::decode(counterparty_version)?;
        let current = self.app_metadata(port_id, channel_id)?;

        let channel = self.require_channel(port_id, channel_id)?;
        let counterparty_connection_id = self.counterparty_connection_id(&channel.connection_hops)?;
        validate_controller_metadata(&proposed, &channel.connection_hops, &counterparty_connection_id)?;
        invariant_metadata_identity_unchanged(&current, &proposed)?;

        info!(port_id, channel_id, "Controller upgrade-ack accepted");
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{CapabilityRegistry, InMemoryTransport, ManualTimeSource, MemoryStore};
    use crate::config::ControllerParams;
    use crate::domain::{
        Capability, ChannelEnd, ChannelState, Counterparty, Encoding, Order, TxType, HOST_PORT_ID,
        VERSION,
    };
    use crate::ports::CapabilityKeeper;
    use std::sync::Arc;

    const PORT: &str = "icacontroller-alice";
    const ADDRESS: &str = "qc1host";

    struct Fixture {
        keeper: ControllerKeeper,
        transport: Arc<InMemoryTransport>,
        ibc: crate::adapters::ScopedCapabilityKeeper,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(InMemoryTransport::new("controller"));
        transport.add_connection("connection-0", "client-0", "connection-5");
        let registry: Arc<CapabilityRegistry> = transport.capability_registry();
        let keeper = ControllerKeeper::new(
            Arc::new(MemoryStore::new()),
            transport.clone(),
            Arc::new(registry.scope("icacontroller")),
            Arc::new(ManualTimeSource::new(0)),
            ControllerParams::default(),
        );
        Fixture {
            keeper,
            transport,
            ibc: registry.scope("test-ibc"),
        }
    }

    fn open_request(fx: &Fixture, channel_id: &str, version: &str, order: Order) -> ChannelOpenRequest {
        let channel_capability: Capability = fx
            .ibc
            .new_capability(&channel_capability_path(PORT, channel_id))
            .unwrap();
        ChannelOpenRequest {
            order,
            connection_hops: vec!["connection-0".into()],
            port_id: PORT.into(),
            channel_id: channel_id.into(),
            channel_capability,
            counterparty: Counterparty::new(HOST_PORT_ID, None),
            version: version.into(),
        }
    }

    fn negotiated(address: &str) -> Metadata {
        Metadata::new(VERSION, "connection-0", "connection-5", address, Encoding::Bincode, TxType::MultiMsg)
    }

    fn channel(state: ChannelState, order: Order, version: &str) -> ChannelEnd {
        ChannelEnd {
            state,
            ordering: order,
            counterparty: Counterparty::new(HOST_PORT_ID, Some("channel-9".into())),
            connection_hops: vec!["connection-0".into()],
            version: version.into(),
        }
    }

    #[test]
    fn test_open_init_blank_version_uses_default_metadata() {
        let fx = fixture();
        let version = fx
            .keeper
            .on_chan_open_init(&open_request(&fx, "channel-0", "", Order::Ordered))
            .unwrap();
        let metadata = Metadata::decode(&version).unwrap();
        assert_eq!(metadata, Metadata::new_default("connection-0", "connection-5"));
        assert!(fx
            .keeper
            .capabilities
            .get_capability(&channel_capability_path(PORT, "channel-0"))
            .is_some());
    }

    #[test]
    fn test_open_init_rejects_bad_ports_and_ordering() {
        let fx = fixture();

        let mut request = open_request(&fx, "channel-0", "", Order::Ordered);
        request.port_id = "transfer".into();
        assert!(matches!(
            fx.keeper.on_chan_open_init(&request),
            Err(IcaError::InvalidControllerPort(_))
        ));

        let mut request = open_request(&fx, "channel-1", "", Order::Ordered);
        request.counterparty.port_id = "transfer".into();
        assert!(matches!(
            fx.keeper.on_chan_open_init(&request),
            Err(IcaError::InvalidHostPort { .. })
        ));

        let request = open_request(&fx, "channel-2", "", Order::Unordered);
        assert!(matches!(
            fx.keeper.on_chan_open_init(&request),
            Err(IcaError::InvalidChannelOrdering { .. })
        ));
    }

    #[test]
    fn test_open_init_rejects_mismatched_connection() {
        let fx = fixture();
        let version = Metadata::new(VERSION, "connection-0", "connection-9", "", Encoding::Bincode, TxType::MultiMsg)
            .encode()
            .unwrap();
        assert!(matches!(
            fx.keeper
                .on_chan_open_init(&open_request(&fx, "channel-0", &version, Order::Ordered)),
            Err(IcaError::InvalidConnection { .. })
        ));
    }

    #[test]
    fn test_open_init_reopen_rules() {
        let fx = fixture();
        let previous = negotiated(ADDRESS).encode().unwrap();
        fx.keeper
            .registry
            .set_active_channel_id("connection-0", PORT, "channel-0")
            .unwrap();

        fx.transport
            .insert_channel(PORT, "channel-0", channel(ChannelState::Open, Order::Ordered, &previous));
        assert!(matches!(
            fx.keeper
                .on_chan_open_init(&open_request(&fx, "channel-1", "", Order::Ordered)),
            Err(IcaError::ActiveChannelAlreadySet { .. })
        ));

        fx.transport
            .insert_channel(PORT, "channel-0", channel(ChannelState::Closed, Order::Ordered, &previous));
        let json = Metadata::new(VERSION, "connection-0", "connection-5", "", Encoding::Json, TxType::MultiMsg)
            .encode()
            .unwrap();
        assert!(matches!(
            fx.keeper
                .on_chan_open_init(&open_request(&fx, "channel-2", &json, Order::Ordered)),
            Err(IcaError::InvalidVersion(_))
        ));

        fx.keeper
            .on_chan_open_init(&open_request(&fx, "channel-3", "", Order::Ordered))
            .unwrap();
    }

    #[test]
    fn test_open_init_rejects_reopen_over_unordered_channel() {
        let fx = fixture();
        let previous = negotiated(ADDRESS).encode().unwrap();
        fx.keeper
            .registry
            .set_active_channel_id("connection-0", PORT, "channel-0")
            .unwrap();
        fx.transport.insert_channel(
            PORT,
            "channel-0",
            channel(ChannelState::Closed, Order::Unordered, &previous),
        );

        assert!(matches!(
            fx.keeper
                .on_chan_open_init(&open_request(&fx, "channel-1", "", Order::Ordered)),
            Err(IcaError::InvalidChannelOrdering { .. })
        ));
    }

    #[test]
    fn test_open_init_dangling_active_channel_is_fatal() {
        let fx = fixture();
        fx.keeper
            .registry
            .set_active_channel_id("connection-0", PORT, "channel-77")
            .unwrap();
        let err = fx
            .keeper
            .on_chan_open_init(&open_request(&fx, "channel-0", "", Order::Ordered))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_open_ack_commits_address() {
        let fx = fixture();
        fx.transport.insert_channel(
            PORT,
            "channel-0",
            channel(ChannelState::Init, Order::Ordered, &negotiated("").encode().unwrap()),
        );

        let version = negotiated(ADDRESS).encode().unwrap();
        fx.keeper.on_chan_open_ack(PORT, "channel-0", &version).unwrap();

        assert_eq!(
            fx.keeper.get_interchain_account_address("alice", "connection-0").unwrap(),
            Some(ADDRESS.to_string())
        );
        assert_eq!(
            fx.keeper.get_active_channel_id("connection-0", PORT).unwrap(),
            Some("channel-0".to_string())
        );
    }

    #[test]
    fn test_open_ack_keeps_registered_address() {
        let fx = fixture();
        let initial = negotiated("").encode().unwrap();
        fx.transport
            .insert_channel(PORT, "channel-0", channel(ChannelState::Init, Order::Ordered, &initial));
        fx.keeper
            .on_chan_open_ack(PORT, "channel-0", &negotiated(ADDRESS).encode().unwrap())
            .unwrap();
        fx.transport
            .set_channel_state(PORT, "channel-0", ChannelState::Closed)
            .unwrap();

        fx.transport
            .insert_channel(PORT, "channel-1", channel(ChannelState::Init, Order::Ordered, &initial));
        assert!(matches!(
            fx.keeper
                .on_chan_open_ack(PORT, "channel-1", &negotiated("qc1other").encode().unwrap()),
            Err(IcaError::InvalidAccountAddress(_))
        ));
        assert_eq!(
            fx.keeper.get_interchain_account_address("alice", "connection-0").unwrap(),
            Some(ADDRESS.to_string())
        );
        assert_eq!(
            fx.keeper.get_active_channel_id("connection-0", PORT).unwrap(),
            Some("channel-0".to_string())
        );

        fx.keeper
            .on_chan_open_ack(PORT, "channel-1", &negotiated(ADDRESS).encode().unwrap())
            .unwrap();
        assert_eq!(
            fx.keeper.get_active_channel_id("connection-0", PORT).unwrap(),
            Some("channel-1".to_string())
        );
    }

    #[test]
    fn test_open_ack_rejections() {
        let fx = fixture();
        let version = negotiated(ADDRESS).encode().unwrap();

        assert!(matches!(
            fx.keeper.on_chan_open_ack(HOST_PORT_ID, "channel-0", &version),
            Err(IcaError::InvalidControllerPort(_))
        ));
        assert!(matches!(
            fx.keeper.on_chan_open_ack(PORT, "channel-0", &version),
            Err(IcaError::ChannelNotFound { .. })
        ));

        fx.transport
            .insert_channel(PORT, "channel-0", channel(ChannelState::Init, Order::Ordered, ""));
        let blank = negotiated("").encode().unwrap();
        assert!(matches!(
            fx.keeper.on_chan_open_ack(PORT, "channel-0", &blank),
            Err(IcaError::InvalidAccountAddress(_))
        ));
        assert!(matches!(
            fx.keeper.on_chan_open_ack(PORT, "channel-0", "not json"),
            Err(IcaError::InvalidType(_))
        ));

        fx.transport
            .insert_channel(PORT, "channel-1", channel(ChannelState::Open, Order::Ordered, &version));
        fx.keeper
            .registry
            .set_active_channel_id("connection-0", PORT, "channel-1")
            .unwrap();
        assert!(matches!(
            fx.keeper.on_chan_open_ack(PORT, "channel-0", &version),
            Err(IcaError::ActiveChannelAlreadySet { .. })
        ));
    }

    #[test]
    fn test_upgrade_init_checks() {
        let fx = fixture();
        let current = negotiated(ADDRESS).encode().unwrap();
        fx.transport
            .insert_channel(PORT, "channel-0", channel(ChannelState::Open, Order::Ordered, &current));

        let proposed = Metadata::new(VERSION, "connection-0", "connection-5", ADDRESS, Encoding::Json, TxType::MultiMsg)
            .encode()
            .unwrap();
        let request = ChannelUpgradeRequest {
            port_id: PORT.into(),
            channel_id: "channel-0".into(),
            proposed_order: Order::Ordered,
            proposed_connection_hops: vec!["connection-0".into()],
            version: proposed.clone(),
        };
        assert_eq!(fx.keeper.on_chan_upgrade_init(&request).unwrap(), proposed);
        fx.keeper.on_chan_upgrade_ack(PORT, "channel-0", &proposed).unwrap();

        let mut hops = request.clone();
        hops.proposed_connection_hops = vec!["connection-1".into()];
        assert!(matches!(
            fx.keeper.on_chan_upgrade_init(&hops),
            Err(IcaError::InvalidUpgrade(_))
        ));

        let mut blank = request.clone();
        blank.version = " ".into();
        assert!(matches!(
            fx.keeper.on_chan_upgrade_init(&blank),
            Err(IcaError::InvalidVersion(_))
        ));

        let mut moved = request;
        moved.version = negotiated("qc1other").encode().unwrap();
        assert!(matches!(
            fx.keeper.on_chan_upgrade_init(&moved),
            Err(IcaError::InvalidAccountAddress(_))
        ));
    }
}
