//! ServerDB service (spec §4.5): the endpoint dedicated game servers
//! connect to. Each peer registers exactly once and drives the registry's
//! state machine for its record.

use crate::codec::{Packet, RawMessage};
use crate::messages::{self, type_symbol};
use crate::peer::Peer;
use crate::registry::{probe, RegistrationRequest, RegistryError};
use crate::service::Service;
use crate::state::AppState;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Reject loopback, link-local, unspecified, broadcast, and private-range
/// addresses (spec §4.5 step 1: `external_address` must be public).
fn is_publicly_routable(address: &str) -> bool {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_multicast())
        }
        Ok(IpAddr::V6(v6)) => !(v6.is_loopback() || v6.is_unspecified() || v6.is_multicast()),
        Err(_) => false,
    }
}

pub struct ServerDbService {
    state: Arc<AppState>,
}

impl ServerDbService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn handle_register(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::RegisterGameServerRequest>(message) else {
            return;
        };

        if self.state.symbols.name_for(req.region_symbol).is_none() {
            tracing::warn!(server_id = req.server_id, region_symbol = req.region_symbol, "OnGameServerRegistrationFailure");
            self.fail_registration(peer, "unresolvable region symbol").await;
            return;
        }
        if !is_publicly_routable(&req.external_address) {
            tracing::warn!(server_id = req.server_id, external_address = %req.external_address, "OnGameServerRegistrationFailure");
            self.fail_registration(peer, "external address is not publicly routable").await;
            return;
        }

        if self.state.config.matching.validate_endpoint {
            let Ok(target) = format!("{}:{}", req.external_address, req.port).parse::<SocketAddr>()
            else {
                self.fail_registration(peer, "unresolvable external address").await;
                return;
            };
            let timeout = Duration::from_millis(self.state.config.matching.validate_timeout_ms);
            if let Err(err) = probe::validate_endpoint(
                &self.state.config.matching.udp_probe_bind_addr,
                target,
                timeout,
            )
            .await
            {
                tracing::warn!(server_id = req.server_id, error = %err, "OnGameServerRegistrationFailure");
                self.fail_registration(peer, &err.to_string()).await;
                return;
            }
        }

        let registration = RegistrationRequest {
            server_id: req.server_id,
            internal_address: req.internal_address,
            external_address: req.external_address,
            port: req.port,
            region_symbol: req.region_symbol,
            version_lock: req.version_lock,
            is_public: req.is_public,
            capacity: req.capacity,
        };

        match self.state.registry.register(peer.id, registration) {
            Ok(record) => {
                self.state.metrics.increment_registrations();
                peer.set_session_data("serverdb", record.server_id);
                tracing::info!(server_id = record.server_id, "OnGameServerRegistered");
            }
            Err(err @ (RegistryError::ZeroServerId | RegistryError::InvalidPort)) => {
                self.fail_registration(peer, &err.to_string()).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "OnGameServerRegistrationFailure");
                self.fail_registration(peer, &err.to_string()).await;
            }
        }
    }

    async fn fail_registration(&self, peer: &Arc<Peer>, reason: &str) {
        self.state.metrics.increment_registration_failures();
        let failure = messages::RegistrationFailure {
            reason: reason.to_string(),
        };
        if let Ok(msg) = messages::encode(type_symbol::REGISTRATION_FAILURE, &failure) {
            peer.send(msg);
        }
        peer.close();
    }

    fn current_server_id(&self, peer: &Arc<Peer>) -> Option<u64> {
        peer.get_session_data::<u64>("serverdb")
    }

    async fn handle_session_started(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Some(server_id) = self.current_server_id(peer) else {
            return;
        };
        let Ok(body) = messages::decode::<messages::LobbySessionStartedV4>(message) else {
            return;
        };
        let Ok(guid) = body.session_guid.parse() else {
            return;
        };
        if let Some(record) = self.state.registry.get(server_id) {
            let _ = record.mark_active(guid);
        }
    }

    async fn handle_player_join(&self, peer: &Arc<Peer>) {
        if let Some(record) = self.current_server_id(peer).and_then(|id| self.state.registry.get(id)) {
            record.adjust_participants(1);
        }
    }

    async fn handle_player_leave(&self, peer: &Arc<Peer>) {
        if let Some(record) = self.current_server_id(peer).and_then(|id| self.state.registry.get(id)) {
            record.adjust_participants(-1);
        }
    }

    async fn handle_session_ended(&self, peer: &Arc<Peer>) {
        if let Some(record) = self.current_server_id(peer).and_then(|id| self.state.registry.get(id)) {
            record.end_session();
        }
    }

    async fn handle_registration_update(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Some(record) = self.current_server_id(peer).and_then(|id| self.state.registry.get(id)) else {
            return;
        };
        let Ok(update) = messages::decode::<messages::RegistrationUpdate>(message) else {
            return;
        };
        record.apply_update(update.is_public, update.capacity);
    }
}

#[async_trait]
impl Service for ServerDbService {
    fn name(&self) -> &'static str {
        "serverdb"
    }

    fn path(&self) -> &'static str {
        "/serverdb"
    }

    async fn on_peer_connected(&self, peer: Arc<Peer>) {
        self.state.serverdb_peers.insert(peer);
    }

    async fn handle_packet(&self, peer: Arc<Peer>, packet: Packet) {
        for message in &packet {
            match message.type_symbol {
                type_symbol::REGISTER_GAME_SERVER => self.handle_register(&peer, message).await,
                type_symbol::LOBBY_SESSION_STARTED_V4 => {
                    self.handle_session_started(&peer, message).await
                }
                type_symbol::PLAYER_JOIN => self.handle_player_join(&peer).await,
                type_symbol::PLAYER_LEAVE => self.handle_player_leave(&peer).await,
                type_symbol::LOBBY_SESSION_ENDED => self.handle_session_ended(&peer).await,
                type_symbol::REGISTRATION_UPDATE => {
                    self.handle_registration_update(&peer, message).await
                }
                unknown => {
                    tracing::debug!(unknown, "serverdb: unrecognized message type, ignoring")
                }
            }
        }
    }

    async fn on_peer_disconnected(&self, peer: Arc<Peer>) {
        if self.state.registry.unregister_by_peer(peer.id).is_some() {
            self.state.metrics.increment_deregistrations();
            tracing::info!(peer_id = %peer.id, "OnGameServerUnregistered");
        }
        self.state.serverdb_peers.remove(peer.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_address_accepted() {
        assert!(is_publicly_routable("203.0.113.9"));
    }

    #[test]
    fn private_and_loopback_addresses_rejected() {
        assert!(!is_publicly_routable("10.0.0.5"));
        assert!(!is_publicly_routable("192.168.1.1"));
        assert!(!is_publicly_routable("127.0.0.1"));
        assert!(!is_publicly_routable("0.0.0.0"));
        assert!(!is_publicly_routable("not-an-ip"));
    }
}
