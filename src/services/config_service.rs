//! Config service (spec §4.4): serves `ConfigRequest(type, identifier)`
//! from the Configs collection. Read-only.

use crate::codec::{Packet, RawMessage};
use crate::messages::{self, type_symbol};
use crate::peer::Peer;
use crate::service::{PeerSet, Service};
use crate::state::AppState;
use crate::storage::resources::ConfigResource;
use async_trait::async_trait;
use std::sync::Arc;

const CONFIGS_COLLECTION: &str = "configs";

pub struct ConfigService {
    state: Arc<AppState>,
    peers: PeerSet,
}

impl ConfigService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            peers: PeerSet::new(),
        }
    }

    async fn handle_request(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::ConfigRequest>(message) else {
            return;
        };
        let key = ConfigResource::collection_key(&req.resource_type, &req.identifier);
        match self
            .state
            .storage
            .get_item::<ConfigResource>(CONFIGS_COLLECTION, &key)
            .await
        {
            Ok(Some(resource)) => {
                if let Ok(msg) =
                    messages::encode(type_symbol::CONFIG_SUCCESS, &messages::ConfigSuccess(resource))
                {
                    peer.send(msg);
                }
            }
            _ => {
                let failure = messages::TypedFailure::new(404, "config not found");
                if let Ok(msg) = messages::encode(type_symbol::CONFIG_FAILURE, &failure) {
                    peer.send(msg);
                }
            }
        }
    }
}

#[async_trait]
impl Service for ConfigService {
    fn name(&self) -> &'static str {
        "config"
    }

    fn path(&self) -> &'static str {
        "/config"
    }

    async fn on_peer_connected(&self, peer: Arc<Peer>) {
        self.peers.insert(peer);
    }

    async fn handle_packet(&self, peer: Arc<Peer>, packet: Packet) {
        for message in &packet {
            match message.type_symbol {
                type_symbol::CONFIG_REQUEST => self.handle_request(&peer, message).await,
                unknown => tracing::debug!(unknown, "config: unrecognized message type, ignoring"),
            }
        }
    }

    async fn on_peer_disconnected(&self, peer: Arc<Peer>) {
        self.peers.remove(peer.id);
    }
}
