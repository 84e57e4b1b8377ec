//! Document service (spec §4.4): serves localized documents keyed by
//! `(type, language)`. Read-only.

use crate::codec::{Packet, RawMessage};
use crate::messages::{self, type_symbol};
use crate::peer::Peer;
use crate::service::{PeerSet, Service};
use crate::state::AppState;
use crate::storage::resources::DocumentResource;
use async_trait::async_trait;
use std::sync::Arc;

const DOCUMENTS_COLLECTION: &str = "documents";

pub struct DocumentService {
    state: Arc<AppState>,
    peers: PeerSet,
}

impl DocumentService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            peers: PeerSet::new(),
        }
    }

    async fn handle_request(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::DocumentRequestV2>(message) else {
            return;
        };
        if self.state.symbols.symbol_for(&req.language).is_none() {
            let failure = messages::TypedFailure::new(404, "unknown language symbol");
            if let Ok(msg) = messages::encode(type_symbol::DOCUMENT_FAILURE, &failure) {
                peer.send(msg);
            }
            return;
        }

        let key = DocumentResource::collection_key(&req.resource_type, &req.language);
        match self
            .state
            .storage
            .get_item::<DocumentResource>(DOCUMENTS_COLLECTION, &key)
            .await
        {
            Ok(Some(doc)) => {
                if let Ok(msg) =
                    messages::encode(type_symbol::DOCUMENT_SUCCESS, &messages::DocumentSuccess(doc))
                {
                    peer.send(msg);
                }
            }
            _ => {
                let failure = messages::TypedFailure::new(404, "document not found");
                if let Ok(msg) = messages::encode(type_symbol::DOCUMENT_FAILURE, &failure) {
                    peer.send(msg);
                }
            }
        }
    }
}

#[async_trait]
impl Service for DocumentService {
    fn name(&self) -> &'static str {
        "document"
    }

    fn path(&self) -> &'static str {
        "/document"
    }

    async fn on_peer_connected(&self, peer: Arc<Peer>) {
        self.peers.insert(peer);
    }

    async fn handle_packet(&self, peer: Arc<Peer>, packet: Packet) {
        for message in &packet {
            match message.type_symbol {
                type_symbol::DOCUMENT_REQUEST_V2 => self.handle_request(&peer, message).await,
                unknown => {
                    tracing::debug!(unknown, "document: unrecognized message type, ignoring")
                }
            }
        }
    }

    async fn on_peer_disconnected(&self, peer: Arc<Peer>) {
        self.peers.remove(peer.id);
    }
}
