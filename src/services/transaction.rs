//! Transaction service (spec §4.4): accepts placeholder transaction
//! messages and acknowledges them. Real persistence is a non-goal.

use crate::codec::{Packet, RawMessage};
use crate::messages::{self, type_symbol};
use crate::peer::Peer;
use crate::service::{PeerSet, Service};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Default)]
pub struct TransactionService {
    peers: PeerSet,
}

impl TransactionService {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_request(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::TransactionRequest>(message) else {
            return;
        };
        let ack = messages::TransactionAck {
            transaction_id: req.transaction_id,
        };
        if let Ok(msg) = messages::encode(type_symbol::TRANSACTION_ACK, &ack) {
            peer.send(msg);
        }
    }
}

#[async_trait]
impl Service for TransactionService {
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn path(&self) -> &'static str {
        "/transaction"
    }

    async fn on_peer_connected(&self, peer: Arc<Peer>) {
        self.peers.insert(peer);
    }

    async fn handle_packet(&self, peer: Arc<Peer>, packet: Packet) {
        for message in &packet {
            match message.type_symbol {
                type_symbol::TRANSACTION_REQUEST => self.handle_request(&peer, message),
                unknown => {
                    tracing::debug!(unknown, "transaction: unrecognized message type, ignoring")
                }
            }
        }
    }

    async fn on_peer_disconnected(&self, peer: Arc<Peer>) {
        self.peers.remove(peer.id);
    }
}
