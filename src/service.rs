//! Named handler set bound to a URL path; the common shape all five
//! concrete services share (spec §3 item 5, §4.2).
//!
//! A peer-set-plus-event shape, generalized from a single game server to
//! five independent, peer-disjoint services.

use crate::codec::Packet;
use crate::peer::Peer;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// The handler contract every service implements. Dispatch of individual
/// messages inside a packet is owned by the implementation; this trait only
/// fixes the shape the session server drives it through.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;
    fn path(&self) -> &'static str;

    /// Called once per accepted connection routed to this service, before
    /// any packet is handled.
    async fn on_peer_connected(&self, peer: Arc<Peer>);

    /// Dispatch every message in `packet` to its typed handler, in order.
    async fn handle_packet(&self, peer: Arc<Peer>, packet: Packet);

    /// Called once a peer's connection has been fully torn down. Must not
    /// assume the peer is still reachable (sends are no-ops by then).
    async fn on_peer_disconnected(&self, peer: Arc<Peer>);

    /// Called exactly once per peer, the first time
    /// [`Peer::update_user_authentication`] succeeds.
    async fn on_peer_authenticated(&self, peer: Arc<Peer>) {
        let _ = peer;
    }

    /// Called once per decoded message, before `handle_packet` dispatches
    /// the packet it belongs to (spec §4.2).
    async fn on_packet_received(&self, peer: Arc<Peer>, message: &crate::codec::RawMessage) {
        let _ = (peer, message);
    }

    /// Called once per message successfully written to the peer's socket
    /// (spec §4.2).
    async fn on_packet_sent(&self, peer: Arc<Peer>, message: &crate::codec::RawMessage) {
        let _ = (peer, message);
    }
}

/// Peer bookkeeping shared by every concrete service: the set of currently
/// connected peers, keyed by peer id. Composed into each service rather than
/// inherited — services do not share peers with each other (spec §4.2).
#[derive(Default)]
pub struct PeerSet {
    peers: DashMap<Uuid, Arc<Peer>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, peer: Arc<Peer>) {
        self.peers.insert(peer.id, peer);
    }

    pub fn remove(&self, peer_id: Uuid) -> Option<Arc<Peer>> {
        self.peers.remove(&peer_id).map(|(_, p)| p)
    }

    pub fn get(&self, peer_id: Uuid) -> Option<Arc<Peer>> {
        self.peers.get(&peer_id).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<Peer>> + '_ {
        self.peers.iter().map(|entry| entry.value().clone())
    }

    /// Enqueue `message` on every connected peer (spec `Messaging`-style
    /// broadcast used by Login's `LoginSettings` and similar).
    pub fn broadcast(&self, message: crate::codec::RawMessage) {
        for peer in self.iter() {
            peer.send(message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn peer() -> (Arc<Peer>, mpsc::UnboundedReceiver<crate::codec::RawMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        (Arc::new(Peer::new(addr, tx)), rx)
    }

    #[test]
    fn insert_and_remove_round_trip() {
        let set = PeerSet::new();
        let (p, _rx) = peer();
        let id = p.id;
        set.insert(p);
        assert_eq!(set.len(), 1);
        assert!(set.get(id).is_some());
        assert!(set.remove(id).is_some());
        assert!(set.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_peer() {
        let set = PeerSet::new();
        let (p1, mut rx1) = peer();
        let (p2, mut rx2) = peer();
        set.insert(p1);
        set.insert(p2);

        set.broadcast(crate::codec::RawMessage {
            type_symbol: 1,
            body: Bytes::from_static(b"hi"),
        });

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
