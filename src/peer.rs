//! Per-connection state shared by every service (spec §3, §4.2).

use crate::codec::RawMessage;
use crate::xplatform::XPlatformId;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A type-erased per-service slot on a peer (spec §9: "opaque per-peer
/// session slot"). Each service downcasts to its own state type and panics
/// on mismatch — a service only ever stores its own type in its own slot.
pub type SessionData = Box<dyn Any + Send + Sync>;

#[derive(Default)]
struct SlotMap {
    slots: std::collections::HashMap<&'static str, SessionData>,
}

struct AuthState {
    user_id: Option<XPlatformId>,
    display_name: Option<String>,
}

/// One live connection to one [`crate::service::Service`] (spec §4.2).
///
/// Created on accept, destroyed on disconnect. Sends are enqueued on an
/// unbounded channel drained by the connection's write task, so `send()`
/// never blocks the caller and preserves per-peer ordering.
pub struct Peer {
    pub id: Uuid,
    pub address: SocketAddr,
    outbound: mpsc::UnboundedSender<RawMessage>,
    cancel: CancellationToken,
    auth: RwLock<AuthState>,
    authenticated_fired: AtomicBool,
    slots: RwLock<SlotMap>,
}

impl Peer {
    pub fn new(address: SocketAddr, outbound: mpsc::UnboundedSender<RawMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            outbound,
            cancel: CancellationToken::new(),
            auth: RwLock::new(AuthState {
                user_id: None,
                display_name: None,
            }),
            authenticated_fired: AtomicBool::new(false),
            slots: RwLock::new(SlotMap::default()),
        }
    }

    /// Enqueue a message for delivery. At-most-once, ordered per peer;
    /// silently dropped if the connection's write side has already gone
    /// away (the peer is about to be torn down regardless).
    pub fn send(&self, message: RawMessage) {
        let _ = self.outbound.send(message);
    }

    pub fn send_all(&self, messages: impl IntoIterator<Item = RawMessage>) {
        for message in messages {
            self.send(message);
        }
    }

    /// Request that the connection's read/write loop terminate.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn user_id(&self) -> Option<XPlatformId> {
        self.auth.read().unwrap_or_else(|e| e.into_inner()).user_id.clone()
    }

    pub fn display_name(&self) -> Option<String> {
        self.auth
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .display_name
            .clone()
    }

    /// Set the authenticated identity. Returns `true` exactly once per peer
    /// (on the first call), signalling the caller should fire the
    /// service-level `on_peer_authenticated` event.
    pub fn update_user_authentication(
        &self,
        user_id: XPlatformId,
        display_name: Option<String>,
    ) -> bool {
        {
            let mut state = self.auth.write().unwrap_or_else(|e| e.into_inner());
            state.user_id = Some(user_id);
            state.display_name = display_name;
        }
        self.authenticated_fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn get_session_data<T: 'static + Clone>(&self, service: &'static str) -> Option<T> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .slots
            .get(service)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn set_session_data<T: 'static + Send + Sync>(&self, service: &'static str, value: T) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.slots.insert(service, Box::new(value));
    }

    pub fn clear_session_data(&self, service: &'static str) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.slots.remove(service);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplatform::Platform;

    fn peer() -> (Peer, mpsc::UnboundedReceiver<RawMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        (Peer::new(addr, tx), rx)
    }

    #[test]
    fn starts_unauthenticated() {
        let (peer, _rx) = peer();
        assert!(peer.user_id().is_none());
    }

    #[test]
    fn authentication_event_fires_exactly_once() {
        let (peer, _rx) = peer();
        let id = XPlatformId::new(Platform::Steam, "alice").unwrap();
        assert!(peer.update_user_authentication(id.clone(), Some("Alice".into())));
        assert!(!peer.update_user_authentication(id, Some("Alice2".into())));
    }

    #[test]
    fn session_data_round_trips_and_clears() {
        let (peer, _rx) = peer();
        peer.set_session_data("login", 7u64);
        assert_eq!(peer.get_session_data::<u64>("login"), Some(7));
        peer.clear_session_data("login");
        assert_eq!(peer.get_session_data::<u64>("login"), None);
    }

    #[test]
    fn close_sets_cancellation_token() {
        let (peer, _rx) = peer();
        assert!(!peer.is_closed());
        peer.close();
        assert!(peer.is_closed());
    }
}
