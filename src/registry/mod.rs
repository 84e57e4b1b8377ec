//! Game-server registry (spec §3, §4.5): the ServerDB service's index of
//! live dedicated servers, with CAS-guarded state transitions and
//! region/version-lock secondary indexes.
//!
//! A dual-lock shape (an outer `RwLock` over the indexes, inner per-record
//! locking for mutable fields), generalized from player-connection tracking
//! to game-server records.

pub mod probe;

use crate::security::SessionGuid;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// State machine of a [`RegisteredGameServer`] (spec §4.5 table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    SessionLocked {
        session_guid: SessionGuid,
    },
    SessionActive {
        session_guid: SessionGuid,
        participant_count: u32,
    },
    Removed,
}

/// Fields supplied by a `RegisterGameServer` request.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub server_id: u64,
    pub internal_address: String,
    pub external_address: String,
    pub port: u16,
    pub region_symbol: i64,
    pub version_lock: i64,
    pub is_public: bool,
    pub capacity: u32,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("server_id must be non-zero")]
    ZeroServerId,
    #[error("port must be in (0, 65535]")]
    InvalidPort,
    #[error("peer {0} has already registered a game server")]
    PeerAlreadyRegistered(Uuid),
    #[error("server_id {0} is already registered")]
    ServerIdTaken(u64),
    #[error("no registered server with id {0}")]
    NotFound(u64),
    #[error("state transition not permitted from {0:?}")]
    InvalidTransition(ServerState),
}

fn validate_registration(req: &RegistrationRequest) -> Result<(), RegistryError> {
    if req.server_id == 0 {
        return Err(RegistryError::ZeroServerId);
    }
    if req.port == 0 {
        return Err(RegistryError::InvalidPort);
    }
    Ok(())
}

/// A live dedicated game server (spec §3). Back-references the ServerDB
/// peer that registered it by id only — lookup, never ownership; the peer's
/// disconnect handler is what removes this record, not the other way
/// around (spec §9).
pub struct RegisteredGameServer {
    pub server_id: u64,
    pub owning_peer: Uuid,
    pub internal_address: String,
    pub external_address: String,
    pub port: u16,
    pub region_symbol: i64,
    pub version_lock: i64,
    pub is_public: Mutex<bool>,
    pub capacity: Mutex<u32>,
    pub level_symbol: Mutex<Option<i64>>,
    pub game_mode_symbol: Mutex<Option<i64>>,
    state: Mutex<ServerState>,
}

impl RegisteredGameServer {
    pub fn state(&self) -> ServerState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn participant_count(&self) -> u32 {
        match self.state() {
            ServerState::SessionActive {
                participant_count, ..
            } => participant_count,
            _ => 0,
        }
    }

    pub fn is_public(&self) -> bool {
        *self.is_public.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> u32 {
        *self.capacity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a `RegistrationUpdate` (spec §4.5: publish/unpublish, capacity
    /// change). Fields left `None` are unchanged.
    pub fn apply_update(&self, is_public: Option<bool>, capacity: Option<u32>) {
        if let Some(is_public) = is_public {
            *self.is_public.lock().unwrap_or_else(|e| e.into_inner()) = is_public;
        }
        if let Some(capacity) = capacity {
            *self.capacity.lock().unwrap_or_else(|e| e.into_inner()) = capacity;
        }
    }

    /// Atomically move `idle -> session-locked` with a freshly generated
    /// session guid. Fails if another requester already won the race or the
    /// record is not idle (spec §4.5, §4.6, §8 property 4).
    pub fn try_lock_session(&self, session_guid: SessionGuid) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, ServerState::Idle) {
            *state = ServerState::SessionLocked { session_guid };
            true
        } else {
            false
        }
    }

    /// `session-locked -> session-active`, on `LobbySessionStartedv4`.
    pub fn mark_active(&self, session_guid: SessionGuid) -> Result<(), RegistryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            ServerState::SessionLocked { session_guid: locked } if *locked == session_guid => {
                *state = ServerState::SessionActive {
                    session_guid,
                    participant_count: 0,
                };
                Ok(())
            }
            other => Err(RegistryError::InvalidTransition(other.clone())),
        }
    }

    /// Adjust the live participant counter; transitions back to `idle` when
    /// it reaches zero (spec §4.5 table).
    pub fn adjust_participants(&self, delta: i32) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let ServerState::SessionActive {
            session_guid,
            participant_count,
        } = &*state
        {
            let updated = participant_count.saturating_add_signed(delta);
            if updated == 0 {
                *state = ServerState::Idle;
            } else {
                *state = ServerState::SessionActive {
                    session_guid: *session_guid,
                    participant_count: updated,
                };
            }
        }
    }

    /// `session-locked` or `session-active` -> `idle`, on `LobbySessionEnded`.
    pub fn end_session(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(*state, ServerState::Removed) {
            *state = ServerState::Idle;
        }
    }

    fn mark_removed(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ServerState::Removed;
    }
}

/// The registry itself: indexed by id with region/version-lock secondary
/// indexes, guarded by an outer reader/writer lock (spec §5).
#[derive(Default)]
pub struct GameServerRegistry {
    by_id: RwLock<HashMap<u64, std::sync::Arc<RegisteredGameServer>>>,
    by_peer: RwLock<HashMap<Uuid, u64>>,
    by_region: RwLock<HashMap<i64, HashSet<u64>>>,
    by_version: RwLock<HashMap<i64, HashSet<u64>>>,
}

impl GameServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new server for `owning_peer`. Rejects a second
    /// registration from the same peer (spec §8 property 3) and a
    /// duplicate `server_id`.
    pub fn register(
        &self,
        owning_peer: Uuid,
        req: RegistrationRequest,
    ) -> Result<std::sync::Arc<RegisteredGameServer>, RegistryError> {
        validate_registration(&req)?;

        let mut by_peer = self.by_peer.write().unwrap_or_else(|e| e.into_inner());
        if by_peer.contains_key(&owning_peer) {
            return Err(RegistryError::PeerAlreadyRegistered(owning_peer));
        }

        let mut by_id = self.by_id.write().unwrap_or_else(|e| e.into_inner());
        if by_id.contains_key(&req.server_id) {
            return Err(RegistryError::ServerIdTaken(req.server_id));
        }

        let record = std::sync::Arc::new(RegisteredGameServer {
            server_id: req.server_id,
            owning_peer,
            internal_address: req.internal_address,
            external_address: req.external_address,
            port: req.port,
            region_symbol: req.region_symbol,
            version_lock: req.version_lock,
            is_public: Mutex::new(req.is_public),
            capacity: Mutex::new(req.capacity),
            level_symbol: Mutex::new(None),
            game_mode_symbol: Mutex::new(None),
            state: Mutex::new(ServerState::Idle),
        });

        by_id.insert(req.server_id, record.clone());
        by_peer.insert(owning_peer, req.server_id);
        self.by_region
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(req.region_symbol)
            .or_default()
            .insert(req.server_id);
        self.by_version
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(req.version_lock)
            .or_default()
            .insert(req.server_id);

        Ok(record)
    }

    /// Remove the registration owned by `peer_id`, if any (spec §8 property
    /// 3: "on disconnect the registration is removed before the peer's
    /// close completes").
    pub fn unregister_by_peer(&self, peer_id: Uuid) -> Option<std::sync::Arc<RegisteredGameServer>> {
        let server_id = self
            .by_peer
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&peer_id)?;

        let record = self
            .by_id
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&server_id)?;
        record.mark_removed();

        if let Some(set) = self
            .by_region
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&record.region_symbol)
        {
            set.remove(&server_id);
        }
        if let Some(set) = self
            .by_version
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&record.version_lock)
        {
            set.remove(&server_id);
        }

        Some(record)
    }

    pub fn get(&self, server_id: u64) -> Option<std::sync::Arc<RegisteredGameServer>> {
        self.by_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&server_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every currently registered record, for use by the matching engine's
    /// candidate filter (spec §4.6). Ordering is unspecified.
    pub fn all(&self) -> Vec<std::sync::Arc<RegisteredGameServer>> {
        self.by_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(server_id: u64) -> RegistrationRequest {
        RegistrationRequest {
            server_id,
            internal_address: "10.0.0.1".into(),
            external_address: "203.0.113.7".into(),
            port: 6792,
            region_symbol: 1,
            version_lock: 1,
            is_public: true,
            capacity: 12,
        }
    }

    #[test]
    fn register_then_lookup_by_id() {
        let registry = GameServerRegistry::new();
        let peer = Uuid::new_v4();
        let record = registry.register(peer, request(42)).unwrap();
        assert_eq!(record.server_id, 42);
        assert_eq!(registry.get(42).unwrap().server_id, 42);
    }

    #[test]
    fn rejects_zero_server_id() {
        let registry = GameServerRegistry::new();
        let err = registry.register(Uuid::new_v4(), request(0)).unwrap_err();
        assert!(matches!(err, RegistryError::ZeroServerId));
    }

    #[test]
    fn rejects_second_registration_from_same_peer() {
        let registry = GameServerRegistry::new();
        let peer = Uuid::new_v4();
        registry.register(peer, request(1)).unwrap();
        let err = registry.register(peer, request(2)).unwrap_err();
        assert!(matches!(err, RegistryError::PeerAlreadyRegistered(_)));
    }

    #[test]
    fn unregister_removes_from_all_indexes() {
        let registry = GameServerRegistry::new();
        let peer = Uuid::new_v4();
        registry.register(peer, request(7)).unwrap();
        assert!(registry.unregister_by_peer(peer).is_some());
        assert!(registry.get(7).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn concurrent_session_lock_only_one_winner() {
        let registry = GameServerRegistry::new();
        let record = registry.register(Uuid::new_v4(), request(1)).unwrap();

        let guid_a = SessionGuid::generate();
        let guid_b = SessionGuid::generate();
        assert!(record.try_lock_session(guid_a));
        assert!(!record.try_lock_session(guid_b));
        assert_eq!(
            record.state(),
            ServerState::SessionLocked {
                session_guid: guid_a
            }
        );
    }

    #[test]
    fn session_lifecycle_returns_to_idle_at_zero_participants() {
        let registry = GameServerRegistry::new();
        let record = registry.register(Uuid::new_v4(), request(1)).unwrap();
        let guid = SessionGuid::generate();

        assert!(record.try_lock_session(guid));
        record.mark_active(guid).unwrap();
        record.adjust_participants(3);
        assert_eq!(record.participant_count(), 3);
        record.adjust_participants(-3);
        assert_eq!(record.state(), ServerState::Idle);
    }
}
