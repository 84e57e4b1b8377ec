//! Matching service and engine (spec §4.6): resolves create/find/join
//! requests against the game-server registry, allocating or joining a
//! session and notifying the owning ServerDB peer of new allocations.

use crate::codec::{Packet, RawMessage};
use crate::config::RankingPolicy;
use crate::messages::{self, type_symbol};
use crate::peer::Peer;
use crate::registry::{RegisteredGameServer, ServerState};
use crate::service::{PeerSet, Service};
use crate::state::AppState;
use async_trait::async_trait;
use std::sync::Arc;

/// The client-supplied constraints a candidate must satisfy, progressively
/// relaxable by the fallback path when `force_into_any_session` is set
/// (spec §4.6).
#[derive(Clone)]
struct Constraints {
    level_symbol: Option<i64>,
    game_mode_symbol: Option<i64>,
    region_symbol: Option<i64>,
    version_lock: i64,
}

impl Constraints {
    /// Drop the next-least-important constraint, in priority order: level,
    /// then mode, then region. Returns `None` once nothing is left to relax.
    fn relax(&self) -> Option<Self> {
        if self.level_symbol.is_some() {
            Some(Self {
                level_symbol: None,
                ..self.clone()
            })
        } else if self.game_mode_symbol.is_some() {
            Some(Self {
                game_mode_symbol: None,
                ..self.clone()
            })
        } else if self.region_symbol.is_some() {
            Some(Self {
                region_symbol: None,
                ..self.clone()
            })
        } else {
            None
        }
    }
}

fn base_match(record: &RegisteredGameServer, c: &Constraints) -> bool {
    record.is_public()
        && record.version_lock == c.version_lock
        && c.region_symbol.map(|r| r == record.region_symbol).unwrap_or(true)
}

fn rank_key(record: &Arc<RegisteredGameServer>, ping_ms: Option<u32>, policy: RankingPolicy) -> (i64, i64) {
    let population = record.participant_count() as i64;
    let ping = ping_ms.unwrap_or(u32::MAX) as i64;
    match policy {
        RankingPolicy::PopulationFirst => (-population, ping),
        RankingPolicy::LowPing => (ping, -population),
    }
}

pub struct MatchingService {
    state: Arc<AppState>,
    peers: PeerSet,
}

impl MatchingService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            peers: PeerSet::new(),
        }
    }

    fn endpoint(record: &RegisteredGameServer) -> String {
        format!("{}:{}", record.external_address, record.port)
    }

    async fn fail(&self, peer: &Arc<Peer>, reason: &str) {
        let failure = messages::LobbySessionFailure {
            reason: reason.to_string(),
        };
        if let Ok(msg) = messages::encode(type_symbol::LOBBY_SESSION_FAILURE, &failure) {
            peer.send(msg);
        }
    }

    async fn succeed(&self, peer: &Arc<Peer>, session_guid: &crate::security::SessionGuid, record: &RegisteredGameServer, team_index: u32) {
        let success = messages::LobbySessionSuccessV5 {
            session_guid: session_guid.to_string(),
            endpoint: Self::endpoint(record),
            team_index,
        };
        if let Ok(msg) = messages::encode(type_symbol::LOBBY_SESSION_SUCCESS_V5, &success) {
            peer.send(msg);
        }
    }

    /// Rank idle candidates matching `constraints` and try to CAS-lock the
    /// best one, falling through to the next on a lost race (spec §4.6
    /// Allocation).
    fn allocate_create(&self, constraints: &Constraints, ping_ms: Option<u32>) -> Option<(Arc<RegisteredGameServer>, crate::security::SessionGuid)> {
        let policy = self.state.config.matching.ranking_policy;
        let mut candidates: Vec<_> = self
            .state
            .registry
            .all()
            .into_iter()
            .filter(|r| matches!(r.state(), ServerState::Idle) && base_match(r, constraints))
            .collect();
        candidates.sort_by_key(|r| rank_key(r, ping_ms, policy));

        for candidate in candidates {
            let guid = crate::security::SessionGuid::generate();
            if candidate.try_lock_session(guid) {
                return Some((candidate, guid));
            }
        }
        None
    }

    fn allocate_create_with_fallback(&self, constraints: &Constraints, ping_ms: Option<u32>) -> Option<(Arc<RegisteredGameServer>, crate::security::SessionGuid)> {
        if let Some(hit) = self.allocate_create(constraints, ping_ms) {
            return Some(hit);
        }
        if !self.state.config.matching.force_into_any_session {
            return None;
        }
        let mut relaxed = constraints.clone();
        while let Some(next) = relaxed.relax() {
            relaxed = next;
            if let Some(hit) = self.allocate_create(&relaxed, ping_ms) {
                self.state.metrics.increment_matching_fallbacks();
                return Some(hit);
            }
        }
        None
    }

    fn find_candidates(&self, constraints: &Constraints, ping_ms: Option<u32>) -> Vec<Arc<RegisteredGameServer>> {
        let policy = self.state.config.matching.ranking_policy;
        let mut candidates: Vec<_> = self
            .state
            .registry
            .all()
            .into_iter()
            .filter(|r| base_match(r, constraints))
            .filter(|r| match r.state() {
                ServerState::SessionActive { .. } => {
                    r.participant_count() < r.capacity()
                        && constraints.level_symbol.map(|l| *r.level_symbol.lock().unwrap_or_else(|e| e.into_inner()) == Some(l)).unwrap_or(true)
                        && constraints
                            .game_mode_symbol
                            .map(|m| *r.game_mode_symbol.lock().unwrap_or_else(|e| e.into_inner()) == Some(m))
                            .unwrap_or(true)
                }
                _ => false,
            })
            .collect();
        candidates.sort_by_key(|r| rank_key(r, ping_ms, policy));
        candidates
    }

    fn find_with_fallback(&self, constraints: &Constraints, ping_ms: Option<u32>) -> Option<Arc<RegisteredGameServer>> {
        let hits = self.find_candidates(constraints, ping_ms);
        if let Some(hit) = hits.into_iter().next() {
            return Some(hit);
        }
        if !self.state.config.matching.force_into_any_session {
            return None;
        }
        let mut relaxed = constraints.clone();
        while let Some(next) = relaxed.relax() {
            relaxed = next;
            if let Some(hit) = self.find_candidates(&relaxed, ping_ms).into_iter().next() {
                self.state.metrics.increment_matching_fallbacks();
                return Some(hit);
            }
        }
        None
    }

    async fn handle_create(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::LobbyCreateSessionRequestV9>(message) else {
            return;
        };
        let Some(user_id) = peer.user_id() else {
            self.fail(peer, "unauthenticated").await;
            return;
        };
        if self.state.matching_attempts.check(&user_id.render()).await.is_err() {
            self.state.metrics.increment_rate_limit_rejections();
            self.fail(peer, "rate limited").await;
            return;
        }
        self.state.metrics.increment_matching_requests();

        let constraints = Constraints {
            level_symbol: Some(req.level_symbol),
            game_mode_symbol: Some(req.game_mode_symbol),
            region_symbol: req.region_symbol,
            version_lock: req.version_lock,
        };

        match self.allocate_create_with_fallback(&constraints, req.ping_ms) {
            Some((record, guid)) => {
                self.state.metrics.increment_matching_allocations();
                *record.level_symbol.lock().unwrap_or_else(|e| e.into_inner()) = Some(req.level_symbol);
                *record.game_mode_symbol.lock().unwrap_or_else(|e| e.into_inner()) = Some(req.game_mode_symbol);

                let new_session = messages::LobbySessionNew {
                    server_id: record.server_id,
                    session_guid: guid.to_string(),
                    level_symbol: req.level_symbol,
                    game_mode_symbol: req.game_mode_symbol,
                };
                if let Some(server_peer) = self.state.serverdb_peers.get(record.owning_peer) {
                    if let Ok(msg) = messages::encode(type_symbol::LOBBY_SESSION_NEW, &new_session) {
                        server_peer.send(msg);
                    }
                }
                self.succeed(peer, &guid, &record, 0).await;
            }
            None => {
                self.state.metrics.increment_matching_exhausted();
                self.fail(peer, "no servers").await;
            }
        }
    }

    async fn handle_find(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::LobbyFindSessionRequestV11>(message) else {
            return;
        };
        let Some(user_id) = peer.user_id() else {
            self.fail(peer, "unauthenticated").await;
            return;
        };
        if self.state.matching_attempts.check(&user_id.render()).await.is_err() {
            self.state.metrics.increment_rate_limit_rejections();
            self.fail(peer, "rate limited").await;
            return;
        }
        self.state.metrics.increment_matching_requests();

        let constraints = Constraints {
            level_symbol: Some(req.level_symbol),
            game_mode_symbol: Some(req.game_mode_symbol),
            region_symbol: req.region_symbol,
            version_lock: req.version_lock,
        };

        match self.find_with_fallback(&constraints, req.ping_ms) {
            Some(record) => {
                let ServerState::SessionActive { session_guid, .. } = record.state() else {
                    self.state.metrics.increment_matching_exhausted();
                    self.fail(peer, "no servers").await;
                    return;
                };
                let team_index = record.participant_count() % 2;
                self.succeed(peer, &session_guid, &record, team_index).await;
            }
            None => {
                self.state.metrics.increment_matching_exhausted();
                self.fail(peer, "no servers").await;
            }
        }
    }

    async fn handle_join(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::LobbyJoinSessionRequestV7>(message) else {
            return;
        };
        let Some(user_id) = peer.user_id() else {
            self.fail(peer, "unauthenticated").await;
            return;
        };
        if self.state.matching_attempts.check(&user_id.render()).await.is_err() {
            self.state.metrics.increment_rate_limit_rejections();
            self.fail(peer, "rate limited").await;
            return;
        }
        self.state.metrics.increment_matching_requests();
        let Ok(requested_guid) = req.session_guid.parse::<crate::security::SessionGuid>() else {
            self.fail(peer, "malformed session guid").await;
            return;
        };

        let hit = self.state.registry.all().into_iter().find(|record| {
            matches!(
                record.state(),
                ServerState::SessionActive { session_guid, .. } if session_guid == requested_guid
            ) && record.participant_count() < record.capacity()
        });

        match hit {
            Some(record) => {
                let team_index = record.participant_count() % 2;
                self.succeed(peer, &requested_guid, &record, team_index).await;
            }
            None => self.fail(peer, "session not found").await,
        }
    }
}

#[async_trait]
impl Service for MatchingService {
    fn name(&self) -> &'static str {
        "matching"
    }

    fn path(&self) -> &'static str {
        "/matching"
    }

    async fn on_peer_connected(&self, peer: Arc<Peer>) {
        self.peers.insert(peer);
    }

    async fn handle_packet(&self, peer: Arc<Peer>, packet: Packet) {
        for message in &packet {
            match message.type_symbol {
                type_symbol::LOBBY_CREATE_SESSION_REQUEST_V9 => self.handle_create(&peer, message).await,
                type_symbol::LOBBY_FIND_SESSION_REQUEST_V11 => self.handle_find(&peer, message).await,
                type_symbol::LOBBY_JOIN_SESSION_REQUEST_V7 => self.handle_join(&peer, message).await,
                unknown => {
                    tracing::debug!(unknown, "matching: unrecognized message type, ignoring")
                }
            }
        }
    }

    async fn on_peer_disconnected(&self, peer: Arc<Peer>) {
        self.peers.remove(peer.id);
    }
}
