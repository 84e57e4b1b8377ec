//! Shared application state handed to every service (spec §2).

use crate::auth::AclGuard;
use crate::config::Config;
use crate::metrics::ServerMetrics;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::registry::GameServerRegistry;
use crate::service::PeerSet;
use crate::session_cache::SessionCache;
use crate::storage::Storage;
use crate::symbols::SymbolCache;
use std::sync::Arc;
use std::time::Duration;

/// Everything the five services and the matching engine need, bundled once
/// at startup and shared behind an `Arc`.
pub struct AppState {
    pub config: Config,
    pub storage: Storage,
    pub symbols: SymbolCache,
    pub session_cache: SessionCache,
    pub acl: AclGuard,
    pub registry: GameServerRegistry,
    /// Counters and latency histograms for the `/v1/metrics` and
    /// `/v1/metrics/prom` ambient instrumentation surface (spec §10.5),
    /// mounted by `session_server::router` when `config.metrics.enabled`.
    pub metrics: Arc<ServerMetrics>,
    /// ServerDB peers, keyed by peer id, shared with the matching engine so
    /// it can deliver `LobbySessionNew` to the server that owns an
    /// allocated record (spec §4.6 commit step).
    pub serverdb_peers: PeerSet,
    /// Keyed by remote IP (spec ambient §10.6: Login attempts per IP).
    pub login_attempts: Arc<RateLimiter<String>>,
    /// Keyed by user id string (Matching session requests per user).
    pub matching_attempts: Arc<RateLimiter<String>>,
    /// Keyed by peer id (ServerDB registration attempts per peer).
    pub serverdb_attempts: Arc<RateLimiter<String>>,
}

impl AppState {
    pub fn new(
        config: Config,
        storage: Storage,
        symbols: SymbolCache,
        acl: AclGuard,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        let session_cache = SessionCache::new(
            Duration::from_secs(config.security.session_ttl_secs),
            Duration::from_secs(config.security.session_disconnected_timeout_secs),
        );
        let rate_limit_config: RateLimitConfig = (&config.rate_limit).into();

        Self {
            session_cache,
            acl,
            registry: GameServerRegistry::new(),
            metrics,
            serverdb_peers: PeerSet::new(),
            login_attempts: Arc::new(RateLimiter::new(rate_limit_config.clone())),
            matching_attempts: Arc::new(RateLimiter::new(rate_limit_config.clone())),
            serverdb_attempts: Arc::new(RateLimiter::new(rate_limit_config)),
            config,
            storage,
            symbols,
        }
    }
}
