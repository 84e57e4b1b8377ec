//! Core listener configuration.

use super::defaults::{
    default_accept_backlog, default_bind_port, default_region_id,
    default_shutdown_grace_period_secs,
};
use serde::{Deserialize, Serialize};

/// Configuration for the session server's single TCP listener (spec §4.7).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Port the session server's listener binds to.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// Identifier for this relay's deployment region, used when validating
    /// a game server's `region_symbol` against the registry's expectations.
    #[serde(default = "default_region_id")]
    pub region_id: String,
    /// TCP listen backlog.
    #[serde(default = "default_accept_backlog")]
    pub accept_backlog: u32,
    /// Bounded grace period given to in-flight handlers on shutdown before
    /// forceful termination (spec §5).
    #[serde(default = "default_shutdown_grace_period_secs")]
    pub shutdown_grace_period_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: default_bind_port(),
            region_id: default_region_id(),
            accept_backlog: default_accept_backlog(),
            shutdown_grace_period_secs: default_shutdown_grace_period_secs(),
        }
    }
}
