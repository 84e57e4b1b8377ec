//! Matching engine configuration (spec §4.6).

use super::defaults::{
    default_force_into_any_session, default_udp_probe_bind_addr, default_validate_endpoint,
    default_validate_timeout_ms,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    #[default]
    PopulationFirst,
    LowPing,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchingConfig {
    #[serde(default)]
    pub ranking_policy: RankingPolicy,
    /// Default **off**: fallback into an unrelated session is opt-in, not
    /// automatic.
    #[serde(default = "default_force_into_any_session")]
    pub force_into_any_session: bool,
    /// Default **off**: UDP liveness probing of newly registered servers.
    #[serde(default = "default_validate_endpoint")]
    pub validate_endpoint: bool,
    #[serde(default = "default_validate_timeout_ms")]
    pub validate_timeout_ms: u64,
    #[serde(default = "default_udp_probe_bind_addr")]
    pub udp_probe_bind_addr: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            ranking_policy: RankingPolicy::default(),
            force_into_any_session: default_force_into_any_session(),
            validate_endpoint: default_validate_endpoint(),
            validate_timeout_ms: default_validate_timeout_ms(),
            udp_probe_bind_addr: default_udp_probe_bind_addr(),
        }
    }
}
