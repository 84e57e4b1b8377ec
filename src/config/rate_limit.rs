//! Rate limiting configuration (spec ambient §10.6), applied per-key to
//! login attempts, matching requests and registration attempts.

use super::defaults::{default_rate_limit_max_attempts, default_rate_limit_time_window_secs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_rate_limit_time_window_secs")]
    pub time_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_rate_limit_max_attempts(),
            time_window_secs: default_rate_limit_time_window_secs(),
        }
    }
}
