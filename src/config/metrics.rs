//! Metrics surface configuration (spec ambient §10.5).

use super::defaults::default_metrics_enabled;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose `/v1/metrics` (JSON) and `/v1/metrics/prom` (Prometheus text)
    /// on the auxiliary HTTP surface.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
