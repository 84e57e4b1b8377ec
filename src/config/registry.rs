//! Game-server registry configuration. Kept as its own section, per the
//! one-module-per-concern config split used throughout, even though it
//! currently carries nothing beyond what `MatchingConfig` already exposes —
//! future registry-specific knobs (e.g. index sharding) land here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RegistryConfig {}
