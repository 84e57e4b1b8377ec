//! Debug/verbose flags. Default **off**, matching the documented default
//! rather than an always-on debug mode.

use super::defaults::default_verbose;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DebugConfig {
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            verbose: default_verbose(),
        }
    }
}
