//! Symbol cache configuration (spec §3, §9).

use super::defaults::default_symbol_cache_path;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SymbolCacheConfig {
    /// Path to the pre-built symbol table loaded once at startup.
    #[serde(default = "default_symbol_cache_path")]
    pub path: String,
}

impl Default for SymbolCacheConfig {
    fn default() -> Self {
        Self {
            path: default_symbol_cache_path(),
        }
    }
}
