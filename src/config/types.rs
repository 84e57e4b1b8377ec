//! Root configuration types.

use super::debug::DebugConfig;
use super::logging::LoggingConfig;
use super::matching::MatchingConfig;
use super::metrics::MetricsConfig;
use super::rate_limit::RateLimitConfig;
use super::registry::RegistryConfig;
use super::security::SecurityConfig;
use super::server::ServerConfig;
use super::storage::StorageConfig;
use super::symbols::SymbolCacheConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct for the relay.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub symbols: SymbolCacheConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            symbols: SymbolCacheConfig::default(),
            security: SecurityConfig::default(),
            matching: MatchingConfig::default(),
            registry: RegistryConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}
