//! Configuration for the arena relay server.
//!
//! This module provides layered configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides (`ARENA_RELAY__...`)
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`types`]: root `Config` struct
//! - [`server`]: listener/region configuration
//! - [`storage`]: storage backend selection (spec §6)
//! - [`symbols`]: symbol cache path (spec §3, §9)
//! - [`security`]: ACL/API-key/session-TTL/TLS configuration
//! - [`matching`]: matching engine ranking/fallback configuration (spec §4.6)
//! - [`registry`]: game-server registry configuration (spec §4.5)
//! - [`logging`]: logging configuration
//! - [`metrics`]: metrics surface configuration
//! - [`rate_limit`]: rate limiting configuration
//! - [`debug`]: verbose/debug flags
//! - [`loader`]: configuration loading functions
//! - [`validation`]: configuration validation functions
//! - [`defaults`]: default value functions

pub mod debug;
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod matching;
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod security;
pub mod server;
pub mod storage;
pub mod symbols;
pub mod types;
pub mod validation;

pub use debug::DebugConfig;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use matching::{MatchingConfig, RankingPolicy};

pub use metrics::MetricsConfig;

pub use rate_limit::RateLimitConfig;

pub use registry::RegistryConfig;

pub use security::{ClientAuthMode, SecurityConfig, TlsServerConfig, TransportSecurityConfig};

pub use server::ServerConfig;

pub use storage::StorageConfig;

pub use symbols::SymbolCacheConfig;

pub use types::Config;

pub use loader::load;

pub use validation::{is_production_mode, validate_config_security};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.server.bind_port, 7777);
        assert_eq!(config.server.region_id, "default");
        assert_eq!(config.storage, StorageConfig::Filesystem {
            root_dir: "data".to_string(),
            disable_cache: false,
        });
        assert_eq!(config.symbols.path, "symbols.json");
        assert_eq!(config.matching.ranking_policy, RankingPolicy::PopulationFirst);
        assert!(!config.matching.force_into_any_session);
        assert!(!config.matching.validate_endpoint);
        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "relay.log");
        assert_eq!(config.logging.rotation, "daily");
        assert!(!config.debug.verbose);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.server.bind_port, deserialized.server.bind_port);
        assert_eq!(
            config.matching.ranking_policy,
            deserialized.matching.ranking_policy
        );
        assert_eq!(
            config.rate_limit.max_attempts,
            deserialized.rate_limit.max_attempts
        );
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}
