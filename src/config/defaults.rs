//! Default value functions for configuration fields.
//!
//! Organized by section, matching the `#[serde(default = ...)]` attributes
//! used throughout `config::types` and its submodules.

use super::logging::LogFormat;
use super::security::ClientAuthMode;

// =============================================================================
// Server
// =============================================================================

pub const fn default_bind_port() -> u16 {
    7777
}

pub fn default_region_id() -> String {
    "default".to_string()
}

pub const fn default_accept_backlog() -> u32 {
    1024
}

pub const fn default_shutdown_grace_period_secs() -> u64 {
    10
}

// =============================================================================
// Storage
// =============================================================================

pub fn default_storage_root_dir() -> String {
    "data".to_string()
}

pub const fn default_disable_cache() -> bool {
    false
}

pub const fn default_request_timeout_ms() -> u64 {
    5_000
}

// =============================================================================
// Symbols
// =============================================================================

pub fn default_symbol_cache_path() -> String {
    "symbols.json".to_string()
}

// =============================================================================
// Security
// =============================================================================

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub const fn default_require_metrics_auth() -> bool {
    true
}

pub const fn default_max_message_size() -> usize {
    1024 * 1024
}

pub const fn default_max_connections_per_ip() -> usize {
    64
}

pub const fn default_client_auth_mode() -> ClientAuthMode {
    ClientAuthMode::None
}

pub const fn default_session_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

pub const fn default_session_disconnected_timeout_secs() -> u64 {
    5 * 60
}

// =============================================================================
// Matching
// =============================================================================

pub const fn default_force_into_any_session() -> bool {
    false
}

pub const fn default_validate_endpoint() -> bool {
    false
}

pub const fn default_validate_timeout_ms() -> u64 {
    3_000
}

pub fn default_udp_probe_bind_addr() -> String {
    "0.0.0.0:0".to_string()
}

// =============================================================================
// Logging
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "relay.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Metrics
// =============================================================================

pub const fn default_metrics_enabled() -> bool {
    true
}

// =============================================================================
// Rate limiting
// =============================================================================

pub const fn default_rate_limit_max_attempts() -> u32 {
    20
}

pub const fn default_rate_limit_time_window_secs() -> u64 {
    60
}

// =============================================================================
// Debug
// =============================================================================

pub const fn default_verbose() -> bool {
    false
}
