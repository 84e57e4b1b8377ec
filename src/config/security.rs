//! Security and authentication configuration types.

use super::defaults::{
    default_client_auth_mode, default_cors_origins, default_max_connections_per_ip,
    default_max_message_size, default_require_metrics_auth, default_session_disconnected_timeout_secs,
    default_session_ttl_secs,
};
use serde::{Deserialize, Serialize};

/// Security configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Allowed CORS origins for the auxiliary metrics HTTP surface
    /// (comma-separated, or "*" for any).
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Path to the JSON-encoded `AccessControlList` resource applied at
    /// connection authorization (spec §4.7 `OnAuthorizationResult`). `None`
    /// means every identity is authorized.
    #[serde(default)]
    pub acl_path: Option<String>,
    /// Shared API key gating `/serverdb?apikey=...` (spec §6). `None` means
    /// the path accepts any connection.
    #[serde(default)]
    pub server_db_api_key: Option<String>,
    /// Enable authentication for the `/v1/metrics` surface.
    #[serde(default = "default_require_metrics_auth")]
    pub require_metrics_auth: bool,
    /// Authentication token for metrics endpoint (if required).
    #[serde(default)]
    pub metrics_auth_token: Option<String>,
    /// Maximum message body size in bytes, enforced by the codec (spec §4.1).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum connections accepted per remote IP.
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,
    /// TTL for a freshly-issued session token (spec §4.3).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Shortened TTL applied to a session entry when its peer disconnects,
    /// to allow a quick reconnect to reuse it (spec §4.3).
    #[serde(default = "default_session_disconnected_timeout_secs")]
    pub session_disconnected_timeout_secs: u64,
    /// Transport-level security configuration (TLS termination), an
    /// ambient optional HTTPS front-end.
    #[serde(default)]
    pub transport: TransportSecurityConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            acl_path: None,
            server_db_api_key: None,
            require_metrics_auth: default_require_metrics_auth(),
            metrics_auth_token: None,
            max_message_size: default_max_message_size(),
            max_connections_per_ip: default_max_connections_per_ip(),
            session_ttl_secs: default_session_ttl_secs(),
            session_disconnected_timeout_secs: default_session_disconnected_timeout_secs(),
            transport: TransportSecurityConfig::default(),
        }
    }
}

/// Transport-level security configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TransportSecurityConfig {
    #[serde(default)]
    pub tls: TlsServerConfig,
}

/// TLS server configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TlsServerConfig {
    /// Enable HTTPS/TLS termination for the auxiliary metrics listener.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the PEM-encoded certificate chain presented to clients.
    #[serde(default)]
    pub certificate_path: Option<String>,
    /// Path to the PEM-encoded private key corresponding to the certificate chain.
    #[serde(default)]
    pub private_key_path: Option<String>,
    /// Optional path to a PEM bundle of trusted client roots when client auth is enabled.
    #[serde(default)]
    pub client_ca_cert_path: Option<String>,
    /// Whether client certificates are required.
    #[serde(default = "default_client_auth_mode")]
    pub client_auth: ClientAuthMode,
}

impl Default for TlsServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            certificate_path: None,
            private_key_path: None,
            client_ca_cert_path: None,
            client_auth: default_client_auth_mode(),
        }
    }
}

/// Client authentication mode for TLS.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuthMode {
    #[default]
    None,
    Optional,
    Require,
}
