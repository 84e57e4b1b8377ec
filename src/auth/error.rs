use thiserror::Error;

/// Authentication and authorization errors raised while admitting a
/// connection or validating a session, mapped to the protocol's HTTP-style
/// status codes.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Identity present on the access-control-list deny side, or not on a
    /// non-empty allow list. Maps to status 403; the connection is closed.
    #[error("forbidden by access control list")]
    Forbidden,
    /// `session_guid` absent from the session cache, or mapped to a
    /// different user than the one asserting it. Maps to status 401.
    #[error("invalid session")]
    InvalidSession,
    /// Operation required an authenticated peer but none was present.
    #[error("unauthenticated")]
    Unauthenticated,
    /// `?apikey=` query parameter missing or not equal to the configured
    /// ServerDB API key.
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
}
