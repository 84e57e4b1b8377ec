/// Security utilities: TLS termination and CSPRNG-backed identifiers.
pub mod guid;
pub mod tls;

pub use guid::{EntropyError, ProbeNonce, SessionGuid, SessionGuidParseError};

// ClientCertificateFingerprint and CLIENT_FINGERPRINT_HEADER_CANDIDATES are always available
pub use tls::{ClientCertificateFingerprint, CLIENT_FINGERPRINT_HEADER_CANDIDATES};

#[cfg(feature = "tls")]
pub use tls::build_rustls_config;
