//! CSPRNG-backed 128-bit identifiers for user sessions and game sessions
//! (spec §3, §8 property 2), and the UDP probe nonce (spec §4.5).

use getrandom::fill as fill_random;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit cryptographically random identifier, rendered as lowercase hex.
///
/// Used for both the login `session_guid` and the game `session_guid`; the
/// two are never compared against each other, only against their own
/// namespace, so sharing a representation is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionGuid([u8; 16]);

#[derive(Debug, Error)]
#[error("failed to obtain secure random bytes")]
pub struct EntropyError;

#[derive(Debug, Error)]
#[error("session guid must be 32 hex characters, got {0:?}")]
pub struct SessionGuidParseError(String);

impl SessionGuid {
    /// Generate a fresh guid from the system CSPRNG.
    ///
    /// Panics only if the OS RNG is unavailable, which indicates a broken
    /// host and is not a condition callers should try to recover from.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        fill_random(&mut bytes).expect("OS CSPRNG unavailable");
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for SessionGuid {
    type Err = SessionGuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SessionGuidParseError(s.to_string()));
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| SessionGuidParseError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for SessionGuid {
    type Error = SessionGuidParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionGuid> for String {
    fn from(value: SessionGuid) -> Self {
        value.to_string()
    }
}

/// An 8-byte nonce for the UDP liveness probe (`ARPING01` magic + nonce,
/// echoed back verbatim by a reachable game server).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeNonce([u8; 8]);

impl ProbeNonce {
    pub fn generate() -> Result<Self, EntropyError> {
        let mut bytes = [0u8; 8];
        fill_random(&mut bytes).map_err(|_| EntropyError)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guids_are_not_trivially_equal() {
        let a = SessionGuid::generate();
        let b = SessionGuid::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_and_parse_round_trip() {
        let guid = SessionGuid::generate();
        let rendered = guid.to_string();
        assert_eq!(rendered.len(), 32);
        let parsed: SessionGuid = rendered.parse().unwrap();
        assert_eq!(guid, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("abcd".parse::<SessionGuid>().is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!("zz".repeat(16).parse::<SessionGuid>().is_err());
    }

    #[test]
    fn probe_nonces_differ_across_calls() {
        let a = ProbeNonce::generate().unwrap();
        let b = ProbeNonce::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
