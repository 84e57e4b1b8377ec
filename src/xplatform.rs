//! Cross-platform account identity.
//!
//! A small value type in the newtype-over-identifier style used elsewhere
//! in this codebase (`PlayerId`, `RoomId`): a canonical string rendering
//! used as a storage key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// First-party platform a player authenticated through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Steam,
    Oculus,
    Viveport,
    PlayStation,
    Xbox,
    Standalone,
}

impl Platform {
    /// Short stable code used in the rendered `XPlatformId` key.
    pub fn code(self) -> &'static str {
        match self {
            Self::Steam => "STM",
            Self::Oculus => "OCU",
            Self::Viveport => "VIV",
            Self::PlayStation => "PSN",
            Self::Xbox => "XBL",
            Self::Standalone => "STA",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "STM" => Some(Self::Steam),
            "OCU" => Some(Self::Oculus),
            "VIV" => Some(Self::Viveport),
            "PSN" => Some(Self::PlayStation),
            "XBL" => Some(Self::Xbox),
            "STA" => Some(Self::Standalone),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum XPlatformIdParseError {
    #[error("expected PLATFORM:ACCOUNT_ID, got {0:?}")]
    Malformed(String),
    #[error("unknown platform code {0:?}")]
    UnknownPlatform(String),
    #[error("account id must not be empty")]
    EmptyAccountId,
}

/// A `(platform, account_id)` pair rendered as the single canonical string
/// used as the primary key for `AccountResource`. Two `XPlatformId`s with the
/// same platform and account id always render identically (spec §3 invariant:
/// "the rendered string is canonical").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct XPlatformId {
    platform: Platform,
    account_id: String,
}

impl XPlatformId {
    pub fn new(platform: Platform, account_id: impl Into<String>) -> Result<Self, XPlatformIdParseError> {
        let account_id = account_id.into();
        if account_id.is_empty() {
            return Err(XPlatformIdParseError::EmptyAccountId);
        }
        Ok(Self {
            platform,
            account_id,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The canonical rendered key, e.g. `STM:76561198000000000`.
    pub fn render(&self) -> String {
        format!("{}:{}", self.platform.code(), self.account_id)
    }

    /// A key that is safe to use as a filesystem component (storage backend
    /// sanitizes further, but this keeps path separators out up front).
    pub fn sanitized_key(&self) -> String {
        self.render().replace(['/', '\\'], "_")
    }
}

impl Default for XPlatformId {
    /// A placeholder identity for partially-built structs (e.g.
    /// `ClientProfile::default()`); callers always overwrite it before the
    /// value is persisted.
    fn default() -> Self {
        Self::new(Platform::Standalone, "unset").expect("static literal is a valid account id")
    }
}

impl fmt::Display for XPlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for XPlatformId {
    type Err = XPlatformIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, account_id) = s
            .split_once(':')
            .ok_or_else(|| XPlatformIdParseError::Malformed(s.to_string()))?;
        let platform = Platform::from_code(code)
            .ok_or_else(|| XPlatformIdParseError::UnknownPlatform(code.to_string()))?;
        Self::new(platform, account_id)
    }
}

impl TryFrom<String> for XPlatformId {
    type Error = XPlatformIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<XPlatformId> for String {
    fn from(value: XPlatformId) -> Self {
        value.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_and_parse_round_trip() {
        let id = XPlatformId::new(Platform::Steam, "76561198000000000").unwrap();
        assert_eq!(id.render(), "STM:76561198000000000");
        let parsed: XPlatformId = id.render().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_empty_account_id() {
        assert_eq!(
            XPlatformId::new(Platform::Oculus, ""),
            Err(XPlatformIdParseError::EmptyAccountId)
        );
    }

    #[test]
    fn rejects_unknown_platform_code() {
        assert_eq!(
            "ZZZ:123".parse::<XPlatformId>(),
            Err(XPlatformIdParseError::UnknownPlatform("ZZZ".to_string()))
        );
    }

    #[test]
    fn canonical_for_same_identity() {
        let a = XPlatformId::new(Platform::Steam, "1").unwrap();
        let b = XPlatformId::new(Platform::Steam, "1").unwrap();
        assert_eq!(a.render(), b.render());
    }
}
