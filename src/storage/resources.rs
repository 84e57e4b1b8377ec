//! Typed shapes for the resources and collections the storage contract
//! carries (spec §3). Kept separate from [`super::StorageBackend`] itself —
//! the backend only ever sees `serde_json::Value`; these types are how
//! services read and write through [`super::Storage`]'s typed helpers.

use crate::xplatform::XPlatformId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `AccountResource` (spec §3): identified by [`XPlatformId`]; owns a
/// client-mutable sub-profile and an authoritative server sub-profile.
/// Invariant: `server.xplatform_id == key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResource {
    pub xplatform_id: XPlatformId,
    pub client_profile: ClientProfile,
    pub server_profile: ServerProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientProfile {
    pub xplatform_id: XPlatformId,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerProfile {
    pub xplatform_id: XPlatformId,
    pub display_name: String,
    pub loadout: Value,
    pub create_time: i64,
    pub update_time: i64,
    pub modify_time: i64,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl ServerProfile {
    pub fn new(xplatform_id: XPlatformId, display_name: impl Into<String>, now: i64) -> Self {
        Self {
            xplatform_id,
            display_name: display_name.into(),
            loadout: Value::Null,
            create_time: now,
            update_time: now,
            modify_time: now,
            fields: HashMap::new(),
        }
    }
}

/// Allow/deny rules applied at connection authorization (spec §3, §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControlList {
    pub allow: Vec<XPlatformId>,
    pub deny: Vec<XPlatformId>,
}

impl AccessControlList {
    /// `true` unless explicitly denied; an empty allow-list means "allow
    /// everyone not denied" (spec §8 property 6 only specifies the deny
    /// path precisely, so allow defaults open).
    pub fn is_authorized(&self, id: &XPlatformId) -> bool {
        if self.deny.contains(id) {
            return false;
        }
        self.allow.is_empty() || self.allow.contains(id)
    }
}

/// A list of chat/arena channels offered to clients at login (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub name: String,
    pub topic_symbol: i64,
}

/// Single-valued, broadcast on successful login (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginSettings {
    pub motd: String,
    pub min_client_version: String,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

/// Keyed by `(type, identifier)` (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResource {
    pub resource_type: String,
    pub identifier: String,
    pub value: Value,
}

impl ConfigResource {
    pub fn collection_key(resource_type: &str, identifier: &str) -> String {
        format!("{resource_type}:{identifier}")
    }
}

/// Keyed by `(type, language)` (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResource {
    pub resource_type: String,
    pub language: String,
    pub body: String,
}

impl DocumentResource {
    pub fn collection_key(resource_type: &str, language: &str) -> String {
        format!("{resource_type}:{language}")
    }
}
