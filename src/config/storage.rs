//! Storage backend configuration (spec §6).

use super::defaults::{
    default_disable_cache, default_request_timeout_ms, default_storage_root_dir,
};
use crate::storage::StorageBackendKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    Filesystem {
        #[serde(default = "default_storage_root_dir")]
        root_dir: String,
        #[serde(default = "default_disable_cache")]
        disable_cache: bool,
    },
    RemoteKv {
        endpoint: String,
        #[serde(default = "default_device_login_path")]
        device_login_path: String,
        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
}

fn default_device_login_path() -> String {
    "auth/device_login".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            root_dir: default_storage_root_dir(),
            disable_cache: default_disable_cache(),
        }
    }
}

impl StorageConfig {
    pub fn to_backend_kind(&self) -> anyhow::Result<StorageBackendKind> {
        match self {
            Self::Filesystem {
                root_dir,
                disable_cache,
            } => Ok(StorageBackendKind::Filesystem {
                root_dir: root_dir.into(),
                disable_cache: *disable_cache,
            }),
            Self::RemoteKv {
                endpoint,
                device_login_path,
                request_timeout_ms,
            } => Ok(StorageBackendKind::RemoteKv {
                endpoint: url::Url::parse(endpoint)?,
                device_login_path: device_login_path.clone(),
                request_timeout_ms: *request_timeout_ms,
            }),
        }
    }
}
