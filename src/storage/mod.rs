//! Storage contract (spec §6): a mapping-shaped abstraction over named,
//! typed resources — single-valued and keyed collections — consumed by
//! every service. Two backends satisfy it: [`filesystem`] (a directory of
//! JSON files) and [`remote`] (an authenticated remote KV service). The
//! core never distinguishes between them past this module.
//!
//! A trait-over-`Box<dyn Trait>` shape, generalized from a room-shaped API
//! to the generic resource/collection shape §6 specifies.

pub mod filesystem;
pub mod remote;
pub mod resources;

use crate::metrics::ServerMetrics;
use crate::retry::{RetryConfig, RetryExecutor, RetryableError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote backend error: {0}")]
    Remote(String),
    #[error("storage operation timed out")]
    Timeout,
}

impl From<RetryableError> for StorageError {
    fn from(value: RetryableError) -> Self {
        StorageError::Remote(value.to_string())
    }
}

/// The backend-agnostic operation set from spec §6. Single-valued resources
/// (`get_resource`/`set_resource`) and keyed collections
/// (`get_item`/`set_item`/`delete_item`) are kept distinct because a
/// resource has exactly one JSON document while a collection has one per
/// key (spec §6 "Persisted state layout").
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// One-time backend setup; called once before any other operation.
    async fn open(&self) -> Result<(), StorageError>;

    async fn get_resource(&self, resource: &str) -> Result<Option<Value>, StorageError>;
    async fn set_resource(&self, resource: &str, value: Value) -> Result<(), StorageError>;
    async fn resource_exists(&self, resource: &str) -> Result<bool, StorageError>;

    async fn get_item(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set_item(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError>;
    async fn delete_item(&self, collection: &str, key: &str) -> Result<bool, StorageError>;
    async fn item_exists(&self, collection: &str, key: &str) -> Result<bool, StorageError>;
}

/// Typed front for a [`StorageBackend`], adding the bounded (3-attempt)
/// retry on transient failures required by spec §7.
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl Storage {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            metrics: None,
        }
    }

    pub fn with_metrics(backend: Arc<dyn StorageBackend>, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            backend,
            metrics: Some(metrics),
        }
    }

    pub async fn open(&self) -> Result<(), StorageError> {
        self.backend.open().await
    }

    fn executor(&self) -> RetryExecutor {
        match &self.metrics {
            Some(metrics) => RetryExecutor::with_metrics(RetryConfig::storage(), metrics.clone()),
            None => RetryExecutor::new(RetryConfig::storage()),
        }
    }

    fn note_operation(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.increment_storage_operations();
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
    ) -> Result<Option<T>, StorageError> {
        self.note_operation();
        let backend = &self.backend;
        let value = self
            .executor()
            .execute("storage.get_resource", || backend.get_resource(resource))
            .await?;
        value.map(serde_json::from_value).transpose().map_err(Into::into)
    }

    pub async fn set<T: Serialize + Sync>(&self, resource: &str, value: &T) -> Result<(), StorageError> {
        self.note_operation();
        let backend = &self.backend;
        let encoded = serde_json::to_value(value)?;
        self.executor()
            .execute("storage.set_resource", || {
                backend.set_resource(resource, encoded.clone())
            })
            .await
    }

    pub async fn resource_exists(&self, resource: &str) -> Result<bool, StorageError> {
        self.note_operation();
        let backend = &self.backend;
        self.executor()
            .execute("storage.resource_exists", || backend.resource_exists(resource))
            .await
    }

    pub async fn get_item<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        self.note_operation();
        let backend = &self.backend;
        let value = self
            .executor()
            .execute("storage.get_item", || backend.get_item(collection, key))
            .await?;
        value.map(serde_json::from_value).transpose().map_err(Into::into)
    }

    pub async fn set_item<T: Serialize + Sync>(
        &self,
        collection: &str,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        self.note_operation();
        let backend = &self.backend;
        let encoded = serde_json::to_value(value)?;
        self.executor()
            .execute("storage.set_item", || {
                backend.set_item(collection, key, encoded.clone())
            })
            .await
    }

    pub async fn delete_item(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        self.note_operation();
        let backend = &self.backend;
        self.executor()
            .execute("storage.delete_item", || backend.delete_item(collection, key))
            .await
    }

    pub async fn item_exists(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        self.note_operation();
        let backend = &self.backend;
        self.executor()
            .execute("storage.item_exists", || backend.item_exists(collection, key))
            .await
    }
}

/// Which backend to construct.
#[derive(Debug, Clone)]
pub enum StorageBackendKind {
    Filesystem {
        root_dir: std::path::PathBuf,
        disable_cache: bool,
    },
    RemoteKv {
        endpoint: url::Url,
        device_login_path: String,
        request_timeout_ms: u64,
    },
}

pub async fn create_backend(
    kind: StorageBackendKind,
) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match kind {
        StorageBackendKind::Filesystem {
            root_dir,
            disable_cache,
        } => {
            let backend = filesystem::FilesystemStorage::new(root_dir, disable_cache);
            Ok(Arc::new(backend))
        }
        StorageBackendKind::RemoteKv {
            endpoint,
            device_login_path,
            request_timeout_ms,
        } => {
            let backend =
                remote::RemoteKvStorage::new(endpoint, device_login_path, request_timeout_ms)?;
            Ok(Arc::new(backend))
        }
    }
}
