//! Filesystem storage backend (spec §6 "Persisted state layout"): one
//! directory per resource type; single-valued resources as `resource.json`;
//! collection items as `{sanitized_key}.json`. Every `set` writes through to
//! disk immediately; reads are served from an optional in-memory cache
//! (`disable_cache` turns it off).

use super::{StorageBackend, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

pub struct FilesystemStorage {
    root_dir: PathBuf,
    disable_cache: bool,
    cache: RwLock<lru::LruCache<String, Value>>,
}

const CACHE_CAPACITY: usize = 2048;

impl FilesystemStorage {
    pub fn new(root_dir: PathBuf, disable_cache: bool) -> Self {
        Self {
            root_dir,
            disable_cache,
            cache: RwLock::new(lru::LruCache::new(
                std::num::NonZeroUsize::new(CACHE_CAPACITY).expect("capacity is nonzero"),
            )),
        }
    }

    fn resource_path(&self, resource: &str) -> PathBuf {
        self.root_dir.join(resource).join("resource.json")
    }

    fn item_path(&self, collection: &str, key: &str) -> PathBuf {
        self.root_dir
            .join(collection)
            .join(format!("{}.json", sanitize_key(key)))
    }

    fn cache_key_resource(resource: &str) -> String {
        format!("resource::{resource}")
    }

    fn cache_key_item(collection: &str, key: &str) -> String {
        format!("item::{collection}::{key}")
    }

    async fn read_json(&self, path: &Path) -> Result<Option<Value>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_json(&self, path: &Path, value: &Value) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    async fn cached_read(
        &self,
        cache_key: String,
        path: PathBuf,
    ) -> Result<Option<Value>, StorageError> {
        if !self.disable_cache {
            let mut cache = self.cache.write().await;
            if let Some(value) = cache.get(&cache_key) {
                return Ok(Some(value.clone()));
            }
        }

        let value = self.read_json(&path).await?;
        if !self.disable_cache {
            if let Some(ref value) = value {
                let mut cache = self.cache.write().await;
                cache.put(cache_key, value.clone());
            }
        }
        Ok(value)
    }

    async fn invalidate(&self, cache_key: &str) {
        if !self.disable_cache {
            let mut cache = self.cache.write().await;
            cache.pop(cache_key);
        }
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c == '/' || c == '\\' || c == '.' { '_' } else { c })
        .collect()
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    async fn open(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root_dir).await?;
        Ok(())
    }

    async fn get_resource(&self, resource: &str) -> Result<Option<Value>, StorageError> {
        let path = self.resource_path(resource);
        self.cached_read(Self::cache_key_resource(resource), path)
            .await
    }

    async fn set_resource(&self, resource: &str, value: Value) -> Result<(), StorageError> {
        let path = self.resource_path(resource);
        self.write_json(&path, &value).await?;
        let cache_key = Self::cache_key_resource(resource);
        if !self.disable_cache {
            let mut cache = self.cache.write().await;
            cache.put(cache_key, value);
        }
        Ok(())
    }

    async fn resource_exists(&self, resource: &str) -> Result<bool, StorageError> {
        Ok(fs::metadata(self.resource_path(resource)).await.is_ok())
    }

    async fn get_item(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.item_path(collection, key);
        self.cached_read(Self::cache_key_item(collection, key), path)
            .await
    }

    async fn set_item(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.item_path(collection, key);
        self.write_json(&path, &value).await?;
        let cache_key = Self::cache_key_item(collection, key);
        if !self.disable_cache {
            let mut cache = self.cache.write().await;
            cache.put(cache_key, value);
        }
        Ok(())
    }

    async fn delete_item(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.item_path(collection, key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                self.invalidate(&Self::cache_key_item(collection, key)).await;
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn item_exists(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        Ok(fs::metadata(self.item_path(collection, key)).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn backend() -> (FilesystemStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FilesystemStorage::new(dir.path().to_path_buf(), false);
        backend.open().await.expect("open");
        (backend, dir)
    }

    #[tokio::test]
    async fn resource_round_trips_through_disk() {
        let (backend, _dir) = backend().await;
        backend
            .set_resource("login_settings", json!({"motd": "hello"}))
            .await
            .unwrap();

        let value = backend.get_resource("login_settings").await.unwrap();
        assert_eq!(value, Some(json!({"motd": "hello"})));
    }

    #[tokio::test]
    async fn missing_resource_is_absent_not_error() {
        let (backend, _dir) = backend().await;
        assert_eq!(backend.get_resource("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn item_delete_removes_from_cache_and_disk() {
        let (backend, _dir) = backend().await;
        backend
            .set_item("accounts", "STM:1", json!({"x": 1}))
            .await
            .unwrap();
        assert!(backend.item_exists("accounts", "STM:1").await.unwrap());

        let deleted = backend.delete_item("accounts", "STM:1").await.unwrap();
        assert!(deleted);
        assert!(!backend.item_exists("accounts", "STM:1").await.unwrap());
        assert_eq!(backend.get_item("accounts", "STM:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn key_with_path_separators_is_sanitized() {
        let (backend, dir) = backend().await;
        backend
            .set_item("accounts", "STM:../../etc", json!({"a": 1}))
            .await
            .unwrap();

        let expected = dir.path().join("accounts").join("STM:_____etc.json");
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn disabled_cache_still_reads_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemStorage::new(dir.path().to_path_buf(), true);
        backend.open().await.unwrap();
        backend
            .set_resource("configs", json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(
            backend.get_resource("configs").await.unwrap(),
            Some(json!({"a": 1}))
        );
    }
}
