//! Remote KV storage backend (spec §6): authenticated device login followed
//! by per-collection read/write RPCs against a companion key/value service.
//! The wire shape is a thin REST veneer; the core only relies on the
//! `StorageBackend` contract, never on anything remote-specific.

use super::{StorageBackend, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

pub struct RemoteKvStorage {
    client: reqwest::Client,
    endpoint: Url,
    device_login_path: String,
    session_token: RwLock<Option<String>>,
}

#[derive(Debug, Serialize)]
struct DeviceLoginRequest<'a> {
    device_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DeviceLoginResponse {
    session_token: String,
}

#[derive(Debug, Deserialize)]
struct KvGetResponse {
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct KvDeleteResponse {
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct KvExistsResponse {
    exists: bool,
}

impl RemoteKvStorage {
    pub fn new(
        endpoint: Url,
        device_login_path: String,
        request_timeout_ms: u64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            device_login_path,
            session_token: RwLock::new(None),
        })
    }

    fn session_token(&self) -> Option<String> {
        self.session_token.read().expect("lock poisoned").clone()
    }

    fn url(&self, path: &str) -> Result<Url, StorageError> {
        self.endpoint
            .join(path)
            .map_err(|err| StorageError::Remote(err.to_string()))
    }

    async fn authed_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        match self.session_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        let request = self.authed_request(self.client.get(self.url(path)?)).await;
        let response = request.send().await.map_err(remote_err)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: KvGetResponse = response.error_for_status().map_err(remote_err)?.json().await.map_err(remote_err)?;
        Ok(body.value)
    }

    async fn put(&self, path: &str, value: &Value) -> Result<(), StorageError> {
        let request = self
            .authed_request(self.client.put(self.url(path)?).json(value))
            .await;
        request
            .send()
            .await
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let request = self.authed_request(self.client.delete(self.url(path)?)).await;
        let response = request
            .send()
            .await
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?;
        let body: KvDeleteResponse = response.json().await.map_err(remote_err)?;
        Ok(body.deleted)
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let request = self
            .authed_request(self.client.head(self.url(path)?))
            .await;
        let response = request.send().await.map_err(remote_err)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = response.error_for_status().map_err(remote_err)?;
        match response.json::<KvExistsResponse>().await {
            Ok(body) => Ok(body.exists),
            Err(_) => Ok(true),
        }
    }
}

fn remote_err(err: reqwest::Error) -> StorageError {
    StorageError::Remote(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> RemoteKvStorage {
        RemoteKvStorage::new(
            Url::parse("https://relay.example/api/v1/").unwrap(),
            "auth/device_login".to_string(),
            5_000,
        )
        .expect("client builds")
    }

    #[test]
    fn url_joins_relative_resource_path_against_endpoint() {
        let storage = storage();
        let url = storage.url("resources/login_settings").unwrap();
        assert_eq!(
            url.as_str(),
            "https://relay.example/api/v1/resources/login_settings"
        );
    }

    #[test]
    fn url_join_for_collection_item_preserves_key() {
        let storage = storage();
        let url = storage.url("collections/accounts/STM:1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://relay.example/api/v1/collections/accounts/STM:1"
        );
    }

    #[test]
    fn session_token_starts_absent() {
        let storage = storage();
        assert_eq!(storage.session_token(), None);
    }

    #[test]
    fn session_token_is_set_after_manual_assignment() {
        let storage = storage();
        *storage.session_token.write().unwrap() = Some("tok".to_string());
        assert_eq!(storage.session_token(), Some("tok".to_string()));
    }
}

#[async_trait]
impl StorageBackend for RemoteKvStorage {
    async fn open(&self) -> Result<(), StorageError> {
        let device_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .client
            .post(self.url(&self.device_login_path)?)
            .json(&DeviceLoginRequest { device_id: &device_id })
            .send()
            .await
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?
            .json::<DeviceLoginResponse>()
            .await
            .map_err(remote_err)?;

        *self.session_token.write().expect("lock poisoned") = Some(response.session_token);
        Ok(())
    }

    async fn get_resource(&self, resource: &str) -> Result<Option<Value>, StorageError> {
        self.get(&format!("resources/{resource}")).await
    }

    async fn set_resource(&self, resource: &str, value: Value) -> Result<(), StorageError> {
        self.put(&format!("resources/{resource}"), &value).await
    }

    async fn resource_exists(&self, resource: &str) -> Result<bool, StorageError> {
        self.exists(&format!("resources/{resource}")).await
    }

    async fn get_item(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        self.get(&format!("collections/{collection}/{key}")).await
    }

    async fn set_item(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError> {
        self.put(&format!("collections/{collection}/{key}"), &value).await
    }

    async fn delete_item(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        self.delete(&format!("collections/{collection}/{key}")).await
    }

    async fn item_exists(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        self.exists(&format!("collections/{collection}/{key}")).await
    }
}
