//! In-memory key store
//!
//! A complete `KeyStore` for tests, demos and single-node deployments.
//! Production deployments point the gateway at a persistent store instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyStatus, KeyStore};
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: Arc<RwLock<HashMap<String, ApiKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        Ok(self.keys.read().await.get(id.as_str()).cloned())
    }

    async fn find_active_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        Ok(self
            .keys
            .read()
            .await
            .values()
            .filter(|k| k.status() == ApiKeyStatus::Active && k.key_prefix() == prefix)
            .cloned()
            .collect())
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;
        let id = api_key.id().as_str().to_string();

        if keys.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "API key with ID '{}' already exists",
                id
            )));
        }

        keys.insert(id, api_key.clone());
        Ok(api_key)
    }

    async fn set_status(&self, id: &ApiKeyId, status: ApiKeyStatus) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;

        match keys.get_mut(id.as_str()) {
            Some(key) => {
                key.set_status(status);
                Ok(())
            }
            None => Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            ))),
        }
    }

    async fn touch_last_used(&self, id: &ApiKeyId) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;

        match keys.get_mut(id.as_str()) {
            Some(key) => {
                key.record_usage();
                Ok(())
            }
            None => Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            ))),
        }
    }
}
