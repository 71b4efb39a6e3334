//! Key store trait
//!
//! The persistent key store is an external collaborator; the gateway consumes
//! this narrow interface and never owns key records.

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{ApiKey, ApiKeyId, ApiKeyStatus};
use crate::domain::DomainError;

/// Lookup and update operations the gateway needs from the key store
#[async_trait]
pub trait KeyStore: Send + Sync + Debug {
    /// Get a key by its ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Fetch all ACTIVE keys whose stored prefix equals the given prefix.
    ///
    /// Prefixes are shorter than full credentials, so the candidate set is
    /// not necessarily a singleton. Callers verify each candidate against
    /// the secret hash.
    async fn find_active_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError>;

    /// Store a new key record
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Request a status transition. Idempotent: transitioning to the current
    /// status is harmless.
    async fn set_status(&self, id: &ApiKeyId, status: ApiKeyStatus) -> Result<(), DomainError>;

    /// Update the last-used timestamp to now
    async fn touch_last_used(&self, id: &ApiKeyId) -> Result<(), DomainError>;
}
