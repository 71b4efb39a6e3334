//! API key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_api_key_id, ApiKeyIdError};

/// API key identifier - alphanumeric + hyphens, max 64 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKeyId(String);

impl ApiKeyId {
    /// Create a new ApiKeyId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, ApiKeyIdError> {
        let id = id.into();
        validate_api_key_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApiKeyId {
    type Error = ApiKeyIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiKeyId> for String {
    fn from(id: ApiKeyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    /// Key is active and can be used
    #[default]
    Active,
    /// Key has passed its expiry timestamp
    Expired,
    /// Key has been revoked and cannot be used again
    Revoked,
}

impl ApiKeyStatus {
    /// Check if the key is usable
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// API key entity.
///
/// Owned by the persistent key store; the gateway reads it during
/// authentication and only ever requests status or last-used updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier for the key
    id: ApiKeyId,
    /// Principal (account, team, machine) that owns this key
    owner_id: String,
    /// Public prefix derived from the full credential, used to narrow
    /// candidate lookups. Never sufficient to authenticate on its own.
    key_prefix: String,
    /// One-way digest of the full credential, format `sha256$<base64url>`.
    /// The credential itself is never stored.
    secret_hash: String,
    /// Current lifecycle status
    status: ApiKeyStatus,
    /// Maximum admitted requests per rate-limit window
    rate_limit: u32,
    /// Expiry timestamp (None = never expires)
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    /// Last time the key authenticated successfully
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
}

const DEFAULT_RATE_LIMIT: u32 = 100;

impl ApiKey {
    /// Create a new API key record
    pub fn new(
        id: ApiKeyId,
        owner_id: impl Into<String>,
        key_prefix: impl Into<String>,
        secret_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            owner_id: owner_id.into(),
            key_prefix: key_prefix.into(),
            secret_hash: secret_hash.into(),
            status: ApiKeyStatus::Active,
            rate_limit: DEFAULT_RATE_LIMIT,
            expires_at: None,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the per-window request quota
    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Set the expiry timestamp
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn status(&self) -> ApiKeyStatus {
        self.status
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Status checks

    /// Check if the stored expiry timestamp has passed
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Check if the key is currently valid and usable
    pub fn is_valid(&self) -> bool {
        self.status.is_usable() && !self.is_expired()
    }

    // Mutators

    /// Update the status
    pub fn set_status(&mut self, status: ApiKeyStatus) {
        self.status = status;
        self.touch();
    }

    /// Revoke the key
    pub fn revoke(&mut self) {
        self.status = ApiKeyStatus::Revoked;
        self.touch();
    }

    /// Record a successful authentication
    pub fn record_usage(&mut self) {
        self.last_used_at = Some(Utc::now());
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
