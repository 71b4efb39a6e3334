//! Response cache trait and cached payload types

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

use crate::domain::DomainError;

/// Cache key: key identity + method + path as observed.
///
/// No query-string normalization beyond exact match; distinct query strings
/// are distinct entries because they are part of the observed path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub api_key_id: String,
    pub method: String,
    pub path: String,
}

impl CacheKey {
    pub fn new(
        api_key_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            api_key_id: api_key_id.into(),
            method: method.into(),
            path: path.into(),
        }
    }

    /// Render the key as a flat string for stores that want one
    pub fn render(&self) -> String {
        format!("{}:{}:{}", self.api_key_id, self.method, self.path)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Snapshot of a successful idempotent response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// HTTP status of the original response (always 2xx for stored entries)
    pub status: u16,
    /// Content-Type of the original response, if any
    pub content_type: Option<String>,
    /// Body bytes
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, content_type: Option<String>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }
}

/// Short-lived store for successful idempotent read responses.
///
/// Implementations enforce the TTL on `get` (an entry past its TTL is a
/// miss) and a capacity bound on `put` (oldest-insertion-order eviction).
#[async_trait]
pub trait ResponseCache: Send + Sync + Debug {
    /// Look up a fresh entry, or None on miss/expiry
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, DomainError>;

    /// Store a response snapshot, evicting if at capacity
    async fn put(&self, key: &CacheKey, response: CachedResponse) -> Result<(), DomainError>;

    /// Number of live entries
    async fn len(&self) -> Result<usize, DomainError>;
}
