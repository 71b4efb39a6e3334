//! Usage record entity

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Unique identifier for a usage record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageRecordId(String);

impl UsageRecordId {
    /// Create a record ID from a known value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("usage-{}", uuid::Uuid::new_v4()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UsageRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable fact describing one completed (or rejected) request.
///
/// Ownership passes to the telemetry sink immediately after creation;
/// records are never mutated once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    id: UsageRecordId,
    /// API key that made (or attempted) the request
    pub api_key_id: String,
    /// Request path as observed
    pub endpoint: String,
    /// HTTP method
    pub method: String,
    /// Final status code returned to the caller
    pub status_code: u16,
    /// Response latency in milliseconds
    pub latency_ms: u64,
    /// Caller IP, when resolvable
    pub client_ip: Option<String>,
    /// Caller user agent, when present
    pub user_agent: Option<String>,
    /// Unix timestamp (seconds) when the request completed
    pub timestamp: u64,
}

impl UsageRecord {
    /// Create a new usage record for a request outcome
    pub fn new(
        api_key_id: impl Into<String>,
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
    ) -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            id: UsageRecordId::generate(),
            api_key_id: api_key_id.into(),
            endpoint: endpoint.into(),
            method: method.into(),
            status_code,
            latency_ms: 0,
            client_ip: None,
            user_agent: None,
            timestamp: now,
        }
    }

    /// Set the measured latency
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set the caller IP
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    /// Set the caller user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Get the record ID
    pub fn id(&self) -> &UsageRecordId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_record_creation() {
        let record = UsageRecord::new("billing-key", "/v1/reports", "GET", 200)
            .with_latency_ms(42)
            .with_client_ip("203.0.113.9")
            .with_user_agent("curl/8.5");

        assert_eq!(record.api_key_id, "billing-key");
        assert_eq!(record.endpoint, "/v1/reports");
        assert_eq!(record.method, "GET");
        assert_eq!(record.status_code, 200);
        assert_eq!(record.latency_ms, 42);
        assert_eq!(record.client_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(record.user_agent.as_deref(), Some("curl/8.5"));
        assert!(record.timestamp > 0);
    }

    #[test]
    fn test_record_ids_unique() {
        let a = UsageRecord::new("k", "/", "GET", 200);
        let b = UsageRecord::new("k", "/", "GET", 200);
        assert_ne!(a.id(), b.id());
    }
}
