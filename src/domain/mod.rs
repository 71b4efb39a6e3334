//! Domain model: entities, collaborator traits and core errors

pub mod api_key;
pub mod cache;
pub mod error;
pub mod rate_limit;
pub mod usage;

pub use api_key::{ApiKey, ApiKeyId, ApiKeyStatus, KeyStore};
pub use cache::{CacheKey, CachedResponse, ResponseCache};
pub use error::DomainError;
pub use rate_limit::{RateLimitDecision, RateLimitStore};
pub use usage::{UsageRecord, UsageSink};
