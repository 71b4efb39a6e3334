//! Rate limiting abstraction
//!
//! The limiter sits behind a trait so the node-local in-memory
//! implementation and a future shared-store implementation are
//! interchangeable without touching the gateway pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Outcome of an admission check
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Configured quota for the window
    pub limit: u32,
    /// Remaining admissions in the current window
    pub remaining: u32,
    /// When the oldest retained window entry falls out of the window.
    /// For an admitted request on a fresh window this is one full window
    /// from now.
    pub reset_at: DateTime<Utc>,
}

/// Admission control store, keyed by API key identity.
///
/// Each `admit` call is a single atomic critical section per key: purge,
/// check and append must not interleave with a concurrent call for the
/// same key.
#[async_trait]
pub trait RateLimitStore: Send + Sync + Debug {
    /// Decide admit/reject for one request under the given quota
    async fn admit(&self, key_id: &str, quota: u32) -> RateLimitDecision;

    /// Drop all window state for a key
    async fn reset(&self, key_id: &str);
}
