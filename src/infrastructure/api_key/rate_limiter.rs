//! Sliding-window rate limiter
//!
//! Node-local, in-memory implementation of `RateLimitStore`. The admission
//! boundary recedes continuously relative to the oldest retained request:
//! a burst that fills the quota decays request-by-request instead of
//! resetting at a clock-aligned boundary.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::rate_limit::{RateLimitDecision, RateLimitStore};

/// Per-key rolling window of admitted-request timestamps
type RateWindow = VecDeque<Instant>;

/// Sliding-window limiter keyed by API key id
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    windows: Arc<RwLock<HashMap<String, RateWindow>>>,
    window: Duration,
    cleanup_interval: Duration,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter with the given window length
    pub fn new(window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            window,
            cleanup_interval: Duration::from_secs(300),
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    /// The configured window length
    pub fn window(&self) -> Duration {
        self.window
    }

    fn wall_clock_at(&self, instant: Instant, now: Instant) -> DateTime<Utc> {
        let until = instant.saturating_duration_since(now);
        Utc::now() + chrono::Duration::from_std(until).unwrap_or_default()
    }

    /// Drop fully-elapsed windows so idle keys do not accumulate state
    async fn maybe_cleanup(&self) {
        let due = {
            let last = self.last_cleanup.read().await;
            last.elapsed() >= self.cleanup_interval
        };

        if !due {
            return;
        }

        *self.last_cleanup.write().await = Instant::now();

        let now = Instant::now();
        let mut windows = self.windows.write().await;

        for window in windows.values_mut() {
            while window
                .front()
                .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
            {
                window.pop_front();
            }
        }

        windows.retain(|_, w| !w.is_empty());
    }
}

#[async_trait]
impl RateLimitStore for SlidingWindowLimiter {
    async fn admit(&self, key_id: &str, quota: u32) -> RateLimitDecision {
        self.maybe_cleanup().await;

        let now = Instant::now();

        // Purge, check and append under one write lock: two concurrent
        // requests for the same key must not both slip past the quota.
        let mut windows = self.windows.write().await;
        let window = windows.entry(key_id.to_string()).or_default();

        while window
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            window.pop_front();
        }

        if window.len() as u32 >= quota {
            let oldest = window.front().copied().unwrap_or(now);

            return RateLimitDecision {
                allowed: false,
                limit: quota,
                remaining: 0,
                reset_at: self.wall_clock_at(oldest + self.window, now),
            };
        }

        window.push_back(now);
        let count = window.len() as u32;
        let oldest = window.front().copied().unwrap_or(now);

        RateLimitDecision {
            allowed: true,
            limit: quota,
            remaining: quota - count,
            reset_at: self.wall_clock_at(oldest + self.window, now),
        }
    }

    async fn reset(&self, key_id: &str) {
        self.windows.write().await.remove(key_id);
    }
}
