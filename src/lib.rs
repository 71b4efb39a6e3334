//! Keygate - API key gateway middleware
//!
//! Wraps an inner axum router with authentication against opaque API keys,
//! per-key sliding-window rate limiting, short-lived response caching for
//! idempotent reads, and fire-and-forget usage telemetry.

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::AppState;
use domain::{KeyStore, UsageSink};
use infrastructure::api_key::{KeyValidator, SlidingWindowLimiter};
use infrastructure::cache::{InMemoryResponseCache, ResponseCacheConfig};
use infrastructure::usage::UsageRecorder;

/// Wire up the gateway collaborators around the given key store and usage
/// sink. Must run inside a tokio runtime; the usage recorder spawns its
/// drain task here.
pub fn create_app_state(
    store: Arc<dyn KeyStore>,
    sink: Arc<dyn UsageSink>,
    config: &AppConfig,
) -> AppState {
    let gateway = config.gateway.clone();

    AppState::new(
        KeyValidator::new(store),
        Arc::new(SlidingWindowLimiter::new(gateway.window())),
        Arc::new(InMemoryResponseCache::new(ResponseCacheConfig {
            ttl: gateway.cache_ttl(),
            capacity: gateway.cache_capacity,
        })),
        UsageRecorder::spawn(sink, gateway.usage_queue_depth),
        gateway,
    )
}
