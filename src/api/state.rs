//! Application state for shared gateway collaborators

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::{RateLimitStore, ResponseCache};
use crate::infrastructure::api_key::KeyValidator;
use crate::infrastructure::usage::UsageRecorder;

/// Shared state injected into the gateway pipeline.
///
/// Collaborators sit behind trait objects so alternative stores (a shared
/// limiter, an external cache) can replace the node-local implementations
/// without touching the pipeline.
#[derive(Clone)]
pub struct AppState {
    pub validator: KeyValidator,
    pub rate_limiter: Arc<dyn RateLimitStore>,
    pub cache: Arc<dyn ResponseCache>,
    pub usage: UsageRecorder,
    pub gateway: GatewayConfig,
}

impl AppState {
    pub fn new(
        validator: KeyValidator,
        rate_limiter: Arc<dyn RateLimitStore>,
        cache: Arc<dyn ResponseCache>,
        usage: UsageRecorder,
        gateway: GatewayConfig,
    ) -> Self {
        Self {
            validator,
            rate_limiter,
            cache,
            usage,
            gateway,
        }
    }
}
