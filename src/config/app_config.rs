use std::time::Duration;

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Tunables for the gateway pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Sliding rate-limit window length in seconds
    pub window_secs: u64,
    /// Quota assigned to newly issued keys
    pub default_rate_limit: u32,
    /// Response cache entry lifetime in seconds
    pub cache_ttl_secs: u64,
    /// Maximum number of cached responses
    pub cache_capacity: usize,
    /// Responses with a declared length above this are never cached
    pub max_cacheable_body_bytes: usize,
    /// Bound on in-flight usage records before new ones are dropped
    pub usage_queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            default_rate_limit: 100,
            cache_ttl_secs: 60,
            cache_capacity: 1024,
            max_cacheable_body_bytes: 64 * 1024,
            usage_queue_depth: 1024,
        }
    }
}

impl GatewayConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("KEYGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
