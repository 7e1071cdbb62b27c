use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_CACHE_CAPACITY: usize = 1000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_ORDER_CUTOFF_TIME: &str = "23:00";
const DEFAULT_FALLBACK_ORDER_COUNT_THRESHOLD: i64 = 3;

/// Cache configuration for the injected TTL cache.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of in-memory cache entries
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Default TTL for cache entries in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            default_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Pricing tunables. These are the compiled-in defaults; at runtime each is
/// read through the `ParameterStore` collaborator so operations can retune
/// them without a deploy.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Local time of day after which the order cutoff rolls to "today"
    #[serde(default = "default_order_cutoff_time")]
    pub order_cutoff_time: String,

    /// Shoppers with fewer lifetime orders than this qualify for the
    /// global-fallback society program
    #[serde(default = "default_fallback_order_count_threshold")]
    pub fallback_order_count_threshold: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            order_cutoff_time: default_order_cutoff_time(),
            fallback_order_count_threshold: default_fallback_order_count_threshold(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Outbox drain interval (milliseconds)
    #[serde(default = "default_outbox_poll_interval_ms")]
    pub outbox_poll_interval_ms: u64,

    /// Base URL of the external warehouse/catalog service
    #[serde(default)]
    pub warehouse_base_url: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub pricing: PricingConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_order_cutoff_time() -> String {
    DEFAULT_ORDER_CUTOFF_TIME.to_string()
}

fn default_fallback_order_count_threshold() -> i64 {
    DEFAULT_FALLBACK_ORDER_COUNT_THRESHOLD
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_outbox_poll_interval_ms() -> u64 {
    500
}

impl AppConfig {
    /// Loads configuration by layering `config/default.toml`, an optional
    /// per-environment file, and `APP__`-prefixed environment variables
    /// (double underscore separating nesting levels).
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let mut builder = Config::builder();

        let default_path = Path::new(CONFIG_DIR).join("default.toml");
        if default_path.exists() {
            builder = builder.add_source(File::from(default_path));
        }
        let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
        if env_path.exists() {
            builder = builder.add_source(File::from(env_path));
        }

        builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;

        config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

        info!(environment = %environment, "configuration loaded");
        Ok(config)
    }

    /// Minimal configuration for embedding in tests.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            outbox_poll_interval_ms: default_outbox_poll_interval_ms(),
            warehouse_base_url: None,
            cache: CacheConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = AppConfig::for_database("sqlite::memory:");
        assert_eq!(cfg.db_max_connections, 1);
        assert_eq!(cfg.pricing.order_cutoff_time, "23:00");
        assert_eq!(cfg.pricing.fallback_order_count_threshold, 3);
        assert_eq!(cfg.cache.default_ttl_secs, 300);
    }

    #[test]
    fn test_env_override_applies() {
        env::set_var("APP__DATABASE_URL", "sqlite::memory:?cache=shared");
        env::set_var("APP__PRICING__ORDER_CUTOFF_TIME", "21:30");
        let cfg = AppConfig::load().expect("config should load from env");
        assert_eq!(cfg.database_url, "sqlite::memory:?cache=shared");
        assert_eq!(cfg.pricing.order_cutoff_time, "21:30");
        env::remove_var("APP__DATABASE_URL");
        env::remove_var("APP__PRICING__ORDER_CUTOFF_TIME");
    }
}
