use chrono::NaiveTime;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

use crate::config::PricingConfig;
use crate::errors::ServiceError;

/// Well-known parameter keys.
pub const ORDER_CUTOFF_TIME: &str = "pricing.order_cutoff_time";
pub const FALLBACK_ORDER_COUNT_THRESHOLD: &str = "pricing.fallback_order_count_threshold";

/// Runtime-tunable thresholds. Every getter takes a caller-supplied default
/// so an absent key never fails a request.
#[async_trait::async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_string(&self, key: &str, default: &str) -> Result<String, ServiceError>;
    async fn get_i64(&self, key: &str, default: i64) -> Result<i64, ServiceError>;
}

/// Parses an "HH:MM" parameter value, falling back on malformed input.
pub fn parse_cutoff_time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").unwrap_or_else(|_| {
        warn!(value = %raw, "malformed cutoff time parameter, using 23:00");
        NaiveTime::from_hms_opt(23, 0, 0).expect("static time is valid")
    })
}

/// Map-backed store seeded from the compiled-in pricing defaults.
/// Production deployments point this at the shared parameter service; the
/// trait keeps that swap invisible to the services.
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pricing_config(cfg: &PricingConfig) -> Self {
        let store = Self::new();
        store.set(ORDER_CUTOFF_TIME, cfg.order_cutoff_time.clone());
        store.set(
            FALLBACK_ORDER_COUNT_THRESHOLD,
            cfg.fallback_order_count_threshold.to_string(),
        );
        store
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values
            .write()
            .expect("parameter map poisoned")
            .insert(key.to_string(), value.into());
    }
}

#[async_trait::async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get_string(&self, key: &str, default: &str) -> Result<String, ServiceError> {
        Ok(self
            .values
            .read()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    async fn get_i64(&self, key: &str, default: i64) -> Result<i64, ServiceError> {
        let raw = self
            .values
            .read()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?
            .get(key)
            .cloned();
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_key_returns_default() {
        let store = InMemoryParameterStore::new();
        assert_eq!(store.get_i64("missing", 42).await.unwrap(), 42);
        assert_eq!(store.get_string("missing", "x").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn seeded_values_win_over_defaults() {
        let store = InMemoryParameterStore::new();
        store.set(FALLBACK_ORDER_COUNT_THRESHOLD, "5");
        assert_eq!(
            store.get_i64(FALLBACK_ORDER_COUNT_THRESHOLD, 3).await.unwrap(),
            5
        );
    }

    #[test]
    fn malformed_cutoff_time_falls_back() {
        assert_eq!(
            parse_cutoff_time("25:99"),
            NaiveTime::from_hms_opt(23, 0, 0).unwrap()
        );
        assert_eq!(
            parse_cutoff_time("21:30"),
            NaiveTime::from_hms_opt(21, 30, 0).unwrap()
        );
    }
}
