//! Injected cache abstraction. Services receive an `Arc<dyn CacheBackend>`
//! instead of reaching for process-wide static state, so multi-instance
//! deployments can be kept consistent through the same invalidation call.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    /// External-invalidation entry point: evicts one key on every instance
    /// that shares the backend.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
}

/// Typed convenience wrappers over the string-valued backend.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheBackend,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn put_json<T: Serialize>(
    cache: &dyn CacheBackend,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw, ttl).await
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// In-memory implementation with per-entry TTL, a capacity cap, and a lazy
/// sweep of expired entries when the cap is reached.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    capacity: usize,
    default_ttl: Option<Duration>,
}

impl InMemoryCache {
    pub fn new(capacity: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            default_ttl,
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(1000, Some(Duration::from_secs(300)))
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let expired = {
            let store = self
                .store
                .read()
                .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
            match store.get(key) {
                Some(entry) if entry.is_expired() => true,
                Some(entry) => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
            }
        };
        if expired {
            let mut store = self
                .store
                .write()
                .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
            store.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        if store.len() >= self.capacity && !store.contains_key(key) {
            store.retain(|_, entry| !entry.is_expired());
        }
        let ttl = ttl.or(self.default_ttl);
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        store.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        store.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = InMemoryCache::default();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = InMemoryCache::new(10, None);
        cache
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn json_helpers_round_trip() {
        let cache = InMemoryCache::default();
        put_json(&cache, "nums", &vec![1u32, 2, 3], None).await.unwrap();
        let got: Option<Vec<u32>> = get_json(&cache, "nums").await.unwrap();
        assert_eq!(got, Some(vec![1, 2, 3]));
    }
}
