//! # Key-Value Cache
//!
//! The `KvCache` trait is the seam between the weather/indicator layers and
//! whatever TTL store backs them. `MemoryCache` is the in-process version;
//! a Redis implementation lives under `connections` when that feature is on.
//!
//! Values are JSON strings. `get_json` / `set_json` do the (de)serialization
//! so callers work with typed values, and a value that no longer decodes is
//! treated as a miss.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache value encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn KvCache, key: &str) -> Result<Option<T>, CacheError> {
    match cache.get(key).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(cache: &dyn KvCache, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw, ttl).await
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// # In-process TTL cache
///
/// Expired entries are dropped lazily on read and swept on every write.
/// Uses `tokio::time::Instant` so paused-clock tests can advance past a TTL.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|m| m.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("memory cache lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut map = self.lock()?;
        let now = Instant::now();
        match map.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut map = self.lock()?;
        let now = Instant::now();
        map.retain(|_, e| e.expires_at > now);
        map.insert(key.to_string(), Entry { value, expires_at: now + ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut map = self.lock()?;
        let before = map.len();
        map.retain(|k, _| !k.starts_with(prefix));
        Ok(before - map.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache.set("weather:s1", "a".into(), Duration::from_secs(600)).await.unwrap();
        assert_eq!(cache.get("weather:s1").await.unwrap().as_deref(), Some("a"));

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(cache.get("weather:s1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_prefix_only_touches_matching_keys() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("weather:s1", "1".into(), ttl).await.unwrap();
        cache.set("weather:s2", "2".into(), ttl).await.unwrap();
        cache.set("indicators:s1", "3".into(), ttl).await.unwrap();

        assert_eq!(cache.delete_prefix("weather:").await.unwrap(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.delete("indicators:s1").await.unwrap());
        assert!(!cache.delete("indicators:s1").await.unwrap());
    }

    #[tokio::test]
    async fn undecodable_json_is_a_miss() {
        let cache = MemoryCache::new();
        cache.set("k", "not json".into(), Duration::from_secs(60)).await.unwrap();
        let value: Option<Vec<u32>> = get_json(&cache, "k").await.unwrap();
        assert!(value.is_none());

        set_json(&cache, "k", &vec![1u32, 2], Duration::from_secs(60)).await.unwrap();
        let value: Option<Vec<u32>> = get_json(&cache, "k").await.unwrap();
        assert_eq!(value, Some(vec![1, 2]));
    }
}
