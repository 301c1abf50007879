//! In-process cache for hot read paths
//!
//! Wraps a moka future cache. Values are stored as JSON so any serde type can
//! be cached under a string key. Services invalidate by key prefix after writes.

use anyhow::{Context, Result};
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

/// Cache key of the full tag list
pub const TAG_LIST_KEY: &str = "tags:all";
/// Prefix of every cached tag entry
pub const TAG_PREFIX: &str = "tags:";
/// Prefix of cached home page listings
pub const HOME_PREFIX: &str = "home:";

/// Serialized cache value
#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Moka-backed cache with a single time-to-live for all entries
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();

        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let entry = CacheEntry::new(value)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    pub async fn delete(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Invalidate every key starting with `prefix`
    pub async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let prefix = prefix.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map_err(|e| anyhow::anyhow!("Failed to invalidate cache entries: {}", e))?;
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

/// Build the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::new(
        config.max_entries,
        Duration::from_secs(config.ttl_seconds),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = create_cache(&CacheConfig::default());

        cache.set("tags:all", &vec!["Politics", "Sport"]).await.unwrap();
        let tags: Option<Vec<String>> = cache.get("tags:all").await.unwrap();
        assert_eq!(tags, Some(vec!["Politics".to_string(), "Sport".to_string()]));

        cache.delete("tags:all").await;
        assert!(cache.get::<Vec<String>>("tags:all").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        cache.set("home:1", &1).await.unwrap();
        cache.set("home:2", &2).await.unwrap();
        cache.set("tags:all", &3).await.unwrap();

        cache.delete_prefix(HOME_PREFIX).await.unwrap();
        assert!(cache.get::<i32>("home:1").await.unwrap().is_none());
        assert!(cache.get::<i32>("home:2").await.unwrap().is_none());
        assert_eq!(cache.get::<i32>("tags:all").await.unwrap(), Some(3));

        cache.clear().await;
        assert!(cache.get::<i32>("tags:all").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new(100, Duration::from_millis(10));
        cache.set("home:1", &"cached").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get::<String>("home:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_error() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        cache.set("tags:all", &"text").await.unwrap();
        assert!(cache.get::<Vec<i64>>("tags:all").await.is_err());
    }
}
