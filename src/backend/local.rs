/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use crate::{CacheBackend, CacheError, CacheResult, CacheStats, DEFAULT_KEY_PREFIX};

struct CachedEntry {
    value: Vec<u8>,
    expiry: Option<Instant>,
    hits: u64,
}

impl CachedEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expiry.map_or(true, |expiry| expiry > now)
    }
}

/// In-process backend: a bounded LRU with per-entry expiry.
///
/// Uses the same `{prefix}:{key}` layout as the Redis backend so namespace
/// clearing behaves identically.
pub struct LocalCacheBackend {
    cache: RwLock<LruCache<String, CachedEntry>>,
    key_prefix: String,
    stats: RwLock<CacheStats>,
}

impl LocalCacheBackend {
    pub fn new(max_size: usize) -> CacheResult<Self> {
        let capacity = NonZeroUsize::new(max_size)
            .ok_or_else(|| CacheError::ConfigError("Local cache size cannot be zero".to_string()))?;

        Ok(Self {
            cache: RwLock::new(LruCache::new(capacity)),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// An empty prefix falls back to the default.
    pub fn with_key_prefix(mut self, key_prefix: &str) -> Self {
        self.key_prefix = if key_prefix.is_empty() {
            DEFAULT_KEY_PREFIX.to_string()
        } else {
            key_prefix.to_string()
        };
        self
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn build_local_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        let cache = self.cache.read().await;
        cache
            .peek(&self.build_local_key(key))
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }

    /// Remaining lifetime; `None` when absent, expired or stored without expiry.
    pub async fn get_ttl(&self, key: &str) -> Option<Duration> {
        let cache = self.cache.read().await;
        let now = Instant::now();

        cache
            .peek(&self.build_local_key(key))
            .and_then(|entry| entry.expiry)
            .filter(|expiry| *expiry > now)
            .map(|expiry| expiry.duration_since(now))
    }

    /// Hit count of a live entry
    pub async fn hits(&self, key: &str) -> Option<u64> {
        let cache = self.cache.read().await;
        cache
            .peek(&self.build_local_key(key))
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.hits)
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = *self.stats.read().await;
        stats.total_entries = self.len().await;
        stats
    }

    /// Drops expired entries, returning how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut cache = self.cache.write().await;
        let now = Instant::now();

        let expired_keys: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            cache.pop(key);
        }

        if !expired_keys.is_empty() {
            self.stats.write().await.record_eviction(expired_keys.len());
        }

        expired_keys.len()
    }
}

#[async_trait]
impl CacheBackend for LocalCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let local_key = self.build_local_key(key);
        let mut cache = self.cache.write().await;

        if let Some(entry) = cache.get_mut(&local_key) {
            if entry.is_live(Instant::now()) {
                entry.hits += 1;
                self.stats.write().await.record_hit();
                return Ok(Some(entry.value.clone()));
            }

            cache.pop(&local_key);
        }

        self.stats.write().await.record_miss();
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let now = Instant::now();
        let entry = CachedEntry {
            value,
            expiry: ttl.map(|ttl| now + ttl),
            hits: 0,
        };

        let mut cache = self.cache.write().await;
        // push returns the displaced entry; same key means replaced, not evicted
        if let Some((evicted_key, _)) = cache.push(self.build_local_key(key), entry) {
            if evicted_key != self.build_local_key(key) {
                self.stats.write().await.record_eviction(1);
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache.write().await.pop(&self.build_local_key(key));
        Ok(())
    }

    async fn clear(&self, namespace: Option<&str>) -> CacheResult<()> {
        let scope = match namespace.filter(|ns| !ns.is_empty()) {
            Some(namespace) => format!("{}:{}:", self.key_prefix, namespace),
            None => format!("{}:", self.key_prefix),
        };

        let mut cache = self.cache.write().await;
        let matching: Vec<String> = cache
            .iter()
            .filter(|(key, _)| key.starts_with(&scope))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matching {
            cache.pop(key);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn backend() -> LocalCacheBackend {
        LocalCacheBackend::new(16).unwrap()
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(matches!(LocalCacheBackend::new(0), Err(CacheError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_set_get_delete() -> CacheResult<()> {
        let cache = backend();

        assert!(cache.get("users:get_user:1").await?.is_none());
        cache.set("users:get_user:1", b"alice".to_vec(), None).await?;
        assert_eq!(cache.get("users:get_user:1").await?, Some(b"alice".to_vec()));
        assert_eq!(cache.hits("users:get_user:1").await, Some(1));

        cache.delete("users:get_user:1").await?;
        assert!(cache.get("users:get_user:1").await?.is_none());

        // deleting a missing key is not an error
        cache.delete("users:get_user:1").await?;

        let stats = cache.stats().await;
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 2);
        assert_eq!(stats.hit_rate(), Some(1.0 / 3.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_expiry() -> CacheResult<()> {
        let cache = backend();

        cache.set("short", b"1".to_vec(), Some(Duration::from_millis(20))).await?;
        cache.set("long", b"2".to_vec(), Some(Duration::from_secs(60))).await?;
        cache.set("forever", b"3".to_vec(), None).await?;

        assert!(cache.contains("short").await);
        assert!(cache.get_ttl("long").await.unwrap() > Duration::from_secs(59));
        assert!(cache.get_ttl("forever").await.is_none());

        sleep(Duration::from_millis(40)).await;

        assert!(!cache.contains("short").await);
        assert_eq!(cache.cleanup().await, 1);
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("short").await?.is_none());
        assert_eq!(cache.get("forever").await?, Some(b"3".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_namespace() -> CacheResult<()> {
        let cache = backend();

        cache.set("users:get_user:1", b"a".to_vec(), None).await?;
        cache.set("users:get_user:2", b"b".to_vec(), None).await?;
        cache.set("users_archive:get:1", b"c".to_vec(), None).await?;
        cache.set("orders:list:1", b"d".to_vec(), None).await?;

        cache.clear(Some("users")).await?;
        assert!(cache.get("users:get_user:1").await?.is_none());
        assert!(cache.get("users:get_user:2").await?.is_none());
        assert!(cache.get("users_archive:get:1").await?.is_some());
        assert!(cache.get("orders:list:1").await?.is_some());

        cache.clear(None).await?;
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_namespace_clears_whole_prefix() -> CacheResult<()> {
        let cache = backend();

        cache.set("users:get_user:1", b"a".to_vec(), None).await?;
        cache.set("orders:list:1", b"b".to_vec(), None).await?;

        cache.clear(Some("")).await?;
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[test]
    fn test_empty_prefix_falls_back_to_default() {
        assert_eq!(backend().with_key_prefix("").key_prefix(), "cacheable");
        assert_eq!(backend().with_key_prefix("svc").key_prefix(), "svc");
    }

    #[tokio::test]
    async fn test_lru_bound() -> CacheResult<()> {
        let cache = LocalCacheBackend::new(2)?;

        cache.set("a", b"1".to_vec(), None).await?;
        cache.set("b", b"2".to_vec(), None).await?;
        cache.set("a", b"1b".to_vec(), None).await?;
        cache.set("c", b"3".to_vec(), None).await?;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("b").await?.is_none());
        assert_eq!(cache.get("a").await?, Some(b"1b".to_vec()));
        assert_eq!(cache.stats().await.total_evictions, 1);
        Ok(())
    }
}
