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
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tracing::debug;

use crate::{escape_glob, ttl_seconds, AsyncRedisConnectionManager, CacheBackend, CacheResult, RedisBackendConfig, DEFAULT_KEY_PREFIX};

/// Cache backend on top of a pooled Redis connection
pub struct RedisCacheBackend {
    connection_manager: Arc<AsyncRedisConnectionManager>,
    key_prefix: String,
}

impl RedisCacheBackend {
    pub fn new(connection_manager: Arc<AsyncRedisConnectionManager>) -> Self {
        let key_prefix = connection_manager.config().key_prefix.clone();
        Self {
            connection_manager,
            key_prefix,
        }
    }

    pub async fn from_config(config: &RedisBackendConfig) -> CacheResult<Self> {
        let connection_manager = AsyncRedisConnectionManager::new(config).await?;
        Ok(Self::new(Arc::new(connection_manager)))
    }

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

    pub fn connection_manager(&self) -> &Arc<AsyncRedisConnectionManager> {
        &self.connection_manager
    }

    pub fn build_redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    pub fn clear_pattern(&self, namespace: Option<&str>) -> String {
        match namespace.filter(|ns| !ns.is_empty()) {
            Some(namespace) => format!("{}:{}:*", escape_glob(&self.key_prefix), escape_glob(namespace)),
            None => format!("{}:*", escape_glob(&self.key_prefix)),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let redis_key = self.build_redis_key(key);
        let mut conn = self.connection_manager.get_connection().await?;

        conn.execute_command(&mut redis::cmd("GET").arg(&redis_key)).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let redis_key = self.build_redis_key(key);
        let mut conn = self.connection_manager.get_connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&redis_key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_seconds(ttl));
        }

        conn.execute_command::<()>(&mut cmd).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let redis_key = self.build_redis_key(key);
        let mut conn = self.connection_manager.get_connection().await?;

        conn.execute_command::<()>(&mut redis::cmd("DEL").arg(&redis_key)).await
    }

    async fn clear(&self, namespace: Option<&str>) -> CacheResult<()> {
        let pattern = self.clear_pattern(namespace);
        let mut conn = self.connection_manager.get_connection().await?;

        let keys: Vec<Vec<u8>> = conn.execute_command(&mut redis::cmd("KEYS").arg(&pattern)).await?;
        if keys.is_empty() {
            return Ok(());
        }

        debug!("clearing {} keys matching {}", keys.len(), pattern);
        conn.execute_command::<()>(&mut redis::cmd("DEL").arg(&keys)).await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, serialize, CacheError, SerializationFormat};

    async fn backend(prefix: &str) -> RedisCacheBackend {
        let config = RedisBackendConfig::single_server("redis://localhost:6379").with_key_prefix(prefix);
        RedisCacheBackend::from_config(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_keys_and_patterns() {
        let backend = backend("demo").await;

        assert_eq!(backend.key_prefix(), "demo");
        assert_eq!(backend.build_redis_key("users:get_user:abc"), "demo:users:get_user:abc");
        assert_eq!(backend.clear_pattern(Some("users")), "demo:users:*");
        assert_eq!(backend.clear_pattern(None), "demo:*");
        assert_eq!(backend.clear_pattern(Some("")), "demo:*");

        let starred = backend.with_key_prefix("a*b");
        assert_eq!(starred.clear_pattern(Some("ns?")), "a\\*b:ns\\?:*");
    }

    #[tokio::test]
    async fn test_empty_prefix_falls_back_to_default() {
        let backend = backend("demo").await.with_key_prefix("");
        assert_eq!(backend.key_prefix(), "cacheable");
    }

    #[tokio::test]
    #[ignore = "requires a running redis at REDIS_URL"]
    async fn test_round_trip_against_redis() -> CacheResult<()> {
        let config = RedisBackendConfig::from_env()?.with_key_prefix("cacheable-test");
        let backend = RedisCacheBackend::from_config(&config).await?;

        backend.clear(None).await?;

        let payload = serialize(&vec![1, 2, 3], Some(SerializationFormat::Json))?;
        backend.set("users:get_user:1", payload.clone(), Some(Duration::from_secs(30))).await?;
        backend.set("users:get_user:2", payload.clone(), None).await?;
        backend.set("orders:list:1", payload.clone(), Some(Duration::from_millis(10))).await?;

        let stored = backend.get("users:get_user:1").await?.ok_or(CacheError::NotInitialized)?;
        let decoded: Vec<i32> = deserialize(&stored, Some(SerializationFormat::Json))?;
        assert_eq!(decoded, vec![1, 2, 3]);

        backend.delete("users:get_user:1").await?;
        assert!(backend.get("users:get_user:1").await?.is_none());

        backend.clear(Some("users")).await?;
        assert!(backend.get("users:get_user:2").await?.is_none());
        assert!(backend.get("orders:list:1").await?.is_some());

        // a key that is not valid UTF-8 must not break clearing
        let mut raw_key = b"cacheable-test:orders:".to_vec();
        raw_key.extend_from_slice(&[0xff, 0xfe]);
        let mut conn = backend.connection_manager().get_connection().await?;
        conn.execute_command::<()>(&mut redis::cmd("SET").arg(&raw_key).arg("x")).await?;

        backend.clear(None).await?;
        assert!(backend.get("orders:list:1").await?.is_none());
        let remaining: u64 = conn.execute_command(&mut redis::cmd("EXISTS").arg(&raw_key)).await?;
        assert_eq!(remaining, 0);
        Ok(())
    }
}
