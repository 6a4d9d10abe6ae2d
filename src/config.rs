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
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{set_default_format, CacheBackend, CacheError, CacheResult, SerializationFormat, DEFAULT_KEY_PREFIX};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectionMode {
    SingleServer {
        url: String,
    },
    Cluster {
        node_addresses: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisBackendConfig {
    /// Connection mode
    pub connection_mode: ConnectionMode,
    /// Connection pool size
    pub pool_size: u32,
    /// Connection timeout time
    pub connection_timeout: Duration,
    /// Response timeout time (cluster mode)
    pub response_timeout: Duration,
    /// User name
    pub username: Option<String>,
    /// PASSWORD
    pub password: Option<String>,
    /// Database number
    pub database: Option<i64>,
    /// Prefix of every key written by the backend
    pub key_prefix: String,
}

impl Default for RedisBackendConfig {
    fn default() -> Self {
        Self {
            connection_mode: ConnectionMode::SingleServer { url: DEFAULT_REDIS_URL.to_string() },
            pool_size: 10,
            connection_timeout: Duration::from_secs(3),
            response_timeout: Duration::from_secs(3),
            username: None,
            password: None,
            database: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl RedisBackendConfig {
    pub fn single_server(url: &str) -> Self {
        Self {
            connection_mode: ConnectionMode::SingleServer { url: url.to_string() },
            ..Default::default()
        }
    }

    pub fn cluster(node_addresses: Vec<String>) -> Self {
        Self {
            connection_mode: ConnectionMode::Cluster { node_addresses },
            ..Default::default()
        }
    }

    /// `REDIS_URL`, `REDIS_PASSWORD`, `REDIS_POOL_SIZE` and `CACHE_KEY_PREFIX`
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
        let mut config = Self::single_server(&url);

        if let Some(password) = lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()) {
            config = config.with_password(&password);
        }

        if let Some(pool_size) = lookup("REDIS_POOL_SIZE") {
            let size = pool_size.trim().parse::<u32>().map_err(|e| {
                CacheError::ConfigError(format!("REDIS_POOL_SIZE '{}' is not a number: {}", pool_size, e))
            })?;
            config = config.with_pool_size(size);
        }

        if let Some(prefix) = lookup("CACHE_KEY_PREFIX") {
            config = config.with_key_prefix(&prefix);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_database(mut self, db: i64) -> Self {
        self.database = Some(db);
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.pool_size == 0 {
            return Err(CacheError::ConfigError("Pool size cannot be zero".to_string()));
        }

        if self.key_prefix.is_empty() {
            return Err(CacheError::ConfigError("Key prefix cannot be empty".to_string()));
        }

        match &self.connection_mode {
            ConnectionMode::SingleServer { url } => {
                if url.is_empty() {
                    return Err(CacheError::ConfigError(
                        "Single server mode requires a URL".to_string()
                    ));
                }
            }
            ConnectionMode::Cluster { node_addresses } => {
                if node_addresses.is_empty() {
                    return Err(CacheError::ConfigError(
                        "Cluster mode requires at least one node address".to_string()
                    ));
                }
                if self.database.is_some_and(|db| db != 0) {
                    return Err(CacheError::ConfigError(
                        "Cluster mode only supports database 0".to_string()
                    ));
                }
            }
        }

        Ok(())
    }
}

static ACTIVE_BACKEND: Lazy<RwLock<Option<Arc<dyn CacheBackend>>>> = Lazy::new(|| RwLock::new(None));

/// Process-wide cache configuration.
///
/// Holds the backend every decorator falls back to when it was not given one
/// explicitly. Call [`CacheConfig::init`] once at application startup.
pub struct CacheConfig;

impl CacheConfig {
    pub fn init(
        backend: Arc<dyn CacheBackend>,
        default_serialization_format: Option<SerializationFormat>,
    ) -> CacheResult<()> {
        let mut active = ACTIVE_BACKEND.write();
        if active.is_some() {
            return Err(CacheError::AlreadyInitialized);
        }

        if let Some(format) = default_serialization_format {
            set_default_format(format);
        }

        info!("cache configuration initialized with {} backend", backend.name());
        *active = Some(backend);
        Ok(())
    }

    pub fn is_initialized() -> bool {
        ACTIVE_BACKEND.read().is_some()
    }

    pub fn backend() -> CacheResult<Arc<dyn CacheBackend>> {
        ACTIVE_BACKEND.read().clone().ok_or(CacheError::NotInitialized)
    }

    /// Drops the active backend. Meant for tests.
    pub fn reset() {
        ACTIVE_BACKEND.write().take();
    }
}
