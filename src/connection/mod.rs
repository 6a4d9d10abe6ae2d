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
use deadpool::managed::{Metrics, Object, Pool, RecycleError, RecycleResult, Timeouts};
use deadpool::Runtime;
use redis::aio::ConnectionLike as AsyncConnectionLike;
use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::cluster_async::ClusterConnection;
use redis::{Client, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use std::ops::DerefMut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{CacheError, CacheResult, ConnectionMode, RedisBackendConfig};

type AsyncRedisPool = Pool<AsyncSingleRedisConnectionManager>;
type AsyncClusterPool = Pool<AsyncClusterConnectionManager>;

/// A pooled connection, single server or cluster
pub enum AsyncRedisConnection {
    Single(Object<AsyncSingleRedisConnectionManager>),
    Cluster(Object<AsyncClusterConnectionManager>),
}

impl AsyncConnectionLike for AsyncRedisConnection {
    fn req_packed_command<'a>(
        &'a mut self,
        cmd: &'a redis::Cmd,
    ) -> redis::RedisFuture<'a, redis::Value> {
        match self {
            AsyncRedisConnection::Single(conn) => conn.req_packed_command(cmd),
            AsyncRedisConnection::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a redis::Pipeline,
        offset: usize,
        count: usize,
    ) -> redis::RedisFuture<'a, Vec<redis::Value>> {
        match self {
            AsyncRedisConnection::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            AsyncRedisConnection::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            AsyncRedisConnection::Single(conn) => conn.get_db(),
            AsyncRedisConnection::Cluster(conn) => conn.get_db(),
        }
    }
}

impl AsyncRedisConnection {
    pub async fn execute_command<T: redis::FromRedisValue>(&mut self, cmd: &mut redis::Cmd) -> CacheResult<T> {
        match self {
            AsyncRedisConnection::Single(conn) => {
                let conn = conn.deref_mut();
                cmd.query_async(conn).await.map_err(CacheError::RedisError)
            }
            AsyncRedisConnection::Cluster(conn) => {
                let conn = conn.deref_mut();
                cmd.query_async(conn).await.map_err(CacheError::RedisError)
            }
        }
    }
}

async fn ping<C: AsyncConnectionLike + Send>(conn: &mut C) -> RecycleResult<redis::RedisError> {
    match redis::cmd("PING").query_async::<String>(conn).await {
        Ok(pong) if pong == "PONG" => Ok(()),
        Ok(_) => Err(RecycleError::Message("Invalid PONG response".into())),
        Err(e) => Err(RecycleError::Backend(e)),
    }
}

pub struct AsyncSingleRedisConnectionManager {
    client: Client,
}

impl deadpool::managed::Manager for AsyncSingleRedisConnectionManager {
    type Type = redis::aio::MultiplexedConnection;
    type Error = redis::RedisError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn recycle(&self, conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        ping(conn).await
    }
}

pub struct AsyncClusterConnectionManager {
    client: ClusterClient,
}

impl deadpool::managed::Manager for AsyncClusterConnectionManager {
    type Type = ClusterConnection;
    type Error = redis::RedisError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.client.get_async_connection().await
    }

    async fn recycle(&self, conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        ping(conn).await
    }
}

enum AsyncPool {
    Single(AsyncRedisPool),
    Cluster(AsyncClusterPool),
}

/// Pooled access to the Redis deployment described by a [`RedisBackendConfig`]
pub struct AsyncRedisConnectionManager {
    config: RedisBackendConfig,
    pool: AsyncPool,
    is_closed: AtomicBool,
}

impl AsyncRedisConnectionManager {
    pub async fn new(config: &RedisBackendConfig) -> CacheResult<Self> {
        config.validate()?;

        let pool = match &config.connection_mode {
            ConnectionMode::SingleServer { url } => {
                let client = Client::open(Self::build_connection_info(url, config)?)?;
                AsyncPool::Single(Self::build_pool(AsyncSingleRedisConnectionManager { client }, config)?)
            }
            ConnectionMode::Cluster { node_addresses } => {
                let client = Self::create_cluster_client(node_addresses, config)?;
                AsyncPool::Cluster(Self::build_pool(AsyncClusterConnectionManager { client }, config)?)
            }
        };

        debug!("redis connection pool ready (max size {})", config.pool_size);

        Ok(Self {
            config: config.clone(),
            pool,
            is_closed: AtomicBool::new(false),
        })
    }

    fn build_pool<M: deadpool::managed::Manager>(manager: M, config: &RedisBackendConfig) -> CacheResult<Pool<M>> {
        let pool = Pool::builder(manager)
            .max_size(config.pool_size as usize)
            .timeouts(Timeouts {
                wait: Some(config.connection_timeout),
                create: Some(config.connection_timeout),
                recycle: Some(Duration::from_secs(5)),
            })
            .runtime(Runtime::Tokio1)
            .build()?;

        Ok(pool)
    }

    // Fields set on the config override the URL; the rest of the URL is kept.
    fn build_connection_info(url: &str, config: &RedisBackendConfig) -> CacheResult<ConnectionInfo> {
        let conn_info: ConnectionInfo = url
            .into_connection_info()
            .map_err(|e| CacheError::ConfigError(format!("invalid redis url '{}': {}", url, e)))?;

        if config.username.is_none() && config.password.is_none() && config.database.is_none() {
            return Ok(conn_info);
        }

        let mut redis_connection: RedisConnectionInfo = conn_info.redis_settings().clone();
        if let Some(username) = &config.username {
            redis_connection = redis_connection.set_username(username.clone());
        }
        if let Some(password) = &config.password {
            redis_connection = redis_connection.set_password(password.clone());
        }
        if let Some(db) = config.database {
            redis_connection = redis_connection.set_db(db);
        }

        Ok(conn_info.set_redis_settings(redis_connection))
    }

    fn create_cluster_client(node_addresses: &[String], config: &RedisBackendConfig) -> CacheResult<ClusterClient> {
        let mut builder = ClusterClientBuilder::new(node_addresses.to_vec());

        if let Some(username) = &config.username {
            builder = builder.username(username.clone());
        }
        if let Some(password) = &config.password {
            builder = builder.password(password.clone());
        }

        builder = builder.response_timeout(config.response_timeout);
        builder = builder.connection_timeout(config.connection_timeout);

        builder.build().map_err(|e| CacheError::PoolError(e.to_string()))
    }

    pub async fn get_connection(&self) -> CacheResult<AsyncRedisConnection> {
        if self.is_closed() {
            return Err(CacheError::PoolError("Connection manager is closed".to_string()));
        }

        let wait = self.config.connection_timeout;
        match &self.pool {
            AsyncPool::Single(pool) => {
                let conn = timeout(wait, pool.get())
                    .await
                    .map_err(|_| CacheError::PoolError("timeout".to_string()))??;
                Ok(AsyncRedisConnection::Single(conn))
            }
            AsyncPool::Cluster(pool) => {
                let conn = timeout(wait, pool.get())
                    .await
                    .map_err(|_| CacheError::PoolError("timeout".to_string()))??;
                Ok(AsyncRedisConnection::Cluster(conn))
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        match self.get_connection().await {
            Ok(mut conn) => match conn.execute_command::<String>(&mut redis::cmd("PING")).await {
                Ok(pong) => pong == "PONG",
                Err(e) => {
                    warn!("redis health check failed: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("redis health check could not get a connection: {}", e);
                false
            }
        }
    }

    pub fn config(&self) -> &RedisBackendConfig {
        &self.config
    }

    pub fn close(&self) {
        self.is_closed.store(true, Ordering::Release);
        match &self.pool {
            AsyncPool::Single(pool) => pool.close(),
            AsyncPool::Cluster(pool) => pool.close(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::Acquire)
    }
}
