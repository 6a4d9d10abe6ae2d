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
//! Run with a local Redis:
//!   REDIS_URL=redis://localhost:6379/0 cargo run --example users_service
//! Without REDIS_URL the in-process backend is used.
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;
use cacheable::{
    CacheBackend, CacheConfig, CacheEvict, CachePut, CacheResult, Cacheable, CallArgs, LocalCacheBackend,
    RedisBackendConfig, RedisCacheBackend,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    user_id: u64,
    name: String,
    refreshed: bool,
    ts: u128,
}

impl User {
    fn load(user_id: u64, refreshed: bool) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self { user_id, name: format!("user-{}", user_id), refreshed, ts }
    }
}

static GET_USER: Lazy<Cacheable<User>> = Lazy::new(|| {
    Cacheable::new("users").with_key("get_user").with_ttl(Duration::from_secs(30))
});

static REFRESH_USER: Lazy<CachePut<User>> = Lazy::new(|| {
    CachePut::new("users").with_key("get_user").with_ttl(Duration::from_secs(30))
});

static EVICT_USER: Lazy<CacheEvict> = Lazy::new(|| CacheEvict::new("users").with_key("get_user"));

static EVICT_ALL_USERS: Lazy<CacheEvict> = Lazy::new(|| CacheEvict::new("users").with_all_entries(true));

fn user_args(user_id: u64) -> CacheResult<CallArgs> {
    CallArgs::new().with("user_id", &user_id)
}

async fn get_user(user_id: u64) -> CacheResult<User> {
    GET_USER
        .invoke(&user_args(user_id)?, || async move {
            // slow source
            tokio::time::sleep(Duration::from_millis(500)).await;
            info!("fetching user {} from source", user_id);
            Ok(User::load(user_id, false))
        })
        .await
}

async fn refresh_user(user_id: u64) -> CacheResult<User> {
    REFRESH_USER
        .invoke(&user_args(user_id)?, || async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            info!("refreshing user {}", user_id);
            Ok(User::load(user_id, true))
        })
        .await
}

async fn evict_user(user_id: u64) -> CacheResult<()> {
    EVICT_USER
        .invoke(&user_args(user_id)?, || async move {
            info!("evicting cache for user {}", user_id);
            Ok(())
        })
        .await
}

async fn evict_all_users() -> CacheResult<()> {
    EVICT_ALL_USERS
        .invoke(&CallArgs::new(), || async {
            info!("evicting cache for all users");
            Ok(())
        })
        .await
}

async fn timed(label: &str, user_id: u64) -> CacheResult<()> {
    let start = Instant::now();
    let user = get_user(user_id).await?;
    info!("{}: {:?} in {:?}", label, user, start.elapsed());
    Ok(())
}

#[tokio::main]
async fn main() -> CacheResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cacheable=debug")))
        .init();

    let backend: Arc<dyn CacheBackend> = match std::env::var("REDIS_URL") {
        Ok(_) => {
            let config = RedisBackendConfig::from_env()?.with_key_prefix("demo");
            Arc::new(RedisCacheBackend::from_config(&config).await?)
        }
        Err(_) => Arc::new(LocalCacheBackend::new(1000)?.with_key_prefix("demo")),
    };
    CacheConfig::init(backend, None)?;

    timed("first call (miss)", 1).await?;
    timed("second call (hit)", 1).await?;

    let refreshed = refresh_user(1).await?;
    info!("refreshed: {:?}", refreshed);
    timed("after refresh (hit, refreshed)", 1).await?;

    evict_user(1).await?;
    timed("after evict (miss)", 1).await?;

    timed("other user (miss)", 2).await?;
    evict_all_users().await?;
    timed("after evict all (miss)", 2).await?;

    Ok(())
}
