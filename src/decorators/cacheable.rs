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
use std::future::Future;
use std::time::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::decorators::{impl_common_options, CacheOptions, Predicate, DEFAULT_TTL};
use crate::{deserialize, serialize, CacheError, CallArgs};

/// Read-through caching of an async call returning `R`.
///
/// ```ignore
/// static GET_USER: Lazy<Cacheable<User>> = Lazy::new(|| {
///     Cacheable::new("users").with_key("get_user").with_ttl(Duration::from_secs(30))
/// });
///
/// let args = CallArgs::new().with("user_id", &user_id)?;
/// let user = GET_USER.invoke(&args, || repo.load_user(user_id)).await?;
/// ```
///
/// Backend failures never reach the caller: a failed read is a miss and a
/// failed write only loses the entry.
pub struct Cacheable<R> {
    options: CacheOptions,
    ttl: Option<Duration>,
    unless: Option<Predicate<R>>,
}

impl<R> Cacheable<R> {
    pub fn new(namespace: &str) -> Self {
        Self {
            options: CacheOptions::new(Some(namespace)),
            ttl: Some(DEFAULT_TTL),
            unless: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Entries stay until evicted.
    pub fn without_expiry(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Results for which `unless` holds are returned but not stored.
    pub fn with_unless(mut self, unless: Predicate<R>) -> Self {
        self.unless = Some(unless);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

impl_common_options!(Cacheable<R>);

impl<R> Cacheable<R>
where
    R: Serialize + DeserializeOwned + 'static,
{
    /// Returns the stored result for `args`, or runs `f` and stores what it returns.
    ///
    /// Errors from `f` are passed through and never cached. The only error
    /// this adds is [`CacheError::NotInitialized`] when no backend is set
    /// here or in `CacheConfig`.
    pub async fn invoke<E, F, Fut>(&self, args: &CallArgs, f: F) -> Result<R, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<CacheError>,
    {
        let backend = self.options.resolve_backend()?;
        let namespace = self.options.label();

        if !self.options.condition_allows(args).await {
            debug!("cacheable({}): condition not met, bypassing cache", namespace);
            return f().await;
        }

        let function = self.options.function_identity(&f);
        let key = self.options.cache_key(&function, args)?;

        match backend.get(&key).await {
            Ok(Some(payload)) => match deserialize::<R>(&payload, self.options.format) {
                Ok(value) => {
                    debug!("cacheable({}): hit {}", namespace, key);
                    return Ok(value);
                }
                Err(e) => warn!("cacheable({}): discarding unreadable entry {}: {}", namespace, key, e),
            },
            Ok(None) => debug!("cacheable({}): miss {}", namespace, key),
            Err(e) => error!("cacheable({}): {} get failed for {}: {}", namespace, backend.name(), key, e),
        }

        let result = f().await?;

        if let Some(unless) = &self.unless {
            if unless.evaluate(&result).await {
                debug!("cacheable({}): unless matched, not storing {}", namespace, key);
                return Ok(result);
            }
        }

        match serialize(&result, self.options.format) {
            Ok(payload) => {
                if let Err(e) = backend.set(&key, payload, self.ttl).await {
                    error!("cacheable({}): {} set failed for {}: {}", namespace, backend.name(), key, e);
                }
            }
            Err(e) => error!("cacheable({}): result for {} not stored: {}", namespace, key, e),
        }

        Ok(result)
    }
}
