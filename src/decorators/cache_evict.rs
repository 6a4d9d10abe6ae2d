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
use std::sync::Arc;
use tracing::{debug, error};

use crate::decorators::{impl_common_options, CacheOptions};
use crate::{CacheBackend, CacheError, CacheResult, CallArgs};

/// Removes cached entries around an async call.
///
/// By default the entry for the call's own arguments is deleted after the
/// call succeeds. `with_all_entries(true)` clears the whole namespace and
/// [`CacheEvict::everything`] clears every key under the backend prefix.
pub struct CacheEvict {
    options: CacheOptions,
    all_entries: bool,
    before_invocation: bool,
}

impl CacheEvict {
    pub fn new(namespace: &str) -> Self {
        Self {
            options: CacheOptions::new(Some(namespace)),
            all_entries: false,
            before_invocation: false,
        }
    }

    /// Clears all namespaces.
    pub fn everything() -> Self {
        Self {
            options: CacheOptions::new(None),
            all_entries: true,
            before_invocation: false,
        }
    }

    pub fn with_all_entries(mut self, all_entries: bool) -> Self {
        self.all_entries = all_entries;
        self
    }

    /// Evicts before the call runs, so eviction happens even if it fails.
    pub fn with_before_invocation(mut self, before_invocation: bool) -> Self {
        self.before_invocation = before_invocation;
        self
    }

    pub fn all_entries(&self) -> bool {
        self.all_entries
    }

    pub fn before_invocation(&self) -> bool {
        self.before_invocation
    }

    async fn evict(&self, backend: &Arc<dyn CacheBackend>, function: &str, args: &CallArgs) -> CacheResult<()> {
        if self.all_entries {
            debug!("cache_evict({}): clearing", self.options.label());
            return backend.clear(self.options.namespace.as_deref()).await;
        }

        let key = self.options.cache_key(function, args)?;
        debug!("cache_evict({}): deleting {}", self.options.label(), key);
        backend.delete(&key).await
    }

    async fn evict_logged(&self, backend: &Arc<dyn CacheBackend>, function: &str, args: &CallArgs) {
        if let Err(e) = self.evict(backend, function, args).await {
            error!("cache_evict({}): {} eviction failed: {}", self.options.label(), backend.name(), e);
        }
    }

    /// Runs `f`, evicting before or after it. Eviction failures are logged
    /// and never change the call's outcome.
    pub async fn invoke<R, E, F, Fut>(&self, args: &CallArgs, f: F) -> Result<R, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<CacheError>,
    {
        let backend = self.options.resolve_backend()?;

        if !self.options.condition_allows(args).await {
            debug!("cache_evict({}): condition not met, skipping eviction", self.options.label());
            return f().await;
        }

        let function = self.options.function_identity(&f);

        if self.before_invocation {
            self.evict_logged(&backend, &function, args).await;
            return f().await;
        }

        let result = f().await?;
        self.evict_logged(&backend, &function, args).await;
        Ok(result)
    }
}

impl_common_options!(CacheEvict);
