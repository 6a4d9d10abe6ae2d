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
mod local;
mod redis;

pub use self::local::*;
pub use self::redis::*;

use std::time::Duration;
use async_trait::async_trait;

use crate::CacheResult;

/// Storage behind the cache decorators.
///
/// Values arrive already serialized. Keys passed in are logical keys
/// (`{namespace}:{key}:{hash}`); a backend may prefix them, but `clear` must
/// honour the same namespace layout.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// `None` when the key is absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// `ttl` of `None` stores without expiry
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Removes every key of `namespace`, or every key the backend owns when
    /// `None` or empty.
    async fn clear(&self, namespace: Option<&str>) -> CacheResult<()>;

    fn name(&self) -> &'static str;
}

/// Counters kept by [`LocalCacheBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_evictions: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn record_hit(&mut self) {
        self.total_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.total_misses += 1;
    }

    pub fn record_eviction(&mut self, count: usize) {
        self.total_evictions += count as u64;
    }

    pub fn lookups(&self) -> u64 {
        self.total_hits + self.total_misses
    }

    /// Share of lookups that hit; `None` before the first lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        match self.lookups() {
            0 => None,
            lookups => Some(self.total_hits as f64 / lookups as f64),
        }
    }
}
