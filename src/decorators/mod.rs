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
//! Spring-style cache annotations for async calls.
//!
//! * [`Cacheable`]: read-through; a hit returns the stored value without running the call.
//! * [`CachePut`]: always runs the call and overwrites the stored value.
//! * [`CacheEvict`]: removes one entry, a namespace, or everything under the backend prefix.
//!
//! Each decorator is built once (typically in a `static` or a handler's state)
//! and then wraps every call with `invoke(&args, || async { ... })`. The
//! call's own error type passes through untouched; it only has to absorb
//! [`CacheError`] for the "no backend configured" case.

mod cacheable;
mod cache_put;
mod cache_evict;

pub use cacheable::*;
pub use cache_put::*;
pub use cache_evict::*;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::{build_cache_key, function_name, CacheBackend, CacheConfig, CacheError, CacheResult, CallArgs, KeyBuilder, SerializationFormat};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A gate evaluated before touching the cache, synchronously or not.
pub enum Predicate<T: ?Sized> {
    Sync(Arc<dyn Fn(&T) -> bool + Send + Sync>),
    Async(Arc<dyn Fn(&T) -> BoxFuture<'static, bool> + Send + Sync>),
}

impl<T: ?Sized> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        match self {
            Predicate::Sync(f) => Predicate::Sync(f.clone()),
            Predicate::Async(f) => Predicate::Async(f.clone()),
        }
    }
}

impl<T: ?Sized + 'static> Predicate<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Predicate::Sync(Arc::new(f))
    }

    /// The returned future must own what it needs from `&T`.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Predicate::Async(Arc::new(move |value: &T| f(value).boxed()))
    }

    pub async fn evaluate(&self, value: &T) -> bool {
        match self {
            Predicate::Sync(f) => f(value),
            Predicate::Async(f) => f(value).await,
        }
    }
}

/// Settings shared by all three decorators
#[derive(Clone, Default)]
struct CacheOptions {
    namespace: Option<String>,
    key: Option<String>,
    function: Option<String>,
    key_builder: Option<Arc<dyn KeyBuilder>>,
    condition: Option<Predicate<CallArgs>>,
    excluded_params: Option<Vec<String>>,
    backend: Option<Arc<dyn CacheBackend>>,
    format: Option<SerializationFormat>,
}

impl CacheOptions {
    fn new(namespace: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            ..Default::default()
        }
    }

    fn label(&self) -> &str {
        self.namespace.as_deref().unwrap_or("*")
    }

    fn resolve_backend(&self) -> CacheResult<Arc<dyn CacheBackend>> {
        match &self.backend {
            Some(backend) => Ok(backend.clone()),
            None => CacheConfig::backend(),
        }
    }

    async fn condition_allows(&self, args: &CallArgs) -> bool {
        match &self.condition {
            Some(condition) => condition.evaluate(args).await,
            None => true,
        }
    }

    fn function_identity<F>(&self, f: &F) -> String {
        self.function
            .clone()
            .unwrap_or_else(|| function_name(f).to_string())
    }

    fn cache_key(&self, function: &str, args: &CallArgs) -> CacheResult<String> {
        let namespace = self.namespace.as_deref().ok_or_else(|| {
            CacheError::InvalidOperation("a namespace is required to build an entry key".to_string())
        })?;

        build_cache_key(
            function,
            args,
            namespace,
            self.key.as_deref(),
            self.key_builder.as_deref(),
            self.excluded_params.as_deref(),
        )
    }
}

// Builder methods every decorator shares; all of them live on `self.options`.
macro_rules! impl_common_options {
    ($ty:ident $(<$param:ident>)?) => {
        impl$(<$param>)? $ty$(<$param>)? {
            /// Logical key; replaces the function identity in the entry key.
            pub fn with_key(mut self, key: &str) -> Self {
                self.options.key = Some(key.to_string());
                self
            }

            /// Function identity used when no logical key is set.
            pub fn with_name(mut self, function: &str) -> Self {
                self.options.function = Some(function.to_string());
                self
            }

            pub fn with_key_builder(mut self, key_builder: std::sync::Arc<dyn crate::KeyBuilder>) -> Self {
                self.options.key_builder = Some(key_builder);
                self
            }

            pub fn with_condition(mut self, condition: crate::Predicate<crate::CallArgs>) -> Self {
                self.options.condition = Some(condition);
                self
            }

            /// Replaces the default excluded argument names.
            pub fn with_excluded_params<S: AsRef<str>>(mut self, params: &[S]) -> Self {
                self.options.excluded_params = Some(params.iter().map(|p| p.as_ref().to_string()).collect());
                self
            }

            /// Uses `backend` instead of the one in `CacheConfig`.
            pub fn with_backend(mut self, backend: std::sync::Arc<dyn crate::CacheBackend>) -> Self {
                self.options.backend = Some(backend);
                self
            }

            pub fn with_format(mut self, format: crate::SerializationFormat) -> Self {
                self.options.format = Some(format);
                self
            }

            pub fn namespace(&self) -> Option<&str> {
                self.options.namespace.as_deref()
            }
        }
    };
}

pub(crate) use impl_common_options;
