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
use serde::Serialize;
use tracing::{debug, error};

use crate::decorators::{impl_common_options, CacheOptions, Predicate, DEFAULT_TTL};
use crate::{serialize, CacheError, CallArgs};

/// Runs the call every time and writes its result under the key a
/// [`Cacheable`](crate::Cacheable) with the same namespace and key would read.
pub struct CachePut<R> {
    options: CacheOptions,
    ttl: Option<Duration>,
    unless: Option<Predicate<R>>,
}

impl<R> CachePut<R> {
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

    pub fn without_expiry(mut self) -> Self {
        self.ttl = None;
        self
    }

    pub fn with_unless(mut self, unless: Predicate<R>) -> Self {
        self.unless = Some(unless);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

impl_common_options!(CachePut<R>);

impl<R> CachePut<R>
where
    R: Serialize + 'static,
{
    pub async fn invoke<E, F, Fut>(&self, args: &CallArgs, f: F) -> Result<R, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<CacheError>,
    {
        let backend = self.options.resolve_backend()?;
        let namespace = self.options.label();
        let function = self.options.function_identity(&f);

        let result = f().await?;

        if !self.options.condition_allows(args).await {
            debug!("cache_put({}): condition not met, not storing", namespace);
            return Ok(result);
        }

        if let Some(unless) = &self.unless {
            if unless.evaluate(&result).await {
                debug!("cache_put({}): unless matched, not storing", namespace);
                return Ok(result);
            }
        }

        let key = match self.options.cache_key(&function, args) {
            Ok(key) => key,
            Err(e) => {
                error!("cache_put({}): could not build key: {}", namespace, e);
                return Ok(result);
            }
        };

        match serialize(&result, self.options.format) {
            Ok(payload) => match backend.set(&key, payload, self.ttl).await {
                Ok(()) => debug!("cache_put({}): stored {}", namespace, key),
                Err(e) => error!("cache_put({}): {} set failed for {}: {}", namespace, backend.name(), key, e),
            },
            Err(e) => error!("cache_put({}): result for {} not stored: {}", namespace, key, e),
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::decorators::test_support::{local, Calls, FailingBackend, HandlerError, User};
    use crate::{CacheBackend, Cacheable};

    fn user_args(user_id: u64) -> CallArgs {
        CallArgs::new().with("user_id", &user_id).unwrap()
    }

    #[tokio::test]
    async fn test_put_refreshes_cacheable_entry() -> Result<(), HandlerError> {
        let backend = local();
        let get_user = Cacheable::<User>::new("users")
            .with_key("get_user")
            .with_backend(backend.clone());
        let refresh_user = CachePut::<User>::new("users")
            .with_key("get_user")
            .with_backend(backend.clone());
        let calls = Calls::default();

        get_user
            .invoke(&user_args(1), || async { Ok::<_, HandlerError>(User::new(1)) })
            .await?;

        for round in 1..=2 {
            let renamed = refresh_user
                .invoke(&user_args(1), || async {
                    calls.hit();
                    Ok::<_, HandlerError>(User { name: format!("renamed-{}", round), ..User::new(1) })
                })
                .await?;
            assert_eq!(renamed.name, format!("renamed-{}", round));
        }
        assert_eq!(calls.count(), 2);

        let cached = get_user
            .invoke(&user_args(1), || async { Ok::<_, HandlerError>(User::new(1)) })
            .await?;
        assert_eq!(cached.name, "renamed-2");
        Ok(())
    }

    #[tokio::test]
    async fn test_condition_and_unless() -> Result<(), HandlerError> {
        let backend = local();
        let refresh_user = CachePut::<User>::new("users")
            .with_condition(Predicate::new(|args: &CallArgs| args.contains("user_id")))
            .with_unless(Predicate::new(|user: &User| !user.active))
            .with_backend(backend.clone());

        refresh_user
            .invoke(&CallArgs::new(), || async { Ok::<_, HandlerError>(User::new(1)) })
            .await?;
        assert!(backend.is_empty().await);

        refresh_user
            .invoke(&user_args(2), || async {
                Ok::<_, HandlerError>(User { active: false, ..User::new(2) })
            })
            .await?;
        assert!(backend.is_empty().await);

        refresh_user
            .invoke(&user_args(3), || async { Ok::<_, HandlerError>(User::new(3)) })
            .await?;
        assert_eq!(backend.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_async_unless() -> Result<(), HandlerError> {
        let backend = local();
        let refresh_user = CachePut::<User>::new("users")
            .with_unless(Predicate::from_async(|user: &User| {
                let inactive = !user.active;
                async move {
                    tokio::task::yield_now().await;
                    inactive
                }
            }))
            .with_backend(backend.clone());

        refresh_user
            .invoke(&user_args(6), || async {
                Ok::<_, HandlerError>(User { active: false, ..User::new(6) })
            })
            .await?;
        assert!(backend.is_empty().await);

        refresh_user
            .invoke(&user_args(7), || async { Ok::<_, HandlerError>(User::new(7)) })
            .await?;
        assert_eq!(backend.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_errors_are_not_stored() {
        let backend = local();
        let refresh_user = CachePut::<User>::new("users").with_backend(backend.clone());

        let result = refresh_user
            .invoke(&user_args(9), || async { Err(HandlerError::NotFound(9)) })
            .await;

        assert!(matches!(result, Err(HandlerError::NotFound(9))));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_backend_failure_is_swallowed() -> Result<(), HandlerError> {
        let refresh_user = CachePut::<User>::new("users")
            .with_ttl(Duration::from_secs(5))
            .with_backend(Arc::new(FailingBackend));

        let user = refresh_user
            .invoke(&user_args(4), || async { Ok::<_, HandlerError>(User::new(4)) })
            .await?;

        assert_eq!(user, User::new(4));
        assert_eq!(refresh_user.ttl(), Some(Duration::from_secs(5)));
        Ok(())
    }

    #[tokio::test]
    async fn test_without_expiry() -> Result<(), HandlerError> {
        let backend = local();
        let refresh_user = CachePut::<User>::new("users")
            .with_name("refresh_user")
            .without_expiry()
            .with_backend(backend.clone());

        refresh_user
            .invoke(&user_args(5), || async { Ok::<_, HandlerError>(User::new(5)) })
            .await?;

        let key = crate::build_cache_key("refresh_user", &user_args(5), "users", None, None, None)?;
        assert!(backend.get(&key).await?.is_some());
        assert!(backend.get_ttl(&key).await.is_none());
        Ok(())
    }
}
