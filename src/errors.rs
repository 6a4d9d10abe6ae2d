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

use redis::RedisError;
use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("CacheConfig is not initialized. Call CacheConfig::init(...) at startup.")]
    NotInitialized,

    #[error("CacheConfig is already initialized.")]
    AlreadyInitialized,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Redis error: {0}")]
    RedisError(#[from] RedisError),

    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Unsupported serialization format: {0}")]
    UnsupportedFormat(String),

    #[error("Key builder error: {0}")]
    KeyBuilderError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<deadpool::managed::PoolError<RedisError>> for CacheError {
    fn from(err: deadpool::managed::PoolError<RedisError>) -> Self {
        CacheError::PoolError(err.to_string())
    }
}

impl From<deadpool::managed::BuildError> for CacheError {
    fn from(err: deadpool::managed::BuildError) -> Self {
        CacheError::PoolError(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CacheError::DeserializationError(err.to_string())
    }
}
