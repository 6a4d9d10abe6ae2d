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
//! Declarative caching for async handlers.
//!
//! Configure a backend once with [`CacheConfig::init`], then wrap handler
//! calls in [`Cacheable`], [`CachePut`] or [`CacheEvict`]. Entries live under
//! `{prefix}:{namespace}:{key}:{sha256 of the arguments}`.

mod config;
mod errors;
mod util;
mod serializer;
mod key_builder;
mod backend;
mod connection;
mod decorators;

pub use config::*;
pub use errors::*;
pub use util::*;
pub use serializer::*;
pub use key_builder::*;
pub use backend::*;
pub use connection::*;
pub use decorators::*;
