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
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CacheError, CacheResult};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    Json,
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl SerializationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            SerializationFormat::MessagePack => "msgpack",
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializationFormat {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(SerializationFormat::Json),
            "msgpack" | "messagepack" => Ok(SerializationFormat::MessagePack),
            other => Err(CacheError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Turns a JSON-compatible value tree into bytes and back.
///
/// Every format goes through [`serde_json::Value`] first, so a value that
/// round-trips through one codec round-trips through all of them.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> CacheResult<Vec<u8>>;
    fn decode(&self, data: &[u8]) -> CacheResult<Value>;
}

/// Compact UTF-8 JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> CacheResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, data: &[u8]) -> CacheResult<Value> {
        serde_json::from_slice(data).map_err(|e| CacheError::DeserializationError(e.to_string()))
    }
}

/// MessagePack with named struct fields
#[derive(Debug, Default, Clone, Copy)]
pub struct MessagePackCodec;

impl Codec for MessagePackCodec {
    fn encode(&self, value: &Value) -> CacheResult<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode(&self, data: &[u8]) -> CacheResult<Value> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

static DEFAULT_FORMAT: Lazy<RwLock<SerializationFormat>> =
    Lazy::new(|| RwLock::new(SerializationFormat::Json));

static CODECS: Lazy<RwLock<HashMap<SerializationFormat, Arc<dyn Codec>>>> = Lazy::new(|| {
    let mut codecs: HashMap<SerializationFormat, Arc<dyn Codec>> = HashMap::new();
    codecs.insert(SerializationFormat::Json, Arc::new(JsonCodec));
    codecs.insert(SerializationFormat::MessagePack, Arc::new(MessagePackCodec));
    RwLock::new(codecs)
});

pub fn set_default_format(format: SerializationFormat) {
    *DEFAULT_FORMAT.write() = format;
}

pub fn default_format() -> SerializationFormat {
    *DEFAULT_FORMAT.read()
}

/// Replaces the codec used for `format` in this process.
pub fn register_codec(format: SerializationFormat, codec: Arc<dyn Codec>) {
    CODECS.write().insert(format, codec);
}

fn codec_for(format: SerializationFormat) -> CacheResult<Arc<dyn Codec>> {
    CODECS
        .read()
        .get(&format)
        .cloned()
        .ok_or_else(|| CacheError::UnsupportedFormat(format.to_string()))
}

// Inner message only; the outer variant supplies its own prefix.
fn cause(err: CacheError) -> String {
    match err {
        CacheError::SerializationError(msg) | CacheError::DeserializationError(msg) => msg,
        other => other.to_string(),
    }
}

/// Serialize `data` with `format`, or the process default when `None`.
pub fn serialize<T: Serialize + ?Sized>(data: &T, format: Option<SerializationFormat>) -> CacheResult<Vec<u8>> {
    let format = format.unwrap_or_else(default_format);
    let codec = codec_for(format)?;

    serde_json::to_value(data)
        .map_err(CacheError::from)
        .and_then(|value| codec.encode(&value))
        .map_err(|e| CacheError::SerializationError(
            format!("Failed to serialize data with format {}: {}", format, cause(e))
        ))
}

/// Deserialize `data` with `format`, or the process default when `None`.
pub fn deserialize<T: DeserializeOwned>(data: &[u8], format: Option<SerializationFormat>) -> CacheResult<T> {
    let format = format.unwrap_or_else(default_format);
    let codec = codec_for(format)?;

    codec
        .decode(data)
        .and_then(|value| serde_json::from_value(value).map_err(CacheError::from))
        .map_err(|e| CacheError::DeserializationError(
            format!("Failed to deserialize data with format {}: {}", format, cause(e))
        ))
}
