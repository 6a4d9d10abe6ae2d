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
use std::collections::BTreeMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::error;

use crate::{CacheError, CacheResult};

/// Parameters injected by the web framework; they never take part in a key.
pub const DEFAULT_EXCLUDED_PARAMS: &[&str] = &["request", "response", "db", "session", "self"];

pub const DEFAULT_KEY_PREFIX: &str = "cacheable";

/// Named arguments of one handler call, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CallArgs(BTreeMap<String, Value>);

impl CallArgs {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> CacheResult<Self> {
        self.insert(name, serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Structs and maps contribute their fields, sequences become `arg0..argN`,
    /// unit contributes nothing and any other scalar becomes `arg0`.
    pub fn from_serialize<T: Serialize + ?Sized>(args: &T) -> CacheResult<Self> {
        let mut call_args = Self::new();

        match serde_json::to_value(args)? {
            Value::Null => {}
            Value::Object(fields) => {
                for (name, value) in fields {
                    call_args.insert(name, value);
                }
            }
            Value::Array(items) => {
                for (index, value) in items.into_iter().enumerate() {
                    call_args.insert(format!("arg{}", index), value);
                }
            }
            scalar => call_args.insert("arg0", scalar),
        }

        Ok(call_args)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn without<S: AsRef<str>>(&self, excluded: &[S]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(name, _)| !excluded.iter().any(|ex| ex.as_ref() == name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds a cache key for a call.
pub trait KeyBuilder: Send + Sync {
    fn build(&self, function: &str, args: &CallArgs) -> CacheResult<String>;
}

impl<F> KeyBuilder for F
where
    F: Fn(&str, &CallArgs) -> CacheResult<String> + Send + Sync,
{
    fn build(&self, function: &str, args: &CallArgs) -> CacheResult<String> {
        self(function, args)
    }
}

/// `{prefix}:{function}:{sha256 of the arguments}`
#[derive(Debug, Clone)]
pub struct DefaultKeyBuilder {
    prefix: String,
}

impl Default for DefaultKeyBuilder {
    fn default() -> Self {
        Self { prefix: DEFAULT_KEY_PREFIX.to_string() }
    }
}

impl DefaultKeyBuilder {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_string() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl KeyBuilder for DefaultKeyBuilder {
    fn build(&self, function: &str, args: &CallArgs) -> CacheResult<String> {
        Ok(format!("{}:{}:{}", self.prefix, function, hash_args(args)?))
    }
}

// Object keys sorted at every depth, whatever map ordering serde_json was built with.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let sorted: BTreeMap<&String, Value> = fields
                .iter()
                .map(|(name, value)| (name, canonicalize(value)))
                .collect();
            let mut map = Map::new();
            for (name, value) in sorted {
                map.insert(name.clone(), value);
            }
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hex SHA-256 of the compact, key-sorted JSON form of `args`.
pub fn hash_args(args: &CallArgs) -> CacheResult<String> {
    let canonical = canonicalize(&serde_json::to_value(args)?);
    let raw = serde_json::to_string(&canonical)
        .map_err(|e| CacheError::KeyBuilderError(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(raw.as_bytes())))
}

/// Computes the key a decorated call reads, writes or evicts.
///
/// `excluded_params` defaults to [`DEFAULT_EXCLUDED_PARAMS`]. A custom builder
/// gets the filtered arguments and wins when it succeeds; otherwise the key is
/// `{namespace}:{key or function}:{args hash}`.
pub fn build_cache_key(
    function: &str,
    args: &CallArgs,
    namespace: &str,
    key: Option<&str>,
    key_builder: Option<&dyn KeyBuilder>,
    excluded_params: Option<&[String]>,
) -> CacheResult<String> {
    let filtered = match excluded_params {
        Some(excluded) => args.without(excluded),
        None => args.without(DEFAULT_EXCLUDED_PARAMS),
    };

    if let Some(builder) = key_builder {
        match builder.build(function, &filtered) {
            Ok(custom) => return Ok(custom),
            Err(e) => error!("custom key_builder failed for {}; falling back to default: {}", function, e),
        }
    }

    let key_id = key.unwrap_or(function);
    Ok(format!("{}:{}:{}", namespace, key_id, hash_args(&filtered)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct UserQuery {
        user_id: u64,
        include_orders: bool,
        #[serde(skip)]
        _db: (),
    }

    fn key(args: &CallArgs) -> String {
        build_cache_key("demo::get_user", args, "users", Some("get_user"), None, None).unwrap()
    }

    #[test]
    fn test_key_layout() {
        let args = CallArgs::new().with("user_id", &42).unwrap();
        let key = key(&args);

        let parts: Vec<&str> = key.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "users");
        assert_eq!(parts[1], "get_user");
        assert_eq!(parts[2].len(), 64);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_function_identity_when_no_logical_key() {
        let args = CallArgs::new().with("user_id", &42).unwrap();
        let key = build_cache_key("demo::get_user", &args, "users", None, None, None).unwrap();
        assert!(key.starts_with("users:demo::get_user:"));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = CallArgs::new()
            .with("user_id", &1).unwrap()
            .with("filter", &json!({"b": 2, "a": 1})).unwrap();
        let b = CallArgs::new()
            .with("filter", &json!({"a": 1, "b": 2})).unwrap()
            .with("user_id", &1).unwrap();
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_different_values_give_different_keys() {
        let a = CallArgs::new().with("user_id", &1).unwrap();
        let b = CallArgs::new().with("user_id", &2).unwrap();
        let c = CallArgs::new().with("user_id", &"1").unwrap();
        assert_ne!(key(&a), key(&b));
        assert_ne!(key(&a), key(&c));
    }

    #[test]
    fn test_default_exclusions_are_ignored() {
        let plain = CallArgs::new().with("user_id", &1).unwrap();
        let injected = CallArgs::new()
            .with("user_id", &1).unwrap()
            .with("request", &json!({"path": "/users/1"})).unwrap()
            .with("session", &"abc").unwrap()
            .with("db", &"postgres://").unwrap();
        assert_eq!(key(&plain), key(&injected));
    }

    #[test]
    fn test_custom_exclusions_replace_defaults() {
        let excluded = vec!["trace_id".to_string()];
        let a = CallArgs::new()
            .with("user_id", &1).unwrap()
            .with("trace_id", &"t-1").unwrap();
        let b = CallArgs::new()
            .with("user_id", &1).unwrap()
            .with("trace_id", &"t-2").unwrap();
        let key_a = build_cache_key("f", &a, "users", None, None, Some(excluded.as_slice())).unwrap();
        let key_b = build_cache_key("f", &b, "users", None, None, Some(excluded.as_slice())).unwrap();
        assert_eq!(key_a, key_b);

        // "request" is no longer excluded
        let c = a.clone().with("request", &"r").unwrap();
        let key_c = build_cache_key("f", &c, "users", None, None, Some(excluded.as_slice())).unwrap();
        assert_ne!(key_a, key_c);
    }

    #[test]
    fn test_custom_builder_overrides_key() {
        let builder = |function: &str, args: &CallArgs| -> CacheResult<String> {
            assert!(!args.contains("request"));
            Ok(format!("custom:{}:{}", function, args.get_as::<u64>("user_id").unwrap_or_default()))
        };
        let args = CallArgs::new()
            .with("user_id", &9).unwrap()
            .with("request", &"r").unwrap();

        let key = build_cache_key("get_user", &args, "users", Some("ignored"), Some(&builder), None).unwrap();
        assert_eq!(key, "custom:get_user:9");
    }

    #[test]
    fn test_failing_builder_falls_back() {
        let builder = |_: &str, _: &CallArgs| -> CacheResult<String> {
            Err(CacheError::KeyBuilderError("boom".to_string()))
        };
        let args = CallArgs::new().with("user_id", &9).unwrap();

        let fallback = build_cache_key("get_user", &args, "users", Some("get_user"), Some(&builder), None).unwrap();
        assert_eq!(fallback, key(&args));
    }

    #[test]
    fn test_default_key_builder() {
        let args = CallArgs::new().with("user_id", &5).unwrap();
        let built = DefaultKeyBuilder::default().build("demo::get_user", &args).unwrap();
        assert_eq!(built, format!("cacheable:demo::get_user:{}", hash_args(&args).unwrap()));

        let custom = DefaultKeyBuilder::new("svc");
        assert!(custom.build("f", &args).unwrap().starts_with("svc:f:"));
    }

    #[test]
    fn test_from_serialize_shapes() {
        let from_struct = CallArgs::from_serialize(&UserQuery { user_id: 3, include_orders: true, _db: () }).unwrap();
        assert_eq!(from_struct.len(), 2);
        assert_eq!(from_struct.get_as::<u64>("user_id"), Some(3));
        assert_eq!(from_struct.get("include_orders"), Some(&json!(true)));

        let from_tuple = CallArgs::from_serialize(&(1, "two")).unwrap();
        assert_eq!(from_tuple.get("arg0"), Some(&json!(1)));
        assert_eq!(from_tuple.get("arg1"), Some(&json!("two")));

        let from_scalar = CallArgs::from_serialize(&17).unwrap();
        assert_eq!(from_scalar.get("arg0"), Some(&json!(17)));

        assert!(CallArgs::from_serialize(&()).unwrap().is_empty());
    }

    #[test]
    fn test_struct_and_named_pairs_agree() {
        let from_struct = CallArgs::from_serialize(&UserQuery { user_id: 3, include_orders: false, _db: () }).unwrap();
        let named = CallArgs::new()
            .with("include_orders", &false).unwrap()
            .with("user_id", &3).unwrap();
        assert_eq!(hash_args(&from_struct).unwrap(), hash_args(&named).unwrap());
    }
}
