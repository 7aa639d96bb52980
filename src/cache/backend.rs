//! Local-Memory Cache Handle
//!
//! Turns caller keys and values into validated store keys and encoded
//! blobs, computes expiry from the handle's clock, and forwards to the
//! shared [`LocMemStore`].

use hashbrown::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::key::{validate_key, CacheKey};
use super::timeout::Timeout;
use crate::clock::{Clock, SystemClock};
use crate::codec::{BinaryCodec, Value, ValueCodec};
use crate::error::{CacheError, CacheResult};
use crate::metrics::Metrics;
use crate::storage::{CacheRegistry, LocMemStore};

/// Handle onto a named in-memory store.
///
/// Cloning is cheap; clones and any other handle built with the same
/// location from the same registry see the same entries.
#[derive(Debug, Clone)]
pub struct LocMemCache {
    store: Arc<LocMemStore>,
    config: Arc<CacheConfig>,
    codec: Arc<dyn ValueCodec>,
    clock: Arc<dyn Clock>,
}

impl LocMemCache {
    /// Create a handle on `config.location` in `registry`
    pub fn new(registry: &CacheRegistry, config: CacheConfig) -> Self {
        Self {
            store: registry.store(&config.location),
            config: Arc::new(config),
            codec: Arc::new(BinaryCodec::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        self.store.metrics()
    }

    /// Number of entries in the underlying store, expired ones included
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Store key for `key`, using the handle's version when the key has none
    pub fn make_key(&self, key: &CacheKey) -> String {
        let version = key.version.unwrap_or(self.config.version);
        self.config
            .key_func
            .apply(&key.key, &self.config.key_prefix, version)
    }

    /// Store key for `key`, rejected if it is not a valid key
    pub fn validate_key(&self, key: &CacheKey) -> CacheResult<String> {
        let made = self.make_key(key);
        validate_key(&made).inspect_err(|e| debug!(error = %e, "Rejected cache key"))?;
        Ok(made)
    }

    /// Store `value` only if `key` is absent or expired
    pub fn add(
        &self,
        key: impl Into<CacheKey>,
        value: impl Into<Value>,
        timeout: Timeout,
    ) -> CacheResult<bool> {
        let start = Instant::now();
        let key = self.validate_key(&key.into())?;
        let blob = self.codec.encode(&value.into())?;
        let now = self.clock.now();
        let expires_at = timeout.expires_at(self.config.default_timeout, now);

        let added = self
            .store
            .add(&key, blob, expires_at, self.config.cull_policy(), now);
        self.metrics().record_operation("add", start.elapsed());
        Ok(added)
    }

    /// Fetch a live value, `None` on a miss
    pub fn get(&self, key: impl Into<CacheKey>) -> CacheResult<Option<Value>> {
        let start = Instant::now();
        let key = self.validate_key(&key.into())?;
        let blob = self.store.get(&key, self.clock.now());
        self.metrics().record_operation("get", start.elapsed());

        blob.map(|b| self.codec.decode(&b)).transpose()
    }

    /// Fetch a live value or return `default`
    pub fn get_or(&self, key: impl Into<CacheKey>, default: impl Into<Value>) -> CacheResult<Value> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Store `value` unconditionally
    pub fn set(
        &self,
        key: impl Into<CacheKey>,
        value: impl Into<Value>,
        timeout: Timeout,
    ) -> CacheResult<()> {
        let start = Instant::now();
        let key = self.validate_key(&key.into())?;
        let blob = self.codec.encode(&value.into())?;
        let expires_at = timeout.expires_at(self.config.default_timeout, self.clock.now());

        self.store
            .set(&key, blob, expires_at, self.config.cull_policy());
        self.metrics().record_operation("set", start.elapsed());
        Ok(())
    }

    /// Give a live entry a new timeout, returns whether it existed
    pub fn touch(&self, key: impl Into<CacheKey>, timeout: Timeout) -> CacheResult<bool> {
        let start = Instant::now();
        let key = self.validate_key(&key.into())?;
        let now = self.clock.now();
        let expires_at = timeout.expires_at(self.config.default_timeout, now);

        let touched = self.store.touch(&key, expires_at, now);
        self.metrics().record_operation("touch", start.elapsed());
        Ok(touched)
    }

    /// Add `delta` to a stored number and return the new value.
    ///
    /// Fails with [`CacheError::KeyNotFound`] when the key is absent or
    /// expired; the key is never created.
    pub fn incr(&self, key: impl Into<CacheKey>, delta: i64) -> CacheResult<Value> {
        let start = Instant::now();
        let key = key.into();
        let store_key = self.validate_key(&key)?;
        let codec = &self.codec;
        let mut result = None;

        let updated = self.store.update(&store_key, self.clock.now(), |raw| {
            let next = match codec.decode(raw)? {
                Value::Int(n) => n
                    .checked_add(delta)
                    .map(Value::Int)
                    .ok_or_else(|| CacheError::Overflow(key.key.clone()))?,
                Value::Float(x) => Value::Float(x + delta as f64),
                _ => return Err(CacheError::NotNumeric(key.key.clone())),
            };
            let blob = codec.encode(&next)?;
            result = Some(next);
            Ok(blob)
        });
        self.metrics().record_operation("incr", start.elapsed());

        match (updated?, result) {
            (Some(_), Some(value)) => Ok(value),
            _ => Err(CacheError::KeyNotFound(key.key)),
        }
    }

    /// Subtract `delta` from a stored number
    pub fn decr(&self, key: impl Into<CacheKey>, delta: i64) -> CacheResult<Value> {
        let key = key.into();
        let negated = delta
            .checked_neg()
            .ok_or_else(|| CacheError::Overflow(key.key.clone()))?;
        self.incr(key, negated)
    }

    /// Whether a live entry exists
    pub fn has_key(&self, key: impl Into<CacheKey>) -> CacheResult<bool> {
        let start = Instant::now();
        let key = self.validate_key(&key.into())?;
        let found = self.store.has_key(&key, self.clock.now());
        self.metrics().record_operation("has_key", start.elapsed());
        Ok(found)
    }

    /// Remove `key`, returns whether anything was removed
    pub fn delete(&self, key: impl Into<CacheKey>) -> CacheResult<bool> {
        let start = Instant::now();
        let key = self.validate_key(&key.into())?;
        let removed = self.store.delete(&key);
        self.metrics().record_operation("delete", start.elapsed());
        Ok(removed)
    }

    /// Remove every entry of the store, for all handles sharing it
    pub fn clear(&self) {
        let start = Instant::now();
        self.store.clear();
        self.metrics().record_operation("clear", start.elapsed());
    }

    /// Fetch several keys; misses are left out of the result
    pub fn get_many<I, K>(&self, keys: I) -> CacheResult<HashMap<String, Value>>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        let mut found = HashMap::new();
        for key in keys {
            let key = key.into();
            if let Some(value) = self.get(key.clone())? {
                found.insert(key.key, value);
            }
        }
        Ok(found)
    }

    /// Store several pairs with one timeout
    pub fn set_many<I, K, V>(&self, pairs: I, timeout: Timeout) -> CacheResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<CacheKey>,
        V: Into<Value>,
    {
        for (key, value) in pairs {
            self.set(key, value, timeout)?;
        }
        Ok(())
    }

    /// Remove several keys, returns how many were present
    pub fn delete_many<I, K>(&self, keys: I) -> CacheResult<usize>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        let mut removed = 0;
        for key in keys {
            if self.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Fetch `key`, storing the result of `default` first if it is missing.
    ///
    /// Returns whatever the cache holds afterwards, which is another
    /// caller's value if a concurrent `add` won.
    pub fn get_or_set<F>(
        &self,
        key: impl Into<CacheKey>,
        default: F,
        timeout: Timeout,
    ) -> CacheResult<Value>
    where
        F: FnOnce() -> Value,
    {
        let key = key.into();
        if let Some(value) = self.get(key.clone())? {
            return Ok(value);
        }
        let value = default();
        self.add(key.clone(), value.clone(), timeout)?;
        Ok(self.get(key)?.unwrap_or(value))
    }

    /// Move a value to `version + delta` and return the new version
    pub fn incr_version(&self, key: impl Into<CacheKey>, delta: i64) -> CacheResult<i64> {
        let key = key.into();
        let version = key.version.unwrap_or(self.config.version);
        let new_version = version
            .checked_add(delta)
            .ok_or_else(|| CacheError::Overflow(key.key.clone()))?;

        let current = CacheKey::versioned(key.key.clone(), version);
        let value = self
            .get(current.clone())?
            .ok_or_else(|| CacheError::KeyNotFound(key.key.clone()))?;

        self.set(
            CacheKey::versioned(key.key, new_version),
            value,
            Timeout::Default,
        )?;
        self.delete(current)?;
        Ok(new_version)
    }

    pub fn decr_version(&self, key: impl Into<CacheKey>, delta: i64) -> CacheResult<i64> {
        let key = key.into();
        let negated = delta
            .checked_neg()
            .ok_or_else(|| CacheError::Overflow(key.key.clone()))?;
        self.incr_version(key, negated)
    }
}
