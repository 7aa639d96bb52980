//! Named In-Memory Store
//!
//! Entries and their expiry timestamps behind a single mutex, with a
//! recency index used by culling. Every operation holds the lock from
//! its first read to its last write.

use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, trace};

use crate::error::CacheResult;
use crate::metrics::Metrics;

/// Capacity limits applied by writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullPolicy {
    /// Entry count at which a write culls before inserting
    pub max_entries: usize,
    /// Each cull removes `len / cull_frequency` entries; 0 clears the store
    pub cull_frequency: usize,
}

/// Stored blob with its expiry and recency stamp
#[derive(Debug)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
    stamp: u64,
}

impl Entry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// State guarded by the store lock.
///
/// `recency` maps each entry's stamp back to its key; the smallest stamp
/// is the least recently promoted entry. Both maps always hold the same
/// key set.
#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    recency: BTreeMap<u64, String>,
    next_stamp: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    /// Absent keys count as expired
    fn has_expired(&self, key: &str, now: Instant) -> bool {
        self.entries
            .get(key)
            .map(|e| e.is_expired(now))
            .unwrap_or(true)
    }

    fn promote(&mut self, key: &str) {
        let stamp = self.bump();
        if let Some(entry) = self.entries.get_mut(key) {
            let old = std::mem::replace(&mut entry.stamp, stamp);
            if let Some(k) = self.recency.remove(&old) {
                self.recency.insert(stamp, k);
            }
        }
    }

    fn insert(&mut self, key: String, value: Bytes, expires_at: Option<Instant>) {
        let stamp = self.bump();
        let entry = Entry {
            value,
            expires_at,
            stamp,
        };
        if let Some(old) = self.entries.insert(key.clone(), entry) {
            self.recency.remove(&old.stamp);
        }
        self.recency.insert(stamp, key);
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.recency.remove(&entry.stamp);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        self.recency.clear();
        n
    }

    /// Remove a fraction of the entries, least recently promoted first
    fn cull(&mut self, cull_frequency: usize) -> usize {
        if cull_frequency == 0 {
            return self.clear();
        }
        let count = self.entries.len() / cull_frequency;
        for _ in 0..count {
            if let Some((_, key)) = self.recency.pop_first() {
                self.entries.remove(&key);
            }
        }
        count
    }
}

/// One named store shared by every handle pointing at it
#[derive(Debug)]
pub struct LocMemStore {
    name: String,
    inner: Mutex<Inner>,
    metrics: Metrics,
}

impl LocMemStore {
    /// Create a new empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
            metrics: Metrics::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Insert only if the key is absent or expired, returns whether it was written
    pub fn add(
        &self,
        key: &str,
        value: Bytes,
        expires_at: Option<Instant>,
        policy: CullPolicy,
        now: Instant,
    ) -> bool {
        let mut inner = self.inner.lock();
        if !inner.has_expired(key, now) {
            return false;
        }
        self.write(&mut inner, key, value, expires_at, policy);
        true
    }

    /// Get a live entry and promote it to most recently used.
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str, now: Instant) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        if inner.has_expired(key, now) {
            self.expire(&mut inner, key);
            self.metrics.record_lookup(false);
            return None;
        }
        inner.promote(key);
        self.metrics.record_lookup(true);
        inner.entries.get(key).map(|e| e.value.clone())
    }

    /// Unconditional upsert, culling first when at capacity
    pub fn set(&self, key: &str, value: Bytes, expires_at: Option<Instant>, policy: CullPolicy) {
        let mut inner = self.inner.lock();
        self.write(&mut inner, key, value, expires_at, policy);
    }

    /// Replace the expiry of a live entry, returns whether it existed
    pub fn touch(&self, key: &str, expires_at: Option<Instant>, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.has_expired(key, now) {
            return false;
        }
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Read-modify-write of a live entry under one lock acquisition.
    ///
    /// Returns `Ok(None)` (after removing any expired entry) when the key is
    /// not live. On success the new blob replaces the old one, the entry is
    /// promoted and its expiry is kept.
    pub fn update<F>(&self, key: &str, now: Instant, f: F) -> CacheResult<Option<Bytes>>
    where
        F: FnOnce(&Bytes) -> CacheResult<Bytes>,
    {
        let mut inner = self.inner.lock();
        if inner.has_expired(key, now) {
            self.expire(&mut inner, key);
            return Ok(None);
        }

        let updated = match inner.entries.get_mut(key) {
            Some(entry) => {
                let updated = f(&entry.value)?;
                entry.value = updated.clone();
                updated
            }
            None => return Ok(None),
        };
        inner.promote(key);
        Ok(Some(updated))
    }

    /// Existence check with lazy expiry, no promotion
    pub fn has_key(&self, key: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.has_expired(key, now) {
            self.expire(&mut inner, key);
            return false;
        }
        true
    }

    /// Delete key, returns true if key existed
    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().remove(key)
    }

    /// Remove every entry
    pub fn clear(&self) {
        let removed = self.inner.lock().clear();
        debug!(store = %self.name, removed, "Cleared store");
    }

    /// Get the number of keys (including expired ones not yet seen)
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from most to least recently used (for debugging/testing)
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner.recency.values().rev().cloned().collect()
    }

    fn write(
        &self,
        inner: &mut Inner,
        key: &str,
        value: Bytes,
        expires_at: Option<Instant>,
        policy: CullPolicy,
    ) {
        if inner.entries.len() >= policy.max_entries {
            let removed = inner.cull(policy.cull_frequency);
            self.metrics.record_cull(removed);
            debug!(
                store = %self.name,
                removed,
                remaining = inner.entries.len(),
                "Culled store"
            );
        }
        inner.insert(key.to_string(), value, expires_at);
    }

    fn expire(&self, inner: &mut Inner, key: &str) {
        if inner.remove(key) {
            self.metrics.record_expired();
            trace!(store = %self.name, key, "Removed expired entry");
        }
    }
}
