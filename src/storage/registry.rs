//! Store Registry
//!
//! Maps store names to stores, creating each one on first use.
//! Handles sharing a registry and a name share the same entries.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

use super::LocMemStore;

/// Registry of named stores
#[derive(Debug, Clone, Default)]
pub struct CacheRegistry {
    stores: Arc<DashMap<String, Arc<LocMemStore>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the store for `name`, creating it if this is the first use.
    /// Concurrent first uses of one name all receive the same store.
    pub fn store(&self, name: &str) -> Arc<LocMemStore> {
        if let Some(store) = self.stores.get(name) {
            return store.clone();
        }
        self.stores
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(store = name, "Created cache store");
                Arc::new(LocMemStore::new(name))
            })
            .clone()
    }

    /// Look up an existing store without creating it
    pub fn get(&self, name: &str) -> Option<Arc<LocMemStore>> {
        self.stores.get(name).map(|s| s.clone())
    }

    /// Forget a store; handles still holding it keep a detached copy
    pub fn remove(&self, name: &str) -> bool {
        self.stores.remove(name).is_some()
    }

    /// Drop every store
    pub fn reset(&self) {
        self.stores.clear();
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.stores.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_store_created_once() {
        let registry = CacheRegistry::new();
        let a = registry.store("a");
        let again = registry.store("a");
        let b = registry.store("b");

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_first_use() {
        let registry = CacheRegistry::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = registry.clone();
                thread::spawn(move || r.store("shared"))
            })
            .collect();
        let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(stores.iter().all(|s| Arc::ptr_eq(s, &stores[0])));
    }

    #[test]
    fn test_reset() {
        let registry = CacheRegistry::new();
        registry.store("a");
        registry.store("b");
        assert!(registry.get("a").is_some());

        assert!(registry.remove("a"));
        assert!(registry.get("a").is_none());

        registry.reset();
        assert!(registry.is_empty());
    }
}
