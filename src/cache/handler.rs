//! Cache Aliases
//!
//! Lazily builds one [`LocMemCache`] per configured alias.

use dashmap::DashMap;
use std::sync::Arc;

use super::backend::LocMemCache;
use super::config::{CacheSettings, DEFAULT_CACHE_ALIAS};
use crate::error::{CacheError, CacheResult};
use crate::storage::CacheRegistry;

/// Access to the configured caches by alias
#[derive(Debug, Clone)]
pub struct CacheHandler {
    registry: CacheRegistry,
    settings: Arc<CacheSettings>,
    caches: Arc<DashMap<String, LocMemCache>>,
}

impl CacheHandler {
    pub fn new(registry: CacheRegistry, settings: CacheSettings) -> Self {
        Self {
            registry,
            settings: Arc::new(settings),
            caches: Arc::new(DashMap::new()),
        }
    }

    /// Handle for `alias`, built on first request
    pub fn get(&self, alias: &str) -> CacheResult<LocMemCache> {
        if let Some(cache) = self.caches.get(alias) {
            return Ok(cache.clone());
        }
        let config = self
            .settings
            .get(alias)
            .ok_or_else(|| CacheError::UnknownAlias(alias.to_string()))?;

        let cache = self
            .caches
            .entry(alias.to_string())
            .or_insert_with(|| LocMemCache::new(&self.registry, config.clone()))
            .clone();
        Ok(cache)
    }

    pub fn default_cache(&self) -> CacheResult<LocMemCache> {
        self.get(DEFAULT_CACHE_ALIAS)
    }

    /// Handles built so far
    pub fn all(&self) -> Vec<LocMemCache> {
        self.caches.iter().map(|r| r.value().clone()).collect()
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::timeout::Timeout;
    use crate::codec::Value;
    use hashbrown::HashMap;

    fn handler() -> CacheHandler {
        let mut caches = HashMap::new();
        caches.insert(
            "default".to_string(),
            CacheConfig::default().with_location("main"),
        );
        caches.insert(
            "sessions".to_string(),
            CacheConfig::default()
                .with_location("main")
                .with_key_prefix("sess"),
        );
        caches.insert(
            "other".to_string(),
            CacheConfig::default().with_location("elsewhere"),
        );
        CacheHandler::new(CacheRegistry::new(), CacheSettings::new(caches).unwrap())
    }

    #[test]
    fn test_unknown_alias() {
        let handler = handler();
        assert_eq!(
            handler.get("nope").unwrap_err(),
            CacheError::UnknownAlias("nope".into())
        );
    }

    #[test]
    fn test_aliases_share_locations() {
        let handler = handler();
        let default = handler.default_cache().unwrap();
        let sessions = handler.get("sessions").unwrap();
        let other = handler.get("other").unwrap();

        default.set("k", 1, Timeout::Default).unwrap();
        sessions.set("k", 2, Timeout::Default).unwrap();

        // Same store, different prefixes
        assert_eq!(default.len(), 2);
        assert_eq!(default.get("k").unwrap(), Some(Value::Int(1)));
        assert_eq!(sessions.get("k").unwrap(), Some(Value::Int(2)));
        assert!(other.is_empty());

        assert_eq!(handler.all().len(), 3);
        assert_eq!(handler.registry().names(), vec!["elsewhere", "main"]);
    }

    #[test]
    fn test_handles_are_memoized() {
        let handler = handler();
        handler.get("other").unwrap().set("k", 1, Timeout::Default).unwrap();
        assert_eq!(handler.all().len(), 1);
        assert!(handler.get("other").unwrap().has_key("k").unwrap());
        assert_eq!(handler.all().len(), 1);
    }
}
