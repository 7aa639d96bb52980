//! Cache Configuration

use hashbrown::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use super::key::KeyFunc;
use crate::error::{CacheError, CacheResult};
use crate::storage::CullPolicy;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_ENTRIES: usize = 300;
pub const DEFAULT_CULL_FREQUENCY: usize = 3;
pub const DEFAULT_CACHE_ALIAS: &str = "default";

/// Configuration of one cache handle
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name of the shared store in the registry
    pub location: String,

    /// Timeout for writes using `Timeout::Default` (None = never expire)
    pub default_timeout: Option<Duration>,

    /// Entry count at which writes start culling
    pub max_entries: usize,

    /// Fraction culled per pass is 1/cull_frequency (0 = clear everything)
    pub cull_frequency: usize,

    pub key_prefix: String,

    /// Version used when a key does not carry one
    pub version: i64,

    pub key_func: KeyFunc,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            default_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_entries: DEFAULT_MAX_ENTRIES,
            cull_frequency: DEFAULT_CULL_FREQUENCY,
            key_prefix: String::new(),
            version: 1,
            key_func: KeyFunc::default(),
        }
    }
}

impl CacheConfig {
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_cull_frequency(mut self, cull_frequency: usize) -> Self {
        self.cull_frequency = cull_frequency;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn with_key_func(mut self, key_func: KeyFunc) -> Self {
        self.key_func = key_func;
        self
    }

    pub fn cull_policy(&self) -> CullPolicy {
        CullPolicy {
            max_entries: self.max_entries,
            cull_frequency: self.cull_frequency,
        }
    }

    /// Build from string parameters (`LOCATION`, `TIMEOUT`, `MAX_ENTRIES`,
    /// `CULL_FREQUENCY`, `KEY_PREFIX`, `VERSION`).
    ///
    /// Numbers that fail to parse fall back to their defaults. `TIMEOUT`
    /// is in (possibly fractional) seconds and accepts `None` for entries
    /// that never expire; a non-positive timeout makes every default-timeout
    /// write expire immediately.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let mut config = CacheConfig::default();

        if let Some(location) = params.get("LOCATION") {
            config.location = location.clone();
        }

        if let Some(raw) = params.get("TIMEOUT") {
            let raw = raw.trim();
            config.default_timeout = if raw.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_timeout(raw))
            };
        }

        if let Some(raw) = params.get("MAX_ENTRIES") {
            config.max_entries = parse_or("MAX_ENTRIES", raw, DEFAULT_MAX_ENTRIES);
        }

        if let Some(raw) = params.get("CULL_FREQUENCY") {
            config.cull_frequency = parse_or("CULL_FREQUENCY", raw, DEFAULT_CULL_FREQUENCY);
        }

        if let Some(prefix) = params.get("KEY_PREFIX") {
            config.key_prefix = prefix.clone();
        }

        if let Some(raw) = params.get("VERSION") {
            config.version = parse_or("VERSION", raw, 1);
        }

        config
    }
}

fn parse_timeout(raw: &str) -> Duration {
    let default = DEFAULT_TIMEOUT_SECS as f64;
    let mut secs: f64 = parse_or("TIMEOUT", raw, default);
    if secs.is_nan() {
        warn!(option = "TIMEOUT", value = raw, fallback = default, "Unparseable cache option");
        secs = default;
    }
    // Beyond Duration's range: far enough out to never expire
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

fn parse_or<T>(name: &str, raw: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(option = name, value = raw, fallback = ?default, "Unparseable cache option");
            default
        }
    }
}

/// Cache configurations by alias
#[derive(Debug, Clone)]
pub struct CacheSettings {
    caches: HashMap<String, CacheConfig>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let mut caches = HashMap::new();
        caches.insert(DEFAULT_CACHE_ALIAS.to_string(), CacheConfig::default());
        Self { caches }
    }
}

impl CacheSettings {
    /// Settings must contain the `default` alias
    pub fn new(caches: HashMap<String, CacheConfig>) -> CacheResult<Self> {
        if !caches.contains_key(DEFAULT_CACHE_ALIAS) {
            return Err(CacheError::InvalidConfig(format!(
                "no {:?} cache configured",
                DEFAULT_CACHE_ALIAS
            )));
        }
        Ok(Self { caches })
    }

    /// Settings from per-alias string parameters
    pub fn from_params(
        params: &HashMap<String, HashMap<String, String>>,
    ) -> CacheResult<Self> {
        let caches = params
            .iter()
            .map(|(alias, p)| (alias.clone(), CacheConfig::from_params(p)))
            .collect();
        Self::new(caches)
    }

    pub fn get(&self, alias: &str) -> Option<&CacheConfig> {
        self.caches.get(alias)
    }

    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<_> = self.caches.keys().cloned().collect();
        aliases.sort();
        aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.default_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.max_entries, 300);
        assert_eq!(config.cull_frequency, 3);
        assert_eq!(config.version, 1);
        assert_eq!(config.key_prefix, "");
    }

    #[test]
    fn test_from_params() {
        let config = CacheConfig::from_params(&params(&[
            ("LOCATION", "unique-snowflake"),
            ("TIMEOUT", "60"),
            ("MAX_ENTRIES", "1000"),
            ("CULL_FREQUENCY", "0"),
            ("KEY_PREFIX", "site"),
            ("VERSION", "4"),
        ]));

        assert_eq!(config.location, "unique-snowflake");
        assert_eq!(config.default_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.cull_frequency, 0);
        assert_eq!(config.key_prefix, "site");
        assert_eq!(config.version, 4);
    }

    #[test]
    fn test_from_params_fallbacks() {
        let config = CacheConfig::from_params(&params(&[
            ("TIMEOUT", "soon"),
            ("MAX_ENTRIES", "lots"),
            ("CULL_FREQUENCY", "-1"),
        ]));

        assert_eq!(config.default_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.cull_frequency, DEFAULT_CULL_FREQUENCY);
    }

    #[test]
    fn test_timeout_none_and_negative() {
        let never = CacheConfig::from_params(&params(&[("TIMEOUT", "None")]));
        assert_eq!(never.default_timeout, None);

        let expired = CacheConfig::from_params(&params(&[("TIMEOUT", "-10")]));
        assert_eq!(expired.default_timeout, Some(Duration::ZERO));
    }

    #[test]
    fn test_fractional_and_huge_timeout() {
        let half = CacheConfig::from_params(&params(&[("TIMEOUT", "0.5")]));
        assert_eq!(half.default_timeout, Some(Duration::from_millis(500)));

        let huge = CacheConfig::from_params(&params(&[("TIMEOUT", "9223372036854775807")]));
        assert!(huge.default_timeout.is_some());

        let nan = CacheConfig::from_params(&params(&[("TIMEOUT", "NaN")]));
        assert_eq!(nan.default_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_settings_require_default() {
        let mut caches = HashMap::new();
        caches.insert("other".to_string(), CacheConfig::default());
        assert!(matches!(
            CacheSettings::new(caches),
            Err(CacheError::InvalidConfig(_))
        ));

        let settings = CacheSettings::default();
        assert_eq!(settings.aliases(), vec!["default".to_string()]);
    }
}
