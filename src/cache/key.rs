//! Cache Keys
//!
//! Construction of store keys from caller keys, prefix and version,
//! plus validation of the result.

use std::fmt;
use std::sync::Arc;

use crate::error::{CacheError, CacheResult};

/// Longest key accepted, in characters
pub const MAX_KEY_LENGTH: usize = 250;

/// Caller-facing key with optional explicit version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub key: String,
    pub version: Option<i64>,
}

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version: None,
        }
    }

    pub fn versioned(key: impl Into<String>, version: i64) -> Self {
        Self {
            key: key.into(),
            version: Some(version),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey::new(key)
    }
}

impl From<&String> for CacheKey {
    fn from(key: &String) -> Self {
        CacheKey::new(key.clone())
    }
}

/// Builds the store key from (key, prefix, version)
#[derive(Clone)]
pub struct KeyFunc(Arc<dyn Fn(&str, &str, i64) -> String + Send + Sync>);

impl KeyFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &str, i64) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn apply(&self, key: &str, prefix: &str, version: i64) -> String {
        (self.0)(key, prefix, version)
    }
}

impl Default for KeyFunc {
    fn default() -> Self {
        KeyFunc::new(default_key_func)
    }
}

impl fmt::Debug for KeyFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyFunc(..)")
    }
}

/// `prefix:version:key`
pub fn default_key_func(key: &str, prefix: &str, version: i64) -> String {
    format!("{}:{}:{}", prefix, version, key)
}

/// Reject keys that are too long or contain control characters or spaces
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: format!("longer than {} characters", MAX_KEY_LENGTH),
        });
    }
    if let Some(c) = key.chars().find(|&c| (c as u32) < 33 || c as u32 == 127) {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: format!("contains disallowed character {:?}", c),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_func() {
        assert_eq!(default_key_func("user", "", 1), ":1:user");
        assert_eq!(default_key_func("user", "site", 3), "site:3:user");
    }

    #[test]
    fn test_custom_key_func() {
        let f = KeyFunc::new(|key, prefix, version| format!("{}-{}-{}", version, prefix, key));
        assert_eq!(f.apply("k", "p", 2), "2-p-k");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key(":1:fine-key").is_ok());
        assert!(validate_key(":1:with space").is_err());
        assert!(validate_key(":1:tab\there").is_err());
        assert!(validate_key(":1:del\x7f").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH)).is_ok());

        let err = validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey { .. }));
    }

    #[test]
    fn test_length_counts_characters() {
        // 200 characters, 400 bytes
        let key = "é".repeat(200);
        assert!(key.len() > MAX_KEY_LENGTH);
        assert!(validate_key(&key).is_ok());
        assert!(validate_key(&"é".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_non_ascii_allowed() {
        assert!(validate_key(":1:clé").is_ok());
    }
}
