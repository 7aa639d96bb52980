//! Cache Errors

use thiserror::Error;

/// Errors returned by cache operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    /// Key rejected before touching the store
    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Read-modify-write on an absent or expired key
    #[error("key {0:?} not found")]
    KeyNotFound(String),

    /// Increment of a value that is not a number
    #[error("value at key {0:?} is not numeric")]
    NotNumeric(String),

    /// Integer increment left the i64 range
    #[error("increment of key {0:?} overflowed")]
    Overflow(String),

    /// Value could not be encoded or a stored blob could not be decoded
    #[error("codec error: {0}")]
    Codec(String),

    /// No cache configured under this alias
    #[error("cache alias {0:?} is not configured")]
    UnknownAlias(String),

    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
