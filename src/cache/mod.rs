//! Cache Frontend
//!
//! Key construction, timeouts, configuration and the [`LocMemCache`] handle.

mod backend;
mod config;
mod handler;
mod key;
mod timeout;

pub use backend::LocMemCache;
pub use config::{
    CacheConfig, CacheSettings, DEFAULT_CACHE_ALIAS, DEFAULT_CULL_FREQUENCY, DEFAULT_MAX_ENTRIES,
    DEFAULT_TIMEOUT_SECS,
};
pub use handler::CacheHandler;
pub use key::{default_key_func, validate_key, CacheKey, KeyFunc, MAX_KEY_LENGTH};
pub use timeout::Timeout;
