//! locmem - Thread-Safe In-Memory Cache
//!
//! Named, process-local key/value stores shared by every handle that
//! points at them. Entries expire lazily on access and writes at
//! capacity cull a fraction of the least recently used entries.
//!
//! ```no_run
//! use locmem::{CacheConfig, CacheRegistry, LocMemCache, Timeout};
//!
//! let registry = CacheRegistry::new();
//! let cache = LocMemCache::new(&registry, CacheConfig::default().with_location("pages"));
//!
//! cache.set("hits", 0, Timeout::Never)?;
//! cache.incr("hits", 1)?;
//! assert_eq!(cache.get("hits")?.and_then(|v| v.as_int()), Some(1));
//! # Ok::<(), locmem::CacheError>(())
//! ```

pub mod cache;
pub mod clock;
pub mod codec;
pub mod error;
pub mod loadtest;
pub mod metrics;
pub mod storage;

pub use cache::{CacheConfig, CacheHandler, CacheKey, CacheSettings, LocMemCache, Timeout};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{BinaryCodec, Value, ValueCodec};
pub use error::{CacheError, CacheResult};
pub use metrics::{Metrics, MetricsSnapshot};
pub use storage::{CacheRegistry, CullPolicy, LocMemStore};
