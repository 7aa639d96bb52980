//! Storage Engine
//!
//! Named in-memory stores with lazy expiry and fractional culling.

mod registry;
mod store;

pub use registry::CacheRegistry;
pub use store::{CullPolicy, LocMemStore};
