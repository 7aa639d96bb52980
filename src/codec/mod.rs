//! Value Serialization
//!
//! The store only ever sees opaque blobs; handles encode on write and
//! decode on read through a [`ValueCodec`].

mod binary;
mod value;

pub use binary::{BinaryCodec, FORMAT_VERSION};
pub use value::Value;

use bytes::Bytes;
use std::fmt::Debug;

use crate::error::CacheResult;

/// Converts values to and from the blobs kept in a store
pub trait ValueCodec: Debug + Send + Sync {
    fn encode(&self, value: &Value) -> CacheResult<Bytes>;

    fn decode(&self, raw: &[u8]) -> CacheResult<Value>;
}
