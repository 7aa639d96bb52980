//! Binary Value Codec
//!
//! Tagged big-endian encoding of [`Value`] trees.
//!
//! ```text
//! ┌──────────┬──────────┬───────────────────────────────┐
//! │ Version  │   Tag    │  Payload (depends on tag)     │
//! │ (1 byte) │ (1 byte) │  u32 length prefix for        │
//! │          │          │  str / bytes / list           │
//! └──────────┴──────────┴───────────────────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Value, ValueCodec};
use crate::error::{CacheError, CacheResult};

/// Format version written in front of every blob
pub const FORMAT_VERSION: u8 = 1;

/// Nesting limit for lists, keeps decoding of hostile input bounded
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    None = 0x00,
    False = 0x01,
    True = 0x02,
    Int = 0x03,
    Float = 0x04,
    Str = 0x05,
    Bytes = 0x06,
    List = 0x07,
}

impl Tag {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Tag::None),
            0x01 => Some(Tag::False),
            0x02 => Some(Tag::True),
            0x03 => Some(Tag::Int),
            0x04 => Some(Tag::Float),
            0x05 => Some(Tag::Str),
            0x06 => Some(Tag::Bytes),
            0x07 => Some(Tag::List),
            _ => None,
        }
    }
}

/// Default codec used by cache handles
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> Self {
        Self
    }

    fn put_value(buf: &mut BytesMut, value: &Value) -> CacheResult<()> {
        match value {
            Value::None => buf.put_u8(Tag::None as u8),
            Value::Bool(false) => buf.put_u8(Tag::False as u8),
            Value::Bool(true) => buf.put_u8(Tag::True as u8),
            Value::Int(n) => {
                buf.put_u8(Tag::Int as u8);
                buf.put_i64(*n);
            }
            Value::Float(x) => {
                buf.put_u8(Tag::Float as u8);
                buf.put_f64(*x);
            }
            Value::Str(s) => {
                buf.put_u8(Tag::Str as u8);
                Self::put_len(buf, s.len())?;
                buf.put_slice(s.as_bytes());
            }
            Value::Bytes(b) => {
                buf.put_u8(Tag::Bytes as u8);
                Self::put_len(buf, b.len())?;
                buf.put_slice(b);
            }
            Value::List(items) => {
                buf.put_u8(Tag::List as u8);
                Self::put_len(buf, items.len())?;
                for item in items {
                    Self::put_value(buf, item)?;
                }
            }
        }
        Ok(())
    }

    fn put_len(buf: &mut BytesMut, len: usize) -> CacheResult<()> {
        let len = u32::try_from(len)
            .map_err(|_| CacheError::Codec(format!("length {} exceeds u32", len)))?;
        buf.put_u32(len);
        Ok(())
    }

    fn read_value(buf: &mut Bytes, depth: usize) -> CacheResult<Value> {
        if depth > MAX_DEPTH {
            return Err(CacheError::Codec("value nested too deeply".into()));
        }
        Self::need(buf, 1)?;
        let raw = buf.get_u8();
        let tag = Tag::from_u8(raw)
            .ok_or_else(|| CacheError::Codec(format!("unknown tag 0x{:02x}", raw)))?;

        match tag {
            Tag::None => Ok(Value::None),
            Tag::False => Ok(Value::Bool(false)),
            Tag::True => Ok(Value::Bool(true)),
            Tag::Int => {
                Self::need(buf, 8)?;
                Ok(Value::Int(buf.get_i64()))
            }
            Tag::Float => {
                Self::need(buf, 8)?;
                Ok(Value::Float(buf.get_f64()))
            }
            Tag::Str => {
                let raw = Self::read_length_prefixed(buf)?;
                String::from_utf8(raw.to_vec())
                    .map(Value::Str)
                    .map_err(|e| CacheError::Codec(format!("invalid utf-8: {}", e)))
            }
            Tag::Bytes => Ok(Value::Bytes(Self::read_length_prefixed(buf)?)),
            Tag::List => {
                Self::need(buf, 4)?;
                let count = buf.get_u32() as usize;
                // Every element takes at least one byte
                Self::need(buf, count)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::read_value(buf, depth + 1)?);
                }
                Ok(Value::List(items))
            }
        }
    }

    fn read_length_prefixed(buf: &mut Bytes) -> CacheResult<Bytes> {
        Self::need(buf, 4)?;
        let len = buf.get_u32() as usize;
        Self::need(buf, len)?;
        Ok(buf.split_to(len))
    }

    fn need(buf: &Bytes, n: usize) -> CacheResult<()> {
        if buf.remaining() < n {
            return Err(CacheError::Codec(format!(
                "truncated blob: need {} bytes, have {}",
                n,
                buf.remaining()
            )));
        }
        Ok(())
    }
}

impl ValueCodec for BinaryCodec {
    fn encode(&self, value: &Value) -> CacheResult<Bytes> {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u8(FORMAT_VERSION);
        Self::put_value(&mut buf, value)?;
        Ok(buf.freeze())
    }

    fn decode(&self, raw: &[u8]) -> CacheResult<Value> {
        let mut buf = Bytes::copy_from_slice(raw);
        Self::need(&buf, 1)?;
        let version = buf.get_u8();
        if version != FORMAT_VERSION {
            return Err(CacheError::Codec(format!(
                "unsupported format version {}",
                version
            )));
        }
        let value = Self::read_value(&mut buf, 0)?;
        if buf.has_remaining() {
            return Err(CacheError::Codec(format!(
                "{} trailing bytes after value",
                buf.remaining()
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_value() {
        let codec = BinaryCodec::new();
        let value = Value::List(vec![
            Value::Int(-42),
            Value::Str("héllo".into()),
            Value::List(vec![Value::None, Value::Bool(true), Value::Float(1.5)]),
            Value::Bytes(Bytes::from_static(b"\x00\xff")),
        ]);

        let blob = codec.encode(&value).unwrap();
        assert_eq!(blob[0], FORMAT_VERSION);
        assert_eq!(codec.decode(&blob).unwrap(), value);
    }

    #[test]
    fn test_int_layout() {
        let blob = BinaryCodec.encode(&Value::Int(1)).unwrap();
        assert_eq!(&blob[..], &[FORMAT_VERSION, 0x03, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_truncated_input() {
        let codec = BinaryCodec::new();
        let blob = codec.encode(&Value::Str("abcdef".into())).unwrap();

        let err = codec.decode(&blob[..blob.len() - 2]).unwrap_err();
        assert!(matches!(err, CacheError::Codec(_)));
        assert!(codec.decode(&[]).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let codec = BinaryCodec::new();
        assert!(codec.decode(&[FORMAT_VERSION, 0x7f]).is_err());
        assert!(codec.decode(&[9, 0x00]).is_err());
        assert!(codec.decode(&[FORMAT_VERSION, 0x00, 0x00]).is_err());
        // List claiming far more elements than there are bytes
        assert!(codec
            .decode(&[FORMAT_VERSION, 0x07, 0xff, 0xff, 0xff, 0xff])
            .is_err());
    }
}
