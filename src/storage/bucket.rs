//! Buckets: fixed-width keys and length-prefixed records.
//!
//! A bucket's on-disk record mirrors its in-memory shape:
//!
//! ```text
//! [key(16), zero-filled] [datatype u32 LE] [record_len u64 LE] [payload(record_len)]
//! ```

use crate::core::packet::Datatype;
use crate::error::{OdbError, Result, StorageError};
use bytes::{Buf, BufMut, Bytes};
use std::fmt;

/// Width of the key field
pub const KEY_CAPACITY: usize = 16;

/// Longest key accepted; keys must stay strictly below the 15 usable bytes
pub const MAX_KEY_LEN: usize = KEY_CAPACITY - 2;

/// Bytes preceding the payload of an encoded record
pub const RECORD_HEADER_LEN: usize = KEY_CAPACITY + 4 + 8;

/// Key packed into a fixed 16-byte field with a zero-filled tail
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey([u8; KEY_CAPACITY]);

impl BucketKey {
    pub fn new(raw: &[u8]) -> std::result::Result<Self, StorageError> {
        if raw.is_empty() {
            return Err(StorageError::invalid("empty key"));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(StorageError::KeyTooLong {
                len: raw.len(),
                max: MAX_KEY_LEN,
            });
        }
        // NUL would be indistinguishable from the zero-filled tail
        if raw.contains(&0) {
            return Err(StorageError::invalid("key contains a NUL byte"));
        }

        let mut field = [0u8; KEY_CAPACITY];
        field[..raw.len()].copy_from_slice(raw);
        Ok(Self(field))
    }

    /// Rebuild a key from its raw 16-byte field
    pub fn from_field(field: [u8; KEY_CAPACITY]) -> std::result::Result<Self, StorageError> {
        let len = field.iter().position(|&b| b == 0).unwrap_or(KEY_CAPACITY);
        if field[len..].iter().any(|&b| b != 0) {
            return Err(StorageError::invalid("key field has bytes after its terminator"));
        }
        Self::new(&field[..len])
    }

    /// Meaningful key bytes, without the zero tail
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(KEY_CAPACITY);
        &self.0[..len]
    }

    pub fn field(&self) -> &[u8; KEY_CAPACITY] {
        &self.0
    }
}

impl fmt::Debug for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketKey({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// A record inside a drum. The bucket owns its payload exclusively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    key: BucketKey,
    datatype: Datatype,
    payload: Bytes,
}

impl Bucket {
    /// Create a bucket holding a private copy of `payload`.
    pub fn new(
        key: BucketKey,
        datatype: Datatype,
        payload: &[u8],
    ) -> std::result::Result<Self, StorageError> {
        if payload.is_empty() {
            return Err(StorageError::invalid("empty payload"));
        }
        match datatype {
            Datatype::Bytes => {}
            Datatype::Text => {
                if std::str::from_utf8(payload).is_err() {
                    return Err(StorageError::invalid("text value is not valid UTF-8"));
                }
            }
            other => {
                return Err(StorageError::invalid(format!(
                    "datatype {other:?} cannot be stored"
                )))
            }
        }

        let mut owned = Vec::new();
        owned
            .try_reserve_exact(payload.len())
            .map_err(|_| StorageError::AllocationFailed(payload.len()))?;
        owned.extend_from_slice(payload);

        Ok(Self {
            key,
            datatype,
            payload: Bytes::from(owned),
        })
    }

    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn record_len(&self) -> usize {
        self.payload.len()
    }

    /// Cheap shared handle to the payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN + self.payload.len()
    }

    /// Append this bucket's on-disk record to `dst`
    pub fn encode_record<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(self.key.field());
        dst.put_u32_le(self.datatype.code());
        dst.put_u64_le(self.payload.len() as u64);
        dst.put_slice(&self.payload);
    }

    /// Decode one record from the front of `src`, advancing past it.
    ///
    /// Returns `Ok(None)` when `src` is empty; a partial record is an error.
    pub fn decode_record(src: &mut &[u8]) -> Result<Option<Bucket>> {
        if src.is_empty() {
            return Ok(None);
        }
        if src.len() < RECORD_HEADER_LEN {
            return Err(OdbError::InvalidHeader);
        }

        let mut field = [0u8; KEY_CAPACITY];
        src.copy_to_slice(&mut field);
        let key = BucketKey::from_field(field)?;
        let datatype = Datatype::from_code(src.get_u32_le())?;
        let len = src.get_u64_le();

        if (src.len() as u64) < len {
            return Err(OdbError::InvalidHeader);
        }
        let len = len as usize;
        let bucket = Bucket::new(key, datatype, &src[..len])?;
        src.advance(len);
        Ok(Some(bucket))
    }
}
