//! Bucket stores.
//!
//! [`BucketStore`] is the seam between the dispatcher and wherever buckets
//! actually live. [`MemoryStore`] keeps them in memory in insertion order with
//! a hash index by key; persistence goes through [`BucketStore::write_snapshot`]
//! and [`BucketStore::load_snapshot`] using the bucket record framing.

use crate::core::packet::Datatype;
use crate::error::{Result, StorageError};
use crate::storage::bucket::{Bucket, BucketKey};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Replaced,
}

pub trait BucketStore: Send {
    /// Store `payload` under `key`, replacing an existing bucket (last write wins).
    fn put(&mut self, key: &[u8], datatype: Datatype, payload: &[u8])
        -> std::result::Result<PutOutcome, StorageError>;

    /// Store `payload` under `key` only if no bucket with that key exists.
    fn create(&mut self, key: &[u8], datatype: Datatype, payload: &[u8])
        -> std::result::Result<(), StorageError>;

    /// Exact-match lookup.
    fn get(&self, key: &[u8]) -> std::result::Result<&Bucket, StorageError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buckets in the order they were first created
    fn buckets(&self) -> Box<dyn Iterator<Item = &Bucket> + '_>;

    /// Write every bucket as a framed record.
    fn write_snapshot(&self, out: &mut dyn Write) -> Result<usize> {
        let mut written = 0;
        let mut buf = Vec::new();
        for bucket in self.buckets() {
            buf.clear();
            bucket.encode_record(&mut buf);
            out.write_all(&buf)?;
            written += 1;
        }
        out.flush()?;
        Ok(written)
    }

    /// Replay framed records, applying last-write-wins between them.
    fn load_snapshot(&mut self, input: &mut dyn Read) -> Result<usize> {
        let mut raw = Vec::new();
        input.read_to_end(&mut raw)?;

        let mut src = &raw[..];
        let mut loaded = 0;
        while let Some(bucket) = Bucket::decode_record(&mut src)? {
            self.put(bucket.key().as_bytes(), bucket.datatype(), bucket.payload())?;
            loaded += 1;
        }
        Ok(loaded)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Vec<Bucket>,
    index: HashMap<BucketKey, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketStore for MemoryStore {
    fn put(
        &mut self,
        key: &[u8],
        datatype: Datatype,
        payload: &[u8],
    ) -> std::result::Result<PutOutcome, StorageError> {
        let key = BucketKey::new(key)?;
        let bucket = Bucket::new(key, datatype, payload)?;

        match self.index.get(&key) {
            Some(&slot) => {
                self.buckets[slot] = bucket;
                Ok(PutOutcome::Replaced)
            }
            None => {
                self.buckets
                    .try_reserve(1)
                    .map_err(|_| StorageError::AllocationFailed(bucket.encoded_len()))?;
                self.index.insert(key, self.buckets.len());
                self.buckets.push(bucket);
                Ok(PutOutcome::Inserted)
            }
        }
    }

    fn create(
        &mut self,
        key: &[u8],
        datatype: Datatype,
        payload: &[u8],
    ) -> std::result::Result<(), StorageError> {
        let parsed = BucketKey::new(key)?;
        if self.index.contains_key(&parsed) {
            return Err(StorageError::AlreadyExists);
        }
        self.put(key, datatype, payload).map(|_| ())
    }

    fn get(&self, key: &[u8]) -> std::result::Result<&Bucket, StorageError> {
        let key = BucketKey::new(key)?;
        self.index
            .get(&key)
            .map(|&slot| &self.buckets[slot])
            .ok_or(StorageError::NotFound)
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }

    fn buckets(&self) -> Box<dyn Iterator<Item = &Bucket> + '_> {
        Box::new(self.buckets.iter())
    }
}
