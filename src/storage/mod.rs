//! # Storage Model
//!
//! Drums are namespaces discovered as directories under a root; each drum
//! owns a [`store::BucketStore`] of fixed-key, variable-payload buckets.
//!
//! ## Components
//! - **Bucket**: 16-byte key field, datatype tag, owned payload, record framing
//! - **Store**: the store trait and the in-memory implementation
//! - **Catalog**: startup scan, lookup by drum name, snapshot load/flush
//!
//! The catalog and every store are owned by the multiplexer's single
//! control loop and need no locking.

pub mod bucket;
pub mod catalog;
pub mod store;

pub use bucket::{Bucket, BucketKey, KEY_CAPACITY, MAX_KEY_LEN};
pub use catalog::{Catalog, Drum};
pub use store::{BucketStore, MemoryStore, PutOutcome};
