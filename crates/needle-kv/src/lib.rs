//! # needle-kv: Key-value metadata stores
//!
//! The contract volume and filer code uses for small metadata records:
//! opaque byte keys mapped to opaque byte values.
//!
//! - [`KvStore`]: put, get, delete on the default keyspace.
//! - [`BucketAware`]: stores that keep one keyspace per bucket.
//! - [`MemoryKvStore`]: in-memory implementation of both.
//!
//! A missing key is reported as [`KvError::NotFound`]; deleting a missing
//! key succeeds.

use bytes::Bytes;

mod error;
mod memory;

pub use error::KvError;
pub use memory::{DEFAULT_BUCKET, MemoryKvStore};

/// Opaque key-value storage.
pub trait KvStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: Bytes) -> Result<(), KvError>;

    /// Returns the value under `key`, or [`KvError::NotFound`].
    fn get(&self, key: &[u8]) -> Result<Bytes, KvError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), KvError>;
}

/// Stores that partition their keyspace by bucket.
pub trait BucketAware {
    fn on_bucket_creation(&self, bucket: &str);

    fn on_bucket_deletion(&self, bucket: &str);

    /// Whether deleting a bucket can drop its keyspace in one step instead
    /// of deleting entries one at a time.
    fn can_drop_whole_bucket(&self) -> bool;
}
