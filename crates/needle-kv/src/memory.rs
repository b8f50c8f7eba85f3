//! In-memory bucket-aware store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::{BucketAware, KvError, KvStore};

/// Bucket backing the plain [`KvStore`] operations. It always exists.
pub const DEFAULT_BUCKET: &str = "_main";

type Keyspace = BTreeMap<Bytes, Bytes>;

#[derive(Debug)]
pub struct MemoryKvStore {
    buckets: RwLock<HashMap<String, Keyspace>>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        let mut buckets = HashMap::new();
        buckets.insert(DEFAULT_BUCKET.to_string(), Keyspace::new());
        Self {
            buckets: RwLock::new(buckets),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Keyspace>> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Keyspace>> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.read().contains_key(bucket)
    }

    /// Bucket names, sorted.
    pub fn buckets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of entries in `bucket`.
    pub fn len_in(&self, bucket: &str) -> Result<usize, KvError> {
        self.read()
            .get(bucket)
            .map(BTreeMap::len)
            .ok_or_else(|| bucket_not_found(bucket))
    }

    pub fn put_in(&self, bucket: &str, key: &[u8], value: Bytes) -> Result<(), KvError> {
        let mut buckets = self.write();
        let keyspace = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        keyspace.insert(Bytes::copy_from_slice(key), value);
        Ok(())
    }

    pub fn get_in(&self, bucket: &str, key: &[u8]) -> Result<Bytes, KvError> {
        let buckets = self.read();
        let keyspace = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        keyspace
            .get(key)
            .cloned()
            .ok_or_else(|| KvError::not_found(key))
    }

    pub fn delete_in(&self, bucket: &str, key: &[u8]) -> Result<(), KvError> {
        let mut buckets = self.write();
        let keyspace = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        keyspace.remove(key);
        Ok(())
    }
}

fn bucket_not_found(bucket: &str) -> KvError {
    KvError::BucketNotFound {
        bucket: bucket.to_string(),
    }
}

impl KvStore for MemoryKvStore {
    fn put(&self, key: &[u8], value: Bytes) -> Result<(), KvError> {
        self.put_in(DEFAULT_BUCKET, key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Bytes, KvError> {
        self.get_in(DEFAULT_BUCKET, key)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.delete_in(DEFAULT_BUCKET, key)
    }
}

impl BucketAware for MemoryKvStore {
    /// Creating an existing bucket keeps its contents.
    fn on_bucket_creation(&self, bucket: &str) {
        let mut buckets = self.write();
        if !buckets.contains_key(bucket) {
            buckets.insert(bucket.to_string(), Keyspace::new());
            tracing::debug!(%bucket, "created kv bucket");
        }
    }

    /// Drops the bucket and its entries. The default bucket and the empty
    /// name are never dropped.
    fn on_bucket_deletion(&self, bucket: &str) {
        if bucket.is_empty() || bucket == DEFAULT_BUCKET {
            tracing::warn!(%bucket, "refusing to drop reserved kv bucket");
            return;
        }
        if let Some(keyspace) = self.write().remove(bucket) {
            tracing::debug!(%bucket, entries = keyspace.len(), "dropped kv bucket");
        }
    }

    fn can_drop_whole_bucket(&self) -> bool {
        true
    }
}
