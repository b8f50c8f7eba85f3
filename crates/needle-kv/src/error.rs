//! KV error types

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KvError {
    #[error("kv: key not found: {key}")]
    NotFound { key: String },

    #[error("kv: bucket not found: {bucket}")]
    BucketNotFound { bucket: String },
}

impl KvError {
    pub(crate) fn not_found(key: &[u8]) -> Self {
        Self::NotFound {
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
