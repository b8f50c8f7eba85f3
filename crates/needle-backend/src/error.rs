//! Backend error types

use std::path::PathBuf;

use needle_io::{FakeWriteConfigError, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unknown storage tier kind {kind:?}")]
    UnknownTierKind { kind: String },

    #[error("storage tier {id} not found")]
    TierNotFound { id: String },

    #[error("failed to load tier configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("invalid fake write configuration: {source}")]
    FakeWrites {
        #[from]
        source: FakeWriteConfigError,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: StorageError,
    },
}
