//! Storage-file error types.

/// Errors returned by storage-file operations.
///
/// Capacity and injection errors are returned to the immediate caller and
/// never retried here; retry policy belongs to the write path.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying OS I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The handle was closed; every later operation fails with this.
    #[error("storage file {name} is closed")]
    Closed { name: String },

    /// The write would cross the configured disk-space ceiling.
    #[error("disk space exceeded: available {available}, required {required}")]
    CapacityExceeded { available: u64, required: u64 },

    /// Probabilistic write error drawn from the configured error rate.
    #[error("simulated write error on {name}")]
    Injected { name: String },

    /// Cumulative failure point reached; sticky until the config is replaced.
    #[error("simulated disk failure at byte {at_byte}")]
    InjectedFailure { at_byte: u64 },

    /// Read offset at or past the logical end of the file.
    #[error("end of data: offset {offset} >= size {size}")]
    EndOfData { offset: u64, size: u64 },

    /// A transfer progress callback asked to stop.
    #[error("transfer aborted: {reason}")]
    TransferAborted { reason: String },
}

impl StorageError {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfData { .. })
    }

    /// True for both probabilistic and threshold injections.
    pub fn is_injected(&self) -> bool {
        matches!(self, Self::Injected { .. } | Self::InjectedFailure { .. })
    }
}
