//! Storage-file capability contract.
//!
//! The [`StorageFile`] trait is what a volume holds for its data file. The
//! write and read paths only ever talk to this trait, so the same code runs
//! against:
//! - real disk I/O ([`DiskFile`](crate::DiskFile))
//! - the fake-write decorator ([`FakeDiskFile`](crate::FakeDiskFile))
//! - the fully simulated medium in `needle-sim`
//!
//! All methods take `&self`: implementations keep their mutable state behind
//! locks so a handle can be shared between the writer and concurrent readers.

use std::sync::Arc;
use std::time::SystemTime;

use crate::StorageError;

/// Logical size and modification time of a storage file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Logical size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Abstraction over a volume's backing file.
///
/// Once [`close`](StorageFile::close) succeeds the handle is dead: every
/// later call, including a second `close`, returns [`StorageError::Closed`].
pub trait StorageFile: Send + Sync {
    /// Writes `buf` at `offset`, returning the number of bytes written.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, StorageError>;

    /// Reads into `buf` from `offset`.
    ///
    /// Returns [`StorageError::EndOfData`] when `offset` is at or past the
    /// logical size. Otherwise returns `min(buf.len(), size - offset)`.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StorageError>;

    /// Sets the logical size to `size`, zero-extending when growing.
    fn truncate(&self, size: u64) -> Result<(), StorageError>;

    /// Flushes written data to the medium.
    fn sync(&self) -> Result<(), StorageError>;

    /// Closes the handle. Only the first call succeeds.
    fn close(&self) -> Result<(), StorageError>;

    /// Returns the logical size and modification time.
    fn stat(&self) -> Result<FileStat, StorageError>;

    /// Stable name of the file (its path for disk-backed files).
    fn name(&self) -> &str;

    /// Writes `buf` at the current logical size.
    fn append(&self, buf: &[u8]) -> Result<usize, StorageError> {
        let stat = self.stat()?;
        self.write_at(buf, stat.size)
    }
}

impl<F: StorageFile + ?Sized> StorageFile for Arc<F> {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, StorageError> {
        (**self).write_at(buf, offset)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StorageError> {
        (**self).read_at(buf, offset)
    }

    fn truncate(&self, size: u64) -> Result<(), StorageError> {
        (**self).truncate(size)
    }

    fn sync(&self) -> Result<(), StorageError> {
        (**self).sync()
    }

    fn close(&self) -> Result<(), StorageError> {
        (**self).close()
    }

    fn stat(&self) -> Result<FileStat, StorageError> {
        (**self).stat()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn append(&self, buf: &[u8]) -> Result<usize, StorageError> {
        (**self).append(buf)
    }
}
