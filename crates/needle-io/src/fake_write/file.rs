//! Fake-write decorator over a real storage file.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::config::FakeWriteConfig;
use crate::StorageError;
use crate::disk::DiskFile;
use crate::file::{FileStat, StorageFile};

/// Wraps a real storage file and, when the file was selected for faking,
/// swallows writes and syncs while keeping size and mtime bookkeeping.
///
/// The decision is taken once in [`FakeDiskFile::wrap`]. A non-faking
/// wrapper delegates every operation unchanged.
#[derive(Debug)]
pub struct FakeDiskFile<F: StorageFile = DiskFile> {
    inner: F,
    faking: bool,
    log_writes: bool,
    log_level: u8,
    state: Mutex<FakeState>,
}

#[derive(Debug, Clone, Copy)]
struct FakeState {
    size: u64,
    modified: SystemTime,
    writes: u64,
    bytes: u64,
    last_write: Option<SystemTime>,
}

impl<F: StorageFile> FakeDiskFile<F> {
    /// Wraps `inner`, deciding from `config` whether its writes are faked.
    pub fn wrap(inner: F, config: &FakeWriteConfig) -> Result<Self, StorageError> {
        let faking = config.should_fake(inner.name());
        let stat = inner.stat()?;

        if faking && config.log_writes {
            tracing::debug!(file = inner.name(), size = stat.size, "faking writes");
        }

        Ok(Self {
            inner,
            faking,
            log_writes: config.log_writes,
            log_level: config.log_level,
            state: Mutex::new(FakeState {
                size: stat.size,
                modified: stat.modified,
                writes: 0,
                bytes: 0,
                last_write: None,
            }),
        })
    }

    /// True when writes to this handle never reach the real medium.
    pub fn is_faking(&self) -> bool {
        self.faking
    }

    /// Number of faked writes.
    pub fn write_count(&self) -> u64 {
        self.state().writes
    }

    /// Total bytes accepted by faked writes.
    pub fn bytes_faked(&self) -> u64 {
        self.state().bytes
    }

    /// Time of the most recent faked write.
    pub fn last_write(&self) -> Option<SystemTime> {
        self.state().last_write
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn logs_at(&self, level: u8) -> bool {
        self.log_writes && self.log_level >= level
    }
}

impl<F: StorageFile> StorageFile for FakeDiskFile<F> {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, StorageError> {
        if !self.faking {
            return self.inner.write_at(buf, offset);
        }
        // Closed handles stay closed, faked or not
        self.inner.stat()?;
        let end = offset.checked_add(buf.len() as u64).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("write of {} bytes at offset {offset} overflows", buf.len()),
            )
        })?;

        let now = SystemTime::now();
        let mut state = self.state();
        state.writes += 1;
        state.bytes += buf.len() as u64;
        state.size = state.size.max(end);
        state.modified = now;
        state.last_write = Some(now);

        if self.logs_at(2) {
            tracing::debug!(
                file = self.inner.name(),
                offset,
                len = buf.len(),
                total_writes = state.writes,
                total_bytes = state.bytes,
                "faked write"
            );
        }
        Ok(buf.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StorageError> {
        self.inner.read_at(buf, offset)
    }

    fn truncate(&self, size: u64) -> Result<(), StorageError> {
        self.inner.truncate(size)?;
        if self.faking {
            let mut state = self.state();
            state.size = size;
            state.modified = SystemTime::now();
        }
        Ok(())
    }

    fn sync(&self) -> Result<(), StorageError> {
        if !self.faking {
            return self.inner.sync();
        }
        self.inner.stat()?;
        if self.logs_at(3) {
            tracing::trace!(file = self.inner.name(), "faked sync");
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        self.inner.close()
    }

    fn stat(&self) -> Result<FileStat, StorageError> {
        let inner = self.inner.stat()?;
        if !self.faking {
            return Ok(inner);
        }
        let state = self.state();
        Ok(FileStat {
            size: state.size,
            modified: state.modified,
        })
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
