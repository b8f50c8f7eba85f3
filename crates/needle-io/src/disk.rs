//! Real-disk storage file using `std::fs`.
//!
//! This is the baseline implementation the fake-write decorator wraps and
//! the simulated medium replaces. Reads and writes are positional (`pread`
//! / `pwrite` on Unix), so concurrent readers never contend on a seek
//! cursor.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use crate::StorageError;
use crate::file::{FileStat, StorageFile};

/// Storage file backed by an open `std::fs::File`.
///
/// The logical size and modification time are tracked alongside the
/// descriptor and initialised from the file's metadata.
#[derive(Debug)]
pub struct DiskFile {
    name: String,
    /// `None` once closed.
    file: RwLock<Option<File>>,
    state: Mutex<DiskState>,
}

#[derive(Debug, Clone, Copy)]
struct DiskState {
    size: u64,
    modified: SystemTime,
}

impl DiskFile {
    /// Opens (creating if needed) the file at `path` for reading and writing.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path.to_string_lossy().into_owned(), file)
    }

    /// Wraps an already-open file under the given name.
    pub fn from_file(name: impl Into<String>, file: File) -> Result<Self, StorageError> {
        let metadata = file.metadata()?;
        let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        Ok(Self {
            name: name.into(),
            file: RwLock::new(Some(file)),
            state: Mutex::new(DiskState {
                size: metadata.len(),
                modified,
            }),
        })
    }

    fn closed(&self) -> StorageError {
        StorageError::Closed {
            name: self.name.clone(),
        }
    }

    fn with_file<T>(
        &self,
        op: impl FnOnce(&File) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard = self.file.read().unwrap_or_else(PoisonError::into_inner);
        let file = guard.as_ref().ok_or_else(|| self.closed())?;
        op(file)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DiskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageFile for DiskFile {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, StorageError> {
        self.with_file(|file| {
            write_all_at(file, buf, offset)?;

            let mut state = self.state();
            let end = offset + buf.len() as u64;
            if end > state.size {
                state.size = end;
            }
            state.modified = SystemTime::now();
            Ok(buf.len())
        })
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StorageError> {
        self.with_file(|file| {
            let size = self.state().size;
            if offset >= size {
                return Err(StorageError::EndOfData { offset, size });
            }
            let n = buf.len().min((size - offset) as usize);
            read_exact_at(file, &mut buf[..n], offset)?;
            Ok(n)
        })
    }

    fn truncate(&self, size: u64) -> Result<(), StorageError> {
        self.with_file(|file| {
            file.set_len(size)?;
            let mut state = self.state();
            state.size = size;
            state.modified = SystemTime::now();
            Ok(())
        })
    }

    fn sync(&self) -> Result<(), StorageError> {
        self.with_file(|file| {
            file.sync_all()?;
            Ok(())
        })
    }

    fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.file.write().unwrap_or_else(PoisonError::into_inner);
        // Dropping the file closes the descriptor
        match guard.take() {
            Some(_) => Ok(()),
            None => Err(self.closed()),
        }
    }

    fn stat(&self) -> Result<FileStat, StorageError> {
        self.with_file(|_| {
            let state = self.state();
            Ok(FileStat {
                size: state.size,
                modified: state.modified,
            })
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

// Fallback: seek_write / seek_read loops on non-Unix platforms
#[cfg(not(unix))]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        let n = file.seek_write(buf, offset)?;
        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        buf = &buf[n..];
        offset += n as u64;
    }
    Ok(())
}

#[cfg(not(unix))]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        let n = file.seek_read(buf, offset)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf = &mut buf[n..];
        offset += n as u64;
    }
    Ok(())
}
