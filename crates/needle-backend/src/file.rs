//! The closed set of storage-file implementations a tier can hand out.

use std::sync::Arc;

use needle_io::{DiskFile, FakeDiskFile, FileStat, StorageError, StorageFile};
use needle_sim::SimulatedFile;

/// A volume's backing file, whichever tier produced it.
#[derive(Debug)]
pub enum BackendFile {
    Disk(DiskFile),
    FakeDisk(FakeDiskFile),
    Simulated(Arc<SimulatedFile>),
}

impl BackendFile {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Disk(_) => "disk",
            Self::FakeDisk(_) => "fake_disk",
            Self::Simulated(_) => "simulated",
        }
    }

    pub fn as_fake(&self) -> Option<&FakeDiskFile> {
        match self {
            Self::FakeDisk(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_simulated(&self) -> Option<&Arc<SimulatedFile>> {
        match self {
            Self::Simulated(file) => Some(file),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn StorageFile {
        match self {
            Self::Disk(file) => file,
            Self::FakeDisk(file) => file,
            Self::Simulated(file) => file.as_ref(),
        }
    }
}

impl StorageFile for BackendFile {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, StorageError> {
        self.inner().write_at(buf, offset)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StorageError> {
        self.inner().read_at(buf, offset)
    }

    fn truncate(&self, size: u64) -> Result<(), StorageError> {
        self.inner().truncate(size)
    }

    fn sync(&self) -> Result<(), StorageError> {
        self.inner().sync()
    }

    fn close(&self) -> Result<(), StorageError> {
        self.inner().close()
    }

    fn stat(&self) -> Result<FileStat, StorageError> {
        self.inner().stat()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn append(&self, buf: &[u8]) -> Result<usize, StorageError> {
        self.inner().append(buf)
    }
}
