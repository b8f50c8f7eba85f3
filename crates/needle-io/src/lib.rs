//! # needle-io: Storage-file abstraction for needle volumes
//!
//! A volume writes and reads needles through the [`StorageFile`] trait and
//! never cares what sits underneath:
//!
//! - **[`DiskFile`]**: positional I/O on a real `std::fs::File`
//! - **[`FakeDiskFile`]**: decorator that swallows writes to selected
//!   volume data files, for load testing without wearing out disks
//! - **Simulated files** live in `needle-sim`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  write path (AsyncRequest)   │
//! └──────────────┬───────────────┘
//!                │ StorageFile
//! ┌──────────────┴───────────────┐
//! │ ┌──────────┐ ┌─────────────┐ │
//! │ │ DiskFile │◄┤FakeDiskFile │ │   needle-io
//! │ └──────────┘ └─────────────┘ │
//! └──────────────────────────────┘
//! ```
//!
//! The [`AsyncRequest`] completion protocol lets the write path submit work
//! to a worker and block on the result later.

mod disk;
mod error;
pub mod fake_write;
mod file;
mod request;

pub use disk::DiskFile;
pub use error::StorageError;
pub use fake_write::{FakeDiskFile, FakeWriteConfig, FakeWriteConfigError, FakeWriteLoader};
pub use file::{FileStat, StorageFile};
pub use request::{AsyncRequest, CompletionError, RequestKind, RequestResult};
