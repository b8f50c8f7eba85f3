//! # needle-backend: Storage tier dispatch
//!
//! Turns declarative tier definitions into [`BackendStorage`] values, and
//! opens volume files on them as a [`BackendFile`]:
//!
//! | Tier kind    | Fake writes | File variant             |
//! |--------------|-------------|--------------------------|
//! | `disk`       | disabled    | [`BackendFile::Disk`]     |
//! | `disk`       | enabled     | [`BackendFile::FakeDisk`] |
//! | `simulation` | n/a         | [`BackendFile::Simulated`]|
//!
//! The variant is chosen by configuration when the file is opened and never
//! changes afterwards.

mod error;
mod file;
mod storage;
mod tier;

pub use error::BackendError;
pub use file::BackendFile;
pub use storage::BackendStorage;
pub use tier::{TierConfig, TierKind, TierLoader};
