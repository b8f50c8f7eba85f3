//! Fake writes: selected volume data files accept writes without touching
//! the medium, for load testing without wearing out disks.

mod config;
mod file;
pub mod global;
mod loader;

pub use config::{
    DATA_FILE_SUFFIX, DEFAULT_LOG_LEVEL, FakeWriteConfig, INDEX_FILE_SUFFIX, MIN_FAKE_SIZE,
    extract_volume_id, matches_any_pattern,
};
pub use file::FakeDiskFile;
pub use loader::{FakeWriteConfigError, FakeWriteLoader, PRODUCTION_SIGNALS};
