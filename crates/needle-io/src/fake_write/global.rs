//! Process-wide fake-write configuration slot.
//!
//! Components that open storage files should take an explicit
//! `Arc<FakeWriteConfig>`. This slot exists for process wiring that has no
//! other place to hold it, and for tests that need to swap configurations.
//! Every access goes through one `RwLock`, so lazy loading, replacement and
//! reset never race.

use std::sync::{Arc, PoisonError, RwLock};

use super::config::FakeWriteConfig;
use super::loader::{FakeWriteConfigError, FakeWriteLoader};

static SLOT: RwLock<Option<Arc<FakeWriteConfig>>> = RwLock::new(None);

/// Returns the installed configuration, loading it from the process
/// environment on first use.
pub fn current() -> Result<Arc<FakeWriteConfig>, FakeWriteConfigError> {
    {
        let slot = SLOT.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(config) = slot.as_ref() {
            return Ok(Arc::clone(config));
        }
    }

    let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
    // Another thread may have loaded while we waited for the write lock
    if let Some(config) = slot.as_ref() {
        return Ok(Arc::clone(config));
    }

    let config = Arc::new(FakeWriteLoader::new().load()?);
    if config.enabled {
        tracing::info!(
            volume_patterns = ?config.volume_patterns,
            file_patterns = ?config.file_patterns,
            "fake writes enabled"
        );
    }
    *slot = Some(Arc::clone(&config));
    Ok(config)
}

/// Installs `config`, returning the one it replaced.
pub fn replace(config: FakeWriteConfig) -> Option<Arc<FakeWriteConfig>> {
    let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
    slot.replace(Arc::new(config))
}

/// Clears the slot; the next [`current`] call reloads.
pub fn reset() {
    let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
    *slot = None;
}
