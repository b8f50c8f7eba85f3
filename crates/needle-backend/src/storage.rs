//! Tier factory: one path from a [`TierConfig`] to the files it opens.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use needle_io::{DiskFile, FakeDiskFile, FakeWriteConfig};
use needle_sim::{SimulatedBackendStorage, SimulationControl};

use crate::BackendError;
use crate::file::BackendFile;
use crate::tier::{TierConfig, TierKind};

/// A built storage tier.
#[derive(Debug, Clone)]
pub enum BackendStorage {
    Disk {
        id: String,
        fake_writes: Arc<FakeWriteConfig>,
    },
    Simulation(SimulatedBackendStorage),
}

impl BackendStorage {
    /// Builds the tier described by `tier`.
    ///
    /// Disk tiers wrap files in the fake-write decorator when `fake_writes`
    /// is enabled. Simulation tiers register their files with `control`
    /// when one is given.
    pub fn build(
        tier: &TierConfig,
        fake_writes: Arc<FakeWriteConfig>,
        control: Option<Arc<SimulationControl>>,
    ) -> Self {
        tracing::info!(tier = %tier.id, kind = %tier.kind, "building storage tier");
        match tier.kind {
            TierKind::Disk => Self::Disk {
                id: tier.id.clone(),
                fake_writes,
            },
            TierKind::Simulation => {
                let storage = SimulatedBackendStorage::from_properties(&tier.id, &tier.properties);
                Self::Simulation(match control {
                    Some(control) => storage.with_control(control),
                    None => storage,
                })
            }
        }
    }

    /// Builds `tier` with the process-wide fake-write configuration,
    /// loading it on first use.
    pub fn build_with_process_fake_writes(
        tier: &TierConfig,
        control: Option<Arc<SimulationControl>>,
    ) -> Result<Self, BackendError> {
        let fake_writes = needle_io::fake_write::global::current()?;
        Ok(Self::build(tier, fake_writes, control))
    }

    /// Builds every tier, keyed by id.
    pub fn build_all(
        tiers: &[TierConfig],
        fake_writes: &Arc<FakeWriteConfig>,
        control: Option<&Arc<SimulationControl>>,
    ) -> BTreeMap<String, Self> {
        tiers
            .iter()
            .map(|tier| {
                let storage = Self::build(tier, Arc::clone(fake_writes), control.cloned());
                (tier.id.clone(), storage)
            })
            .collect()
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Disk { id, .. } => id,
            Self::Simulation(storage) => storage.id(),
        }
    }

    pub fn kind(&self) -> TierKind {
        match self {
            Self::Disk { .. } => TierKind::Disk,
            Self::Simulation(_) => TierKind::Simulation,
        }
    }

    pub fn storage_type(&self) -> &'static str {
        self.kind().as_str()
    }

    /// The tier's effective configuration as string properties.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        match self {
            Self::Disk { fake_writes, .. } => BTreeMap::from([(
                "fake_writes".to_string(),
                fake_writes.enabled.to_string(),
            )]),
            Self::Simulation(storage) => storage.to_properties(),
        }
    }

    /// Opens the volume file at `path` on this tier.
    ///
    /// For simulation tiers the path is only the file's name.
    pub fn open(&self, path: &Path) -> Result<BackendFile, BackendError> {
        let open_error = |source| BackendError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = match self {
            Self::Disk { fake_writes, .. } => {
                let disk = DiskFile::open(path).map_err(open_error)?;
                if fake_writes.enabled {
                    BackendFile::FakeDisk(FakeDiskFile::wrap(disk, fake_writes).map_err(open_error)?)
                } else {
                    BackendFile::Disk(disk)
                }
            }
            Self::Simulation(storage) => {
                BackendFile::Simulated(storage.new_storage_file(&path.to_string_lossy()))
            }
        };

        tracing::debug!(tier = %self.id(), path = %path.display(), kind = file.kind(), "opened storage file");
        Ok(file)
    }
}
