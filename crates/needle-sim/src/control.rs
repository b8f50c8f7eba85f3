//! Simulation control plane: a registry of simulated files plus a global
//! configuration and enabled flag.
//!
//! The flag is tracked and reported only. Each file keeps applying its own
//! configuration whether or not the control plane is enabled.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;

use crate::config::{SimulationConfig, duration_nanos};
use crate::file::SimulatedFile;
use crate::metrics::SimulationMetrics;

/// Errors from control-plane operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("storage file not found: {file}")]
    NotFound { file: String },

    #[error("invalid request body: {reason}")]
    Decode { reason: String },
}

/// Aggregate view across every registered file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatus {
    pub enabled: bool,
    pub global_config: SimulationConfig,
    /// Number of registered files.
    pub storage_files: usize,
    pub total_bytes_written: u64,
    pub total_bytes_read: u64,
    pub total_operations: u64,
    pub total_errors: u64,
    /// Mean of the per-file average latencies, over files with nonzero latency.
    #[serde(with = "duration_nanos")]
    pub average_latency: Duration,
}

/// Metrics for one file, or for all files keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetricsReport {
    File(SimulationMetrics),
    All(BTreeMap<String, SimulationMetrics>),
}

#[derive(Debug)]
struct Registry {
    files: BTreeMap<String, Arc<SimulatedFile>>,
    global: SimulationConfig,
    enabled: bool,
}

/// Shared registry of simulated files.
#[derive(Debug)]
pub struct SimulationControl {
    registry: RwLock<Registry>,
}

impl Default for SimulationControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationControl {
    /// Empty, disabled control plane with the default global config.
    pub fn new() -> Self {
        Self::with_global_config(SimulationConfig::default())
    }

    pub fn with_global_config(global: SimulationConfig) -> Self {
        Self {
            registry: RwLock::new(Registry {
                files: BTreeMap::new(),
                global,
                enabled: false,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `file` under `name`, returning any file it displaced.
    pub fn register(
        &self,
        name: impl Into<String>,
        file: Arc<SimulatedFile>,
    ) -> Option<Arc<SimulatedFile>> {
        let name = name.into();
        tracing::info!(file = %name, "registered simulated file");
        self.write().files.insert(name, file)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<SimulatedFile>> {
        let removed = self.write().files.remove(name);
        if removed.is_some() {
            tracing::info!(file = %name, "unregistered simulated file");
        }
        removed
    }

    pub fn file(&self, name: &str) -> Option<Arc<SimulatedFile>> {
        self.read().files.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn file_names(&self) -> Vec<String> {
        self.read().files.keys().cloned().collect()
    }

    pub fn is_enabled(&self) -> bool {
        self.read().enabled
    }

    pub fn global_config(&self) -> SimulationConfig {
        self.read().global
    }

    /// Aggregates metrics across all registered files.
    pub fn status(&self) -> SimulationStatus {
        let registry = self.read();
        let mut status = SimulationStatus {
            enabled: registry.enabled,
            global_config: registry.global,
            storage_files: registry.files.len(),
            total_bytes_written: 0,
            total_bytes_read: 0,
            total_operations: 0,
            total_errors: 0,
            average_latency: Duration::ZERO,
        };

        let mut latency_sum = Duration::ZERO;
        let mut latency_files = 0u32;
        for file in registry.files.values() {
            let metrics = file.metrics();
            status.total_bytes_written += metrics.bytes_written;
            status.total_bytes_read += metrics.bytes_read;
            status.total_operations += metrics.total_operations();
            status.total_errors += metrics.errors_injected;
            if !metrics.average_latency.is_zero() {
                latency_sum += metrics.average_latency;
                latency_files += 1;
            }
        }
        if latency_files > 0 {
            status.average_latency = latency_sum / latency_files;
        }
        status
    }

    /// Metrics for `file`, or for every file when `None`.
    pub fn metrics(&self, file: Option<&str>) -> Result<MetricsReport, ControlError> {
        let registry = self.read();
        match file {
            Some(name) => Ok(MetricsReport::File(lookup(&registry, name)?.metrics())),
            None => Ok(MetricsReport::All(
                registry
                    .files
                    .iter()
                    .map(|(name, file)| (name.clone(), file.metrics()))
                    .collect(),
            )),
        }
    }

    /// Configuration of `file`, or the global configuration when `None`.
    pub fn config(&self, file: Option<&str>) -> Result<SimulationConfig, ControlError> {
        let registry = self.read();
        match file {
            Some(name) => Ok(lookup(&registry, name)?.config()),
            None => Ok(registry.global),
        }
    }

    /// Replaces the configuration of `file`, or when `None` the global
    /// configuration and that of every registered file.
    pub fn set_config(
        &self,
        file: Option<&str>,
        config: SimulationConfig,
    ) -> Result<(), ControlError> {
        match file {
            Some(name) => {
                let registry = self.read();
                lookup(&registry, name)?.update_config(config);
                tracing::info!(file = %name, ?config, "updated simulation config");
            }
            None => self.set_global_config(config),
        }
        Ok(())
    }

    /// Sets the global configuration and pushes it to every registered file.
    pub fn set_global_config(&self, config: SimulationConfig) {
        let mut registry = self.write();
        registry.global = config;
        for file in registry.files.values() {
            file.update_config(config);
        }
        tracing::info!(files = registry.files.len(), ?config, "updated global simulation config");
    }

    /// Resets metrics of `file`, or of every file when `None`.
    pub fn reset(&self, file: Option<&str>) -> Result<(), ControlError> {
        let registry = self.read();
        match file {
            Some(name) => {
                lookup(&registry, name)?.reset_metrics();
                tracing::info!(file = %name, "reset simulation metrics");
            }
            None => {
                for file in registry.files.values() {
                    file.reset_metrics();
                }
                tracing::info!("reset all simulation metrics");
            }
        }
        Ok(())
    }

    /// Sets the enabled flag and returns the new value.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.write().enabled = enabled;
        if enabled {
            tracing::info!("simulation backend enabled");
        } else {
            tracing::info!("simulation backend disabled");
        }
        enabled
    }

    pub fn enable(&self) -> bool {
        self.set_enabled(true)
    }

    pub fn disable(&self) -> bool {
        self.set_enabled(false)
    }
}

fn lookup<'a>(registry: &'a Registry, name: &str) -> Result<&'a Arc<SimulatedFile>, ControlError> {
    registry.files.get(name).ok_or_else(|| ControlError::NotFound {
        file: name.to_string(),
    })
}
