//! Simulated storage tier: builds simulated files from declarative
//! properties and fakes remote transfers.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use needle_io::StorageError;

use crate::config::SimulationConfig;
use crate::control::SimulationControl;
use crate::file::{SimulatedFile, transfer_time};
use crate::parse::{Properties, format_duration, parse_bandwidth, parse_bool, parse_duration, parse_size};

/// Tier type name used in tier configuration.
pub const STORAGE_TYPE: &str = "simulation";

/// Granularity of transfer progress reports.
pub const TRANSFER_CHUNK_SIZE: u64 = 1024 * 1024;

/// Size of every simulated download.
pub const SIMULATED_DOWNLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Property keys understood by [`SimulatedBackendStorage::from_properties`].
pub const PROPERTY_KEYS: [&str; 6] = [
    "latency",
    "error_rate",
    "bandwidth",
    "disk_space",
    "enable_failure",
    "failure_point",
];

/// A simulated storage tier.
///
/// Every file it creates starts from the tier's configuration. When bound
/// to a [`SimulationControl`], created files are registered there so they
/// can be inspected and reconfigured at runtime.
#[derive(Debug, Clone)]
pub struct SimulatedBackendStorage {
    id: String,
    config: SimulationConfig,
    control: Option<Arc<SimulationControl>>,
}

impl SimulatedBackendStorage {
    pub fn new(id: impl Into<String>, config: SimulationConfig) -> Self {
        Self {
            id: id.into(),
            config,
            control: None,
        }
    }

    /// Builds a tier from string properties.
    ///
    /// Missing keys keep their defaults. Unparsable values are logged and
    /// ignored.
    pub fn from_properties(id: impl Into<String>, properties: &dyn Properties) -> Self {
        let id = id.into();
        let mut config = SimulationConfig::default();

        if let Some(latency) = property(&id, properties, "latency", parse_duration) {
            config.latency = latency;
        }
        if let Some(rate) = property(&id, properties, "error_rate", |v| {
            v.trim().parse::<f64>().map_err(|e| e.to_string())
        }) {
            config.error_rate = rate;
        }
        if let Some(bandwidth) = property(&id, properties, "bandwidth", parse_bandwidth) {
            config.bandwidth = bandwidth;
        }
        if let Some(disk_space) = property(&id, properties, "disk_space", parse_size) {
            config.disk_space = disk_space;
        }
        if let Some(enable) = property(&id, properties, "enable_failure", parse_bool) {
            config.enable_failure = enable;
        }
        if let Some(point) = property(&id, properties, "failure_point", |v| {
            v.trim().parse::<u64>().map_err(|e| e.to_string())
        }) {
            config.failure_point = point;
        }

        tracing::debug!(tier = %id, ?config, "built simulated storage tier");
        Self::new(id, config)
    }

    /// Registers every file created from now on with `control`.
    pub fn with_control(mut self, control: Arc<SimulationControl>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> SimulationConfig {
        self.config
    }

    pub fn control(&self) -> Option<&Arc<SimulationControl>> {
        self.control.as_ref()
    }

    pub fn storage_type(&self) -> &'static str {
        STORAGE_TYPE
    }

    /// The effective configuration as string properties.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let config = &self.config;
        BTreeMap::from([
            ("latency".to_string(), format_duration(config.latency)),
            ("error_rate".to_string(), format!("{:.6}", config.error_rate)),
            ("bandwidth".to_string(), config.bandwidth.to_string()),
            ("disk_space".to_string(), config.disk_space.to_string()),
            ("enable_failure".to_string(), config.enable_failure.to_string()),
            ("failure_point".to_string(), config.failure_point.to_string()),
        ])
    }

    /// Creates a simulated file named `key` with this tier's configuration.
    pub fn new_storage_file(&self, key: &str) -> Arc<SimulatedFile> {
        let file = Arc::new(SimulatedFile::new(key, self.config));
        if let Some(control) = &self.control {
            control.register(key, Arc::clone(&file));
        }
        file
    }

    /// Simulates uploading the local file at `path`.
    ///
    /// Returns the key (the path) and the file's length. `progress` is
    /// called after each chunk with the bytes done and the percentage; an
    /// `Err` from it aborts the transfer.
    pub fn copy_file(
        &self,
        path: &Path,
        progress: impl FnMut(u64, f32) -> Result<(), String>,
    ) -> Result<(String, u64), StorageError> {
        let size = std::fs::metadata(path)?.len();
        let key = path.to_string_lossy().into_owned();
        self.transfer(size, progress)?;
        tracing::debug!(tier = %self.id, key = %key, size, "simulated copy");
        Ok((key, size))
    }

    /// Simulates downloading `key` into `file_name`. Every object is
    /// [`SIMULATED_DOWNLOAD_SIZE`] bytes.
    pub fn download_file(
        &self,
        file_name: &str,
        key: &str,
        progress: impl FnMut(u64, f32) -> Result<(), String>,
    ) -> Result<u64, StorageError> {
        self.transfer(SIMULATED_DOWNLOAD_SIZE, progress)?;
        tracing::debug!(tier = %self.id, key, file_name, "simulated download");
        Ok(SIMULATED_DOWNLOAD_SIZE)
    }

    /// Deleting from a simulated tier always succeeds.
    pub fn delete_file(&self, key: &str) -> Result<(), StorageError> {
        tracing::debug!(tier = %self.id, key, "simulated delete");
        Ok(())
    }

    fn transfer(
        &self,
        size: u64,
        mut progress: impl FnMut(u64, f32) -> Result<(), String>,
    ) -> Result<(), StorageError> {
        if size == 0 {
            return progress(0, 100.0).map_err(|reason| StorageError::TransferAborted { reason });
        }

        let mut done = 0u64;
        while done < size {
            let chunk = TRANSFER_CHUNK_SIZE.min(size - done);
            if self.config.bandwidth > 0 {
                thread::sleep(transfer_time(chunk, self.config.bandwidth));
            }
            done += chunk;
            let percentage = (done as f64 / size as f64 * 100.0) as f32;
            progress(done, percentage).map_err(|reason| StorageError::TransferAborted { reason })?;
        }
        Ok(())
    }
}

fn property<T, E: std::fmt::Display>(
    tier: &str,
    properties: &dyn Properties,
    key: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Option<T> {
    let value = properties.get_string(key).filter(|v| !v.is_empty())?;
    match parse(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(tier, key, value, error = %e, "ignoring unparsable tier property");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_no_properties() {
        let storage = SimulatedBackendStorage::from_properties("t", &props(&[]));
        assert_eq!(storage.config(), SimulationConfig::default());
        assert_eq!(storage.storage_type(), "simulation");
    }

    #[test]
    fn parses_every_property() {
        let storage = SimulatedBackendStorage::from_properties(
            "t",
            &props(&[
                ("latency", "10ms"),
                ("error_rate", "0.25"),
                ("bandwidth", "2MB/s"),
                ("disk_space", "1GB"),
                ("enable_failure", "true"),
                ("failure_point", "4096"),
            ]),
        );
        let config = storage.config();
        assert_eq!(config.latency, Duration::from_millis(10));
        assert!((config.error_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.bandwidth, 2 * 1024 * 1024);
        assert_eq!(config.disk_space, 1024 * 1024 * 1024);
        assert!(config.enable_failure);
        assert_eq!(config.failure_point, 4096);
    }

    #[test]
    fn unparsable_values_keep_defaults() {
        let storage = SimulatedBackendStorage::from_properties(
            "t",
            &props(&[
                ("latency", "soon"),
                ("error_rate", "often"),
                ("bandwidth", "fast"),
                ("enable_failure", "maybe"),
                ("failure_point", "-1"),
            ]),
        );
        assert_eq!(storage.config(), SimulationConfig::default());
    }

    #[test]
    fn properties_reflect_config() {
        let storage = SimulatedBackendStorage::new(
            "t",
            SimulationConfig::default().with_error_rate(0.5).with_failure_point(100),
        );
        let properties = storage.to_properties();
        assert_eq!(properties["latency"], "5ms");
        assert_eq!(properties["error_rate"], "0.500000");
        assert_eq!(properties["enable_failure"], "true");
        assert_eq!(properties["failure_point"], "100");
        assert_eq!(properties.len(), PROPERTY_KEYS.len());

        let rebuilt = SimulatedBackendStorage::from_properties("t", &properties);
        assert_eq!(rebuilt.config(), storage.config());
    }

    #[test]
    fn created_files_register_with_control() {
        let control = Arc::new(SimulationControl::new());
        let storage = SimulatedBackendStorage::new("t", SimulationConfig::instant())
            .with_control(Arc::clone(&control));

        let file = storage.new_storage_file("1.dat");
        assert!(Arc::ptr_eq(&file, &control.file("1.dat").unwrap()));
        assert_eq!(file.config(), SimulationConfig::instant());
    }

    #[test]
    fn copy_reports_each_chunk_and_finishes_at_100() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.dat");
        let len = 2 * TRANSFER_CHUNK_SIZE + 10;
        std::fs::write(&path, vec![0u8; len as usize]).unwrap();

        let storage = SimulatedBackendStorage::new("t", SimulationConfig::instant());
        let mut reports = Vec::new();
        let (key, size) = storage
            .copy_file(&path, |done, pct| {
                reports.push((done, pct));
                Ok(())
            })
            .unwrap();

        assert_eq!(key, path.to_string_lossy());
        assert_eq!(size, len);
        let done: Vec<u64> = reports.iter().map(|(d, _)| *d).collect();
        assert_eq!(done, [TRANSFER_CHUNK_SIZE, 2 * TRANSFER_CHUNK_SIZE, len]);
        assert!((reports[2].1 - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn progress_error_aborts_transfer() {
        let storage = SimulatedBackendStorage::new("t", SimulationConfig::instant());
        let mut calls = 0;
        let err = storage
            .download_file("local", "remote", |_, _| {
                calls += 1;
                if calls == 3 { Err("cancelled".to_string()) } else { Ok(()) }
            })
            .unwrap_err();

        assert!(matches!(err, StorageError::TransferAborted { ref reason } if reason == "cancelled"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn download_is_one_hundred_mebibytes() {
        let storage = SimulatedBackendStorage::new("t", SimulationConfig::instant());
        let mut last = 0;
        let size = storage
            .download_file("local", "remote", |done, _| {
                last = done;
                Ok(())
            })
            .unwrap();
        assert_eq!(size, SIMULATED_DOWNLOAD_SIZE);
        assert_eq!(last, SIMULATED_DOWNLOAD_SIZE);
        assert!(storage.delete_file("remote").is_ok());
    }
}
