//! In-memory simulated storage file.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use needle_io::{FileStat, StorageError, StorageFile};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SimulationConfig;
use crate::metrics::{MetricsRecorder, SimulationMetrics};

/// Storage file held entirely in memory, with configurable latency,
/// bandwidth ceiling, capacity, random write errors and a sticky
/// cumulative failure point.
///
/// Reads share the state lock; writes, truncates and config updates take
/// it exclusively. Injected delays are synchronous sleeps on the calling
/// thread while the lock is held.
#[derive(Debug)]
pub struct SimulatedFile {
    name: String,
    closed: AtomicBool,
    state: RwLock<FileState>,
    rng: Mutex<ChaCha8Rng>,
    metrics: MetricsRecorder,
}

#[derive(Debug)]
struct FileState {
    config: SimulationConfig,
    /// Always at least `size` bytes long.
    data: Vec<u8>,
    size: u64,
    modified: SystemTime,
    /// Bytes offered to writes since failure injection was configured.
    bytes_offered: u64,
}

impl SimulatedFile {
    pub fn new(name: impl Into<String>, config: SimulationConfig) -> Self {
        Self::with_rng(name.into(), config, ChaCha8Rng::from_entropy())
    }

    /// Creates a file whose injected errors and jitter are reproducible.
    pub fn with_seed(name: impl Into<String>, config: SimulationConfig, seed: u64) -> Self {
        Self::with_rng(name.into(), config, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(name: String, config: SimulationConfig, rng: ChaCha8Rng) -> Self {
        Self {
            name,
            closed: AtomicBool::new(false),
            state: RwLock::new(FileState {
                config,
                data: Vec::new(),
                size: 0,
                modified: SystemTime::now(),
                bytes_offered: 0,
            }),
            rng: Mutex::new(rng),
            metrics: MetricsRecorder::default(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> SimulationConfig {
        self.read_state().config
    }

    /// Replaces the configuration for subsequent operations and clears the
    /// cumulative failure counter.
    pub fn update_config(&self, config: SimulationConfig) {
        let mut state = self.write_state();
        state.config = config;
        state.bytes_offered = 0;
        tracing::debug!(file = %self.name, ?config, "simulation config updated");
    }

    pub fn metrics(&self) -> SimulationMetrics {
        self.metrics.snapshot()
    }

    /// Zeroes all counters. The cumulative failure counter is kept.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Bytes counted toward the failure point so far.
    pub fn bytes_offered(&self) -> u64 {
        self.read_state().bytes_offered
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.is_closed() {
            return Err(StorageError::Closed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, FileState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, FileState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for `latency` jittered uniformly within ±50%.
    fn sleep_jittered(&self, latency: Duration) {
        if latency.is_zero() {
            return;
        }
        let base = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        let variation = base / 2;
        let actual = if variation == 0 {
            base
        } else {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            base - variation + rng.gen_range(0..variation * 2)
        };
        thread::sleep(Duration::from_nanos(actual));
    }

    fn draw(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.r#gen::<f64>()
    }

    fn write_locked(
        &self,
        state: &mut FileState,
        buf: &[u8],
        offset: u64,
    ) -> Result<usize, StorageError> {
        let len = buf.len() as u64;
        let end = offset
            .checked_add(len)
            .ok_or(StorageError::CapacityExceeded {
                available: state.config.disk_space,
                required: u64::MAX,
            })?;
        let config = state.config;

        if config.disk_space > 0 && end > config.disk_space {
            return Err(StorageError::CapacityExceeded {
                available: config.disk_space,
                required: end,
            });
        }

        if config.enable_failure {
            state.bytes_offered += len;
            if config.failure_point > 0 && state.bytes_offered >= config.failure_point {
                tracing::debug!(file = %self.name, at_byte = state.bytes_offered, "injected disk failure");
                return Err(StorageError::InjectedFailure {
                    at_byte: state.bytes_offered,
                });
            }
        }

        if config.error_rate > 0.0 && self.draw() < config.error_rate {
            tracing::debug!(file = %self.name, offset, len, "injected write error");
            return Err(StorageError::Injected {
                name: self.name.clone(),
            });
        }

        if config.bandwidth > 0 {
            thread::sleep(transfer_time(len, config.bandwidth));
        }
        self.sleep_jittered(config.latency);

        let end_index = to_index(end)?;
        if end_index > state.data.len() {
            state.data.resize(end_index, 0);
        }
        let start = to_index(offset)?;
        state.data[start..end_index].copy_from_slice(buf);
        state.size = state.size.max(end);
        state.modified = SystemTime::now();
        Ok(buf.len())
    }
}

impl StorageFile for SimulatedFile {
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, StorageError> {
        self.ensure_open()?;
        let mut state = self.write_state();

        let start = Instant::now();
        let result = self.write_locked(&mut state, buf, offset);
        let written = result.as_ref().map_or(0, |n| *n as u64);
        let injected = result.as_ref().is_err_and(StorageError::is_injected);
        self.metrics.record_write(written, start.elapsed(), injected);
        result
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StorageError> {
        self.ensure_open()?;
        let state = self.read_state();

        let start = Instant::now();
        self.sleep_jittered(state.config.latency);

        let result = if offset >= state.size {
            Err(StorageError::EndOfData {
                offset,
                size: state.size,
            })
        } else {
            let n = buf.len().min((state.size - offset) as usize);
            let from = offset as usize;
            buf[..n].copy_from_slice(&state.data[from..from + n]);
            Ok(n)
        };

        let read = result.as_ref().map_or(0, |n| *n as u64);
        self.metrics.record_read(read, start.elapsed());
        result
    }

    fn truncate(&self, size: u64) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut state = self.write_state();
        self.metrics.record_truncate();

        self.sleep_jittered(state.config.latency);
        let len = to_index(size)?;
        state.data.resize(len, 0);
        state.size = size;
        state.modified = SystemTime::now();
        Ok(())
    }

    fn sync(&self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.metrics.record_sync();

        let latency = self.read_state().config.latency;
        if !latency.is_zero() {
            thread::sleep(latency * 2);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| StorageError::Closed {
                name: self.name.clone(),
            })
    }

    fn stat(&self) -> Result<FileStat, StorageError> {
        self.ensure_open()?;
        let state = self.read_state();
        Ok(FileStat {
            size: state.size,
            modified: state.modified,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Time to move `len` bytes at `bandwidth` bytes per second.
pub(crate) fn transfer_time(len: u64, bandwidth: u64) -> Duration {
    let nanos = u128::from(len) * 1_000_000_000 / u128::from(bandwidth.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn to_index(offset: u64) -> Result<usize, StorageError> {
    usize::try_from(offset).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("offset {offset} exceeds addressable memory"),
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(name: &str) -> SimulatedFile {
        SimulatedFile::with_seed(name, SimulationConfig::instant(), 7)
    }

    #[test]
    fn write_grows_buffer_and_size() {
        let file = instant("1.dat");
        assert_eq!(file.write_at(b"abc", 5).unwrap(), 3);
        assert_eq!(file.stat().unwrap().size, 8);

        let mut buf = [0xFFu8; 8];
        assert_eq!(file.read_at(&mut buf, 0).unwrap(), 8);
        assert_eq!(&buf, b"\0\0\0\0\0abc");
    }

    #[test]
    fn read_at_end_is_end_of_data() {
        let file = instant("2.dat");
        let mut buf = [0u8; 4];
        assert!(file.read_at(&mut buf, 0).unwrap_err().is_end_of_data());

        file.write_at(b"xyz", 0).unwrap();
        assert_eq!(file.read_at(&mut buf, 1).unwrap(), 2);
        assert_eq!(&buf[..2], b"yz");
    }

    #[test]
    fn truncate_shrinks_and_zero_extends() {
        let file = instant("3.dat");
        file.write_at(b"0123456789", 0).unwrap();

        file.truncate(3).unwrap();
        assert_eq!(file.stat().unwrap().size, 3);

        file.truncate(6).unwrap();
        let mut buf = [0xFFu8; 6];
        file.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"012\0\0\0");
        assert_eq!(file.metrics().truncate_operations, 2);
    }

    #[test]
    fn capacity_is_enforced_on_end_offset() {
        let file = SimulatedFile::new("4.dat", SimulationConfig::instant().with_disk_space(10));
        file.write_at(&[1u8; 10], 0).unwrap();

        let err = file.write_at(&[1u8; 1], 10).unwrap_err();
        assert!(matches!(
            err,
            StorageError::CapacityExceeded {
                available: 10,
                required: 11
            }
        ));
        assert_eq!(file.stat().unwrap().size, 10);
    }

    #[test]
    fn failure_point_is_sticky() {
        let file = instant("5.dat");
        file.update_config(SimulationConfig::instant().with_failure_point(100));

        assert!(file.write_at(&[0u8; 50], 0).is_ok());
        assert!(matches!(
            file.write_at(&[0u8; 50], 50),
            Err(StorageError::InjectedFailure { at_byte: 100 })
        ));
        assert!(file.write_at(&[0u8; 1], 100).unwrap_err().is_injected());
        assert!(file.write_at(&[0u8; 1], 0).unwrap_err().is_injected());

        let metrics = file.metrics();
        assert_eq!(metrics.errors_injected, 3);
        assert_eq!(metrics.write_operations, 4);
        assert_eq!(metrics.bytes_written, 50);
        assert_eq!(file.bytes_offered(), 102);
    }

    #[test]
    fn reset_keeps_failure_counter_but_config_replace_clears_it() {
        let file = instant("6.dat");
        let config = SimulationConfig::instant().with_failure_point(10);
        file.update_config(config);
        file.write_at(&[0u8; 10], 0).unwrap_err();

        file.reset_metrics();
        assert_eq!(file.metrics().errors_injected, 0);
        assert!(file.write_at(&[0u8; 1], 0).unwrap_err().is_injected());

        file.update_config(config);
        assert_eq!(file.bytes_offered(), 0);
        assert!(file.write_at(&[0u8; 1], 0).is_ok());
    }

    #[test]
    fn error_rate_one_fails_every_write() {
        let file = SimulatedFile::with_seed("7.dat", SimulationConfig::instant().with_error_rate(1.0), 1);
        for offset in 0..20 {
            assert!(matches!(
                file.write_at(b"x", offset),
                Err(StorageError::Injected { .. })
            ));
        }
        assert_eq!(file.metrics().errors_injected, 20);
        assert_eq!(file.stat().unwrap().size, 0);
    }

    #[test]
    fn close_is_single_shot() {
        let file = instant("8.dat");
        file.close().unwrap();

        assert!(file.close().unwrap_err().is_closed());
        assert!(file.write_at(b"x", 0).unwrap_err().is_closed());
        assert!(file.read_at(&mut [0u8; 1], 0).unwrap_err().is_closed());
        assert!(file.truncate(0).unwrap_err().is_closed());
        assert!(file.sync().unwrap_err().is_closed());
        assert!(file.stat().unwrap_err().is_closed());
        assert_eq!(file.name(), "8.dat");
    }

    #[test]
    fn latency_is_applied_within_jitter() {
        let latency = Duration::from_millis(20);
        let file = SimulatedFile::with_seed("9.dat", SimulationConfig::instant().with_latency(latency), 3);

        let start = Instant::now();
        file.write_at(b"x", 0).unwrap();
        assert!(start.elapsed() >= latency / 2);

        let start = Instant::now();
        file.sync().unwrap();
        assert!(start.elapsed() >= latency * 2);
        assert_eq!(file.metrics().sync_operations, 1);
    }

    #[test]
    fn transfer_time_scales_with_bandwidth() {
        assert_eq!(transfer_time(2048, 1024), Duration::from_secs(2));
        assert_eq!(transfer_time(512, 1024), Duration::from_millis(500));
    }
}
