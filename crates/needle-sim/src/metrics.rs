//! Per-file operation counters.
//!
//! Recording is lock-free apart from a shared gate; only reset and
//! snapshot take the gate exclusively, so a reset is never observed half
//! done. Average latency is derived at snapshot time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::config::duration_nanos;

/// Point-in-time view of a simulated file's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimulationMetrics {
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub write_operations: u64,
    pub read_operations: u64,
    pub errors_injected: u64,
    pub sync_operations: u64,
    pub truncate_operations: u64,
    /// Mean duration of reads and writes.
    #[serde(with = "duration_nanos")]
    pub average_latency: Duration,
    pub total_write_time_ns: u64,
    pub total_read_time_ns: u64,
}

impl SimulationMetrics {
    pub fn total_operations(&self) -> u64 {
        self.write_operations + self.read_operations
    }
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    gate: RwLock<()>,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    write_operations: AtomicU64,
    read_operations: AtomicU64,
    errors_injected: AtomicU64,
    sync_operations: AtomicU64,
    truncate_operations: AtomicU64,
    total_write_time_ns: AtomicU64,
    total_read_time_ns: AtomicU64,
}

impl MetricsRecorder {
    /// Records one write attempt. `injected` counts it as an injected error
    /// under the same gate, so a snapshot never sees one without the other.
    pub(crate) fn record_write(&self, bytes: u64, elapsed: Duration, injected: bool) {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.write_operations.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.total_write_time_ns
            .fetch_add(nanos(elapsed), Ordering::Relaxed);
        if injected {
            self.errors_injected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_read(&self, bytes: u64, elapsed: Duration) {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.read_operations.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.total_read_time_ns
            .fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn record_sync(&self) {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.sync_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_truncate(&self) {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.truncate_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SimulationMetrics {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let write_operations = self.write_operations.load(Ordering::Relaxed);
        let read_operations = self.read_operations.load(Ordering::Relaxed);
        let total_write_time_ns = self.total_write_time_ns.load(Ordering::Relaxed);
        let total_read_time_ns = self.total_read_time_ns.load(Ordering::Relaxed);

        let ops = write_operations + read_operations;
        let average_latency = if ops == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((total_write_time_ns + total_read_time_ns) / ops)
        };

        SimulationMetrics {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            write_operations,
            read_operations,
            errors_injected: self.errors_injected.load(Ordering::Relaxed),
            sync_operations: self.sync_operations.load(Ordering::Relaxed),
            truncate_operations: self.truncate_operations.load(Ordering::Relaxed),
            average_latency,
            total_write_time_ns,
            total_read_time_ns,
        }
    }

    pub(crate) fn reset(&self) {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        for counter in [
            &self.bytes_written,
            &self.bytes_read,
            &self.write_operations,
            &self.read_operations,
            &self.errors_injected,
            &self.sync_operations,
            &self.truncate_operations,
            &self.total_write_time_ns,
            &self.total_read_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_latency_spans_reads_and_writes() {
        let metrics = MetricsRecorder::default();
        metrics.record_write(10, Duration::from_nanos(300), false);
        metrics.record_read(5, Duration::from_nanos(100));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_operations(), 2);
        assert_eq!(snapshot.average_latency, Duration::from_nanos(200));
        assert_eq!(snapshot.bytes_written, 10);
        assert_eq!(snapshot.bytes_read, 5);
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = MetricsRecorder::default();
        metrics.record_write(0, Duration::from_millis(1), true);
        metrics.record_sync();
        metrics.record_truncate();

        metrics.reset();
        assert_eq!(metrics.snapshot(), SimulationMetrics::default());
    }

    #[test]
    fn injected_write_counts_land_together() {
        let metrics = MetricsRecorder::default();
        metrics.record_write(0, Duration::from_nanos(50), true);
        metrics.record_write(4, Duration::from_nanos(50), false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.write_operations, 2);
        assert_eq!(snapshot.errors_injected, 1);
        assert_eq!(snapshot.bytes_written, 4);
    }

    #[test]
    fn every_recorder_waits_for_an_exclusive_gate() {
        let metrics = MetricsRecorder::default();
        let gate = metrics.gate.write().unwrap();

        std::thread::scope(|scope| {
            let recorders = [
                scope.spawn(|| metrics.record_sync()),
                scope.spawn(|| metrics.record_truncate()),
                scope.spawn(|| metrics.record_write(1, Duration::ZERO, true)),
            ];
            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(metrics.sync_operations.load(Ordering::Relaxed), 0);
            assert_eq!(metrics.truncate_operations.load(Ordering::Relaxed), 0);
            assert_eq!(metrics.errors_injected.load(Ordering::Relaxed), 0);

            drop(gate);
            for recorder in recorders {
                recorder.join().unwrap();
            }
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sync_operations, 1);
        assert_eq!(snapshot.truncate_operations, 1);
        assert_eq!(snapshot.errors_injected, 1);
    }
}
