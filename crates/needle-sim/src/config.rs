//! Simulation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ControlError;

/// Default base latency for new tiers and the control plane's global config.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(5);

/// Fault and timing parameters of a simulated file.
///
/// Zero means "off" for every limit. In JSON, `latency` is integer
/// nanoseconds and missing fields decode as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Base latency, jittered ±50% per operation.
    #[serde(default, with = "duration_nanos")]
    pub latency: Duration,
    /// Probability in `0.0..=1.0` that a write fails.
    #[serde(default)]
    pub error_rate: f64,
    /// Write bandwidth ceiling in bytes per second.
    #[serde(default)]
    pub bandwidth: u64,
    /// Highest writable byte offset.
    #[serde(default)]
    pub disk_space: u64,
    #[serde(default)]
    pub enable_failure: bool,
    /// Cumulative bytes offered after which every write fails.
    #[serde(default)]
    pub failure_point: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
            error_rate: 0.0,
            bandwidth: 0,
            disk_space: 0,
            enable_failure: false,
            failure_point: 0,
        }
    }
}

impl SimulationConfig {
    /// No latency, no limits, no injected faults.
    pub fn instant() -> Self {
        Self {
            latency: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = rate;
        self
    }

    pub fn with_bandwidth(mut self, bytes_per_sec: u64) -> Self {
        self.bandwidth = bytes_per_sec;
        self
    }

    pub fn with_disk_space(mut self, bytes: u64) -> Self {
        self.disk_space = bytes;
        self
    }

    /// Enables failure injection at `failure_point` cumulative bytes.
    pub fn with_failure_point(mut self, failure_point: u64) -> Self {
        self.enable_failure = true;
        self.failure_point = failure_point;
        self
    }

    /// Decodes a control-plane request body.
    pub fn from_json(body: &[u8]) -> Result<Self, ControlError> {
        serde_json::from_slice(body).map_err(|e| ControlError::Decode {
            reason: e.to_string(),
        })
    }
}

/// `Duration` as integer nanoseconds.
pub(crate) mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
