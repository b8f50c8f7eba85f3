//! # needle-sim: Simulated storage medium
//!
//! A [`SimulatedFile`] implements [`needle_io::StorageFile`] entirely in
//! memory and lets tests dial in:
//!
//! - **Latency**: jittered ±50% around a base, doubled for sync
//! - **Bandwidth**: writes sleep `len / bandwidth` seconds
//! - **Capacity**: writes past the disk-space ceiling fail
//! - **Random errors**: each write fails with probability `error_rate`
//! - **Failure point**: once cumulative bytes offered reach the threshold,
//!   every later write fails until the config is replaced
//!
//! [`SimulationControl`] keeps a registry of live files so their config and
//! metrics can be changed and read at runtime; `needle-control` serves it
//! over HTTP. [`SimulatedBackendStorage`] builds files for one tier from
//! string properties.

#![cfg_attr(test, allow(clippy::float_cmp))]

mod config;
mod control;
mod file;
mod metrics;
pub mod parse;
mod storage;

pub use config::{DEFAULT_LATENCY, SimulationConfig};
pub use control::{ControlError, MetricsReport, SimulationControl, SimulationStatus};
pub use file::SimulatedFile;
pub use metrics::SimulationMetrics;
pub use parse::Properties;
pub use storage::{
    PROPERTY_KEYS, SIMULATED_DOWNLOAD_SIZE, STORAGE_TYPE, SimulatedBackendStorage,
    TRANSFER_CHUNK_SIZE,
};
