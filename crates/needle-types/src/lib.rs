//! # needle-types: Core value types for volume storage
//!
//! Shared types used across the volume storage layer:
//! - Volume identity ([`VolumeId`])
//! - On-disk format versions ([`Version`])
//! - Stored objects ([`NeedleId`], [`Needle`])

use std::fmt::{Debug, Display};
use std::num::ParseIntError;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Volume identity - Copy (4-byte value)
// ============================================================================

/// Identifier of a logical volume.
///
/// Volume data files are named after their id (`<id>.dat`), so the id is
/// also what the fake-write resolver extracts from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct VolumeId(u32);

impl VolumeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the id that follows this one, wrapping at `u32::MAX`.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VolumeId {
    type Err = VolumeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(Self)
            .map_err(|source| VolumeIdError::Parse {
                input: s.to_string(),
                source,
            })
    }
}

impl From<u32> for VolumeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<VolumeId> for u32 {
    fn from(id: VolumeId) -> Self {
        id.0
    }
}

/// Error parsing a [`VolumeId`] from text.
#[derive(Debug, thiserror::Error)]
pub enum VolumeIdError {
    #[error("invalid volume id {input:?}: {source}")]
    Parse {
        input: String,
        source: ParseIntError,
    },
}

// ============================================================================
// Format version
// ============================================================================

/// Needle on-disk format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u8);

impl Version {
    pub const V1: Version = Version(1);
    pub const V2: Version = Version(2);
    pub const V3: Version = Version(3);

    pub fn new(version: u8) -> Self {
        Self(version)
    }

    /// The version new volumes are written with.
    pub fn current() -> Self {
        Self::V3
    }

    pub fn is_supported(self) -> bool {
        (Self::V1..=Self::V3).contains(&self)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::current()
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ============================================================================
// Needles
// ============================================================================

/// Identifier of a needle within its volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NeedleId(u64);

impl NeedleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for NeedleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<u64> for NeedleId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A stored data object: identity plus its content.
///
/// The write path hands needles around by reference; `data` is a cheaply
/// cloneable [`Bytes`] so staging a needle into a request never copies it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Needle {
    pub id: NeedleId,
    pub cookie: u32,
    pub data: Bytes,
}

impl Needle {
    pub fn new(id: NeedleId, cookie: u32, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            cookie,
            data: data.into(),
        }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Debug for Needle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Needle")
            .field("id", &self.id)
            .field("cookie", &format_args!("{:#010x}", self.cookie))
            .field("size", &self.data.len())
            .finish()
    }
}
