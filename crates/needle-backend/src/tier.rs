//! Declarative tier definitions and their loader.
//!
//! A tier file looks like:
//!
//! ```toml
//! [tiers.local]
//! kind = "disk"
//!
//! [tiers.flaky]
//! kind = "simulation"
//! latency = "2ms"
//! error_rate = 0.01
//! bandwidth = "50MB/s"
//! ```
//!
//! Every key other than `kind` is passed to the tier as a string property.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::BackendError;

/// Which implementation a tier hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    /// Real disk files, decorated with fake writes when enabled.
    #[default]
    Disk,
    /// In-memory simulated files.
    Simulation,
}

impl TierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Simulation => needle_sim::STORAGE_TYPE,
        }
    }
}

impl Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(Self::Disk),
            "simulation" => Ok(Self::Simulation),
            _ => Err(BackendError::UnknownTierKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// One configured storage tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierConfig {
    pub id: String,
    pub kind: TierKind,
    pub properties: BTreeMap<String, String>,
}

impl TierConfig {
    pub fn new(id: impl Into<String>, kind: TierKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawTierFile {
    #[serde(default)]
    tiers: BTreeMap<String, RawTier>,
}

#[derive(Debug, Deserialize)]
struct RawTier {
    kind: String,
    #[serde(flatten)]
    properties: BTreeMap<String, config::Value>,
}

/// Loads tier definitions from a TOML file or string.
#[derive(Debug, Clone, Default)]
pub struct TierLoader {
    file: Option<PathBuf>,
    inline: Option<String>,
}

impl TierLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds TOML text applied after the file.
    pub fn with_toml(mut self, toml: impl Into<String>) -> Self {
        self.inline = Some(toml.into());
        self
    }

    /// Loads every tier, sorted by id.
    pub fn load(&self) -> Result<Vec<TierConfig>, BackendError> {
        let mut builder = config::Config::builder();
        if let Some(path) = &self.file {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }
        if let Some(inline) = &self.inline {
            builder = builder.add_source(config::File::from_str(inline, config::FileFormat::Toml));
        }

        let raw: RawTierFile = builder.build()?.try_deserialize()?;
        raw.tiers
            .into_iter()
            .map(|(id, tier)| -> Result<TierConfig, BackendError> {
                let kind = tier.kind.parse()?;
                let properties = tier
                    .properties
                    .into_iter()
                    .map(|(key, value)| value.into_string().map(|value| (key, value)))
                    .collect::<Result<_, config::ConfigError>>()?;
                tracing::debug!(tier = %id, %kind, "loaded tier");
                Ok(TierConfig {
                    id,
                    kind,
                    properties,
                })
            })
            .collect()
    }
}
