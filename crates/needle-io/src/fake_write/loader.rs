//! Fake-write configuration loading.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults (disabled)
//! 2. An optional TOML file (`with_file`)
//! 3. Environment variables with the `NEEDLE_` prefix:
//!    `NEEDLE_FAKE_WRITES`, `NEEDLE_FAKE_WRITE_MAX_SIZE`,
//!    `NEEDLE_FAKE_WRITE_VOLUMES`, `NEEDLE_FAKE_WRITE_PATTERNS`,
//!    `NEEDLE_FAKE_WRITE_LOG`, `NEEDLE_FAKE_WRITE_LOG_LEVEL`
//!
//! Loading fails if fake writes are enabled while a production signal is
//! present, or if the max fake size is set below [`MIN_FAKE_SIZE`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::config::{DEFAULT_LOG_LEVEL, FakeWriteConfig, MIN_FAKE_SIZE};

/// Variables whose value `production` marks a production deployment.
pub const PRODUCTION_SIGNALS: [&str; 3] = ["ENVIRONMENT", "NEEDLE_ENV", "GO_ENV"];

/// Errors from loading or validating fake-write settings.
///
/// All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum FakeWriteConfigError {
    #[error("fake writes cannot be enabled in production ({signal}=production)")]
    ProductionGuard { signal: String },

    #[error("max fake size {size} too small, minimum {minimum} bytes")]
    MaxSizeTooSmall { size: i64, minimum: i64 },

    #[error("failed to load fake write configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },
}

/// Raw values as they arrive from the sources. Everything is a string so
/// lenient parsing matches across TOML and environment input.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    fake_writes: Option<String>,
    fake_write_max_size: Option<String>,
    fake_write_volumes: Option<String>,
    fake_write_patterns: Option<String>,
    fake_write_log: Option<String>,
    fake_write_log_level: Option<String>,
}

/// Builder that resolves a [`FakeWriteConfig`].
#[derive(Debug, Clone)]
pub struct FakeWriteLoader {
    env_prefix: String,
    file: Option<PathBuf>,
    /// Replaces the process environment when set.
    env: Option<HashMap<String, String>>,
}

impl FakeWriteLoader {
    pub fn new() -> Self {
        Self {
            env_prefix: "NEEDLE".to_string(),
            file: None,
            env: None,
        }
    }

    /// Set the environment variable prefix (default: "NEEDLE")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read settings from a TOML file before applying the environment.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use `vars` instead of the process environment.
    ///
    /// Keys are full variable names, e.g. `NEEDLE_FAKE_WRITES`.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<FakeWriteConfig, FakeWriteConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.file {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        let environment = config::Environment::with_prefix(&self.env_prefix)
            .try_parsing(false)
            .source(self.env.clone().map(|vars| vars.into_iter().collect()));
        builder = builder.add_source(environment);

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        let config = resolve(raw);
        self.validate(&config)?;

        tracing::debug!(
            enabled = config.enabled,
            volume_patterns = ?config.volume_patterns,
            max_fake_size = ?config.max_fake_size,
            "loaded fake write configuration"
        );
        Ok(config)
    }

    fn validate(&self, config: &FakeWriteConfig) -> Result<(), FakeWriteConfigError> {
        if config.enabled {
            if let Some(signal) = self.production_signal() {
                return Err(FakeWriteConfigError::ProductionGuard { signal });
            }
        }

        if let Some(size) = config.max_fake_size {
            if size > 0 && size < MIN_FAKE_SIZE {
                return Err(FakeWriteConfigError::MaxSizeTooSmall {
                    size,
                    minimum: MIN_FAKE_SIZE,
                });
            }
        }

        Ok(())
    }

    /// Returns the first variable marking this process as production.
    fn production_signal(&self) -> Option<String> {
        PRODUCTION_SIGNALS.iter().find_map(|&key| {
            let value = match &self.env {
                Some(vars) => vars.get(key).cloned(),
                None => std::env::var(key).ok(),
            };
            (value.as_deref() == Some("production")).then(|| key.to_string())
        })
    }
}

impl Default for FakeWriteLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(raw: RawSettings) -> FakeWriteConfig {
    FakeWriteConfig {
        enabled: raw.fake_writes.as_deref() == Some("true"),
        volume_patterns: parse_list(raw.fake_write_volumes.as_deref()),
        file_patterns: parse_list(raw.fake_write_patterns.as_deref()),
        max_fake_size: parse_or_default(
            "fake_write_max_size",
            raw.fake_write_max_size.as_deref(),
            None,
            |v| v.parse::<i64>().ok().map(Some),
        ),
        log_writes: raw.fake_write_log.as_deref() == Some("true"),
        log_level: parse_or_default(
            "fake_write_log_level",
            raw.fake_write_log_level.as_deref(),
            DEFAULT_LOG_LEVEL,
            |v| v.parse::<u8>().ok(),
        ),
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
fn parse_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or_default<T: std::fmt::Debug + Copy>(
    key: &str,
    value: Option<&str>,
    default: T,
    parse: impl FnOnce(&str) -> Option<T>,
) -> T {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return default;
    };
    parse(value.trim()).unwrap_or_else(|| {
        tracing::warn!(key, value, default = ?default, "invalid fake write setting, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn empty_environment_yields_disabled() {
        let config = FakeWriteLoader::new()
            .with_env(Vec::<(String, String)>::new())
            .load()
            .unwrap();
        assert_eq!(config, FakeWriteConfig::disabled());
    }

    #[test]
    fn reads_all_settings_from_environment() {
        let config = FakeWriteLoader::new()
            .with_env([
                ("NEEDLE_FAKE_WRITES", "true"),
                ("NEEDLE_FAKE_WRITE_LOG", "true"),
                ("NEEDLE_FAKE_WRITE_LOG_LEVEL", "3"),
                ("NEEDLE_FAKE_WRITE_VOLUMES", "1, 2,,3"),
                ("NEEDLE_FAKE_WRITE_PATTERNS", "*.dat"),
                ("NEEDLE_FAKE_WRITE_MAX_SIZE", "1048576"),
            ])
            .load()
            .unwrap();

        assert!(config.enabled);
        assert!(config.log_writes);
        assert_eq!(config.log_level, 3);
        assert_eq!(config.volume_patterns, vec!["1", "2", "3"]);
        assert_eq!(config.file_patterns, vec!["*.dat"]);
        assert_eq!(config.max_fake_size, Some(1_048_576));
    }

    #[test]
    fn enabled_must_be_literal_true() {
        let config = FakeWriteLoader::new()
            .with_env([("NEEDLE_FAKE_WRITES", "yes")])
            .load()
            .unwrap();
        assert!(!config.enabled);
    }

    #[test]
    fn production_signal_blocks_enabling() {
        for signal in PRODUCTION_SIGNALS {
            let result = FakeWriteLoader::new()
                .with_env([("NEEDLE_FAKE_WRITES", "true"), (signal, "production")])
                .load();
            match result {
                Err(FakeWriteConfigError::ProductionGuard { signal: found }) => {
                    assert_eq!(found, signal);
                }
                other => panic!("expected production guard, got {other:?}"),
            }
        }
    }

    #[test]
    fn production_signal_allows_disabled() {
        let config = FakeWriteLoader::new()
            .with_env([("NEEDLE_FAKE_WRITES", "false"), ("ENVIRONMENT", "production")])
            .load()
            .unwrap();
        assert!(!config.enabled);
    }

    #[test]
    fn max_size_below_floor_is_rejected() {
        let result = FakeWriteLoader::new()
            .with_env([("NEEDLE_FAKE_WRITE_MAX_SIZE", "512")])
            .load();
        assert!(matches!(
            result,
            Err(FakeWriteConfigError::MaxSizeTooSmall { size: 512, .. })
        ));
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = FakeWriteLoader::new()
            .with_env([
                ("NEEDLE_FAKE_WRITE_MAX_SIZE", "huge"),
                ("NEEDLE_FAKE_WRITE_LOG_LEVEL", "loud"),
            ])
            .load()
            .unwrap();
        assert_eq!(config.max_fake_size, None);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake_writes.toml");
        fs::write(
            &path,
            r#"
fake_writes = "true"
fake_write_volumes = "4,5"
fake_write_log_level = "1"
"#,
        )
        .unwrap();

        let config = FakeWriteLoader::new()
            .with_file(&path)
            .with_env([("NEEDLE_FAKE_WRITE_VOLUMES", "9")])
            .load()
            .unwrap();

        assert!(config.enabled);
        assert_eq!(config.volume_patterns, vec!["9"]);
        assert_eq!(config.log_level, 1);
    }
}
