//! Fake-write configuration and the per-file decision.

use std::path::Path;

use needle_types::VolumeId;
use serde::Serialize;

/// Suffix of volume data files. Only these are ever faked.
pub const DATA_FILE_SUFFIX: &str = ".dat";

/// Suffix of volume index files, stripped when extracting a volume id.
pub const INDEX_FILE_SUFFIX: &str = ".idx";

/// Smallest accepted `max_fake_size`, in bytes.
pub const MIN_FAKE_SIZE: i64 = 1024;

/// Default verbosity for fake-write logging.
pub const DEFAULT_LOG_LEVEL: u8 = 2;

/// Settings deciding which volume data files get fake writes.
///
/// Built once by [`FakeWriteLoader`](super::FakeWriteLoader) and handed to
/// whatever opens storage files. The decision for a given file is taken at
/// wrap time and frozen for that handle's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FakeWriteConfig {
    pub enabled: bool,
    /// Glob patterns matched against the decimal volume id.
    pub volume_patterns: Vec<String>,
    /// Glob patterns for file names. Loaded and reported only.
    pub file_patterns: Vec<String>,
    /// Upper bound on faked bytes; `None` when unset.
    pub max_fake_size: Option<i64>,
    pub log_writes: bool,
    pub log_level: u8,
}

impl Default for FakeWriteConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FakeWriteConfig {
    /// A configuration that never fakes anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            volume_patterns: Vec::new(),
            file_patterns: Vec::new(),
            max_fake_size: None,
            log_writes: false,
            log_level: DEFAULT_LOG_LEVEL,
        }
    }

    /// Fakes writes for every data file whose volume id matches one of `patterns`.
    ///
    /// An empty pattern list matches every volume.
    pub fn for_volumes<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            volume_patterns: patterns.into_iter().map(Into::into).collect(),
            ..Self::disabled()
        }
    }

    /// Decides whether writes to `path` should be faked.
    ///
    /// Only `.dat` files named after a nonzero numeric volume id qualify, and
    /// when volume patterns are configured the id must match at least one.
    pub fn should_fake(&self, path: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if !path.ends_with(DATA_FILE_SUFFIX) {
            return false;
        }
        let Some(volume_id) = extract_volume_id(path) else {
            return false;
        };
        if volume_id.as_u32() == 0 {
            return false;
        }
        if self.volume_patterns.is_empty() {
            return true;
        }
        matches_any_pattern(&volume_id.to_string(), &self.volume_patterns)
    }
}

/// Extracts the volume id from a path like `/data/7.dat` or `7.idx`.
pub fn extract_volume_id(path: &str) -> Option<VolumeId> {
    let file_name = Path::new(path).file_name()?.to_str()?;
    let base = file_name
        .strip_suffix(DATA_FILE_SUFFIX)
        .unwrap_or(file_name);
    let base = base.strip_suffix(INDEX_FILE_SUFFIX).unwrap_or(base);

    match base.parse::<VolumeId>() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::trace!(path, error = %e, "could not extract volume id");
            None
        }
    }
}

/// Shell-style match of `value` against any of `patterns`.
///
/// Malformed patterns never match.
pub fn matches_any_pattern(value: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|compiled| compiled.matches(value))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/data/1.dat", Some(1); "absolute path")]
    #[test_case("42.dat", Some(42); "bare name")]
    #[test_case("/data/7.idx", Some(7); "index file")]
    #[test_case("/data/volume.dat", None; "non numeric")]
    #[test_case("/data/", None; "no file name")]
    fn extracts_volume_id(path: &str, expected: Option<u32>) {
        assert_eq!(extract_volume_id(path), expected.map(VolumeId::new));
    }

    #[test]
    fn disabled_config_never_fakes() {
        let config = FakeWriteConfig::disabled();
        assert!(!config.should_fake("/data/1.dat"));
    }

    #[test]
    fn only_data_files_are_faked() {
        let config = FakeWriteConfig::for_volumes(Vec::<String>::new());
        assert!(config.should_fake("/data/1.dat"));
        assert!(!config.should_fake("/data/1.idx"));
        assert!(!config.should_fake("/data/1.dat.tmp"));
    }

    #[test]
    fn non_numeric_or_zero_volume_is_not_faked() {
        let config = FakeWriteConfig::for_volumes(Vec::<String>::new());
        assert!(!config.should_fake("/data/collection_3.dat"));
        assert!(!config.should_fake("/data/0.dat"));
    }

    #[test_case(&["1"], "/d/1.dat", true; "exact match")]
    #[test_case(&["1"], "/d/11.dat", false; "exact mismatch")]
    #[test_case(&["1*"], "/d/123.dat", true; "star")]
    #[test_case(&["?"], "/d/12.dat", false; "single char")]
    #[test_case(&["[2-4]"], "/d/3.dat", true; "range")]
    #[test_case(&["9", "5"], "/d/5.dat", true; "second pattern")]
    #[test_case(&["[bad"], "/d/5.dat", false; "malformed pattern")]
    fn volume_patterns_select_files(patterns: &[&str], path: &str, expected: bool) {
        let config = FakeWriteConfig::for_volumes(patterns.iter().copied());
        assert_eq!(config.should_fake(path), expected);
    }
}
