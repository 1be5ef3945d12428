//! Backend configuration.
//!
//! [`BackendConfig`] carries the options every backend recognizes: the tag
//! namespace prefix and the destructive-write flag, plus the settings specific
//! to the ExifTool and SQLite variants. Constant tables follow below it.

use crate::metadata::atomic_read_json;
use crate::{FiletagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options used to construct a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct BackendConfig {
    /// Prefix separating this deployment's tags from other metadata on the
    /// same file (for example `XMP-rt:`).
    pub tag_prefix: Option<String>,
    /// Write in place instead of keeping a copy of the previous state.
    pub overwrite_original: bool,
    /// ExifTool executable.
    pub exec_cmd: String,
    /// ExifTool `-config` file defining custom tag namespaces.
    pub exiftool_config: Option<PathBuf>,
    /// SQLite database location.
    pub database_path: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            tag_prefix: None,
            overwrite_original: false,
            exec_cmd: TagConfig::EXIFTOOL_CMD.to_string(),
            exiftool_config: None,
            database_path: None,
        }
    }
}

impl BackendConfig {
    /// Load a configuration from a JSON file.
    ///
    /// Missing keys take their default values; a missing file is an error.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        atomic_read_json(path)?.ok_or_else(|| FiletagError::Config {
            message: format!("Config file not found: {}", path.display()),
        })
    }

    pub fn with_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = Some(prefix.into());
        self
    }

    pub fn with_overwrite_original(mut self, overwrite: bool) -> Self {
        self.overwrite_original = overwrite;
        self
    }

    pub fn with_exec_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.exec_cmd = cmd.into();
        self
    }

    pub fn with_exiftool_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.exiftool_config = Some(path.into());
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Namespace used by stores that keep their own tag tables.
    pub fn namespace(&self) -> &str {
        self.tag_prefix.as_deref().unwrap_or("")
    }
}

/// Tag-related constants.
pub struct TagConfig;

impl TagConfig {
    pub const EXIFTOOL_CMD: &'static str = "exiftool";
    pub const SIDECAR_SUFFIX: &'static str = "tags.json";
    pub const SQLITE_FILE_NAME: &'static str = "filetag.sqlite";
    pub const DEFAULT_SCHEMA_FILE: &'static str = "metadata-schema.json";
    pub const DEFAULT_EXIFTOOL_CONFIG: &'static str = "custom.config";
}

/// Conventional fixture locations used by the conformance suite.
pub struct FixtureConfig;

impl FixtureConfig {
    /// Directory that may or may not exist; backends only touch metadata.
    pub const TEST_DATA_DIR: &'static str = "test-data";
    pub const F1_NAME: &'static str = "f1.tif";
    pub const F2_NAME: &'static str = "f2.tif";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.exec_cmd, "exiftool");
        assert!(!config.overwrite_original);
        assert_eq!(config.namespace(), "");
    }

    #[test]
    fn test_load_partial_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backend.json");
        std::fs::write(
            &path,
            r#"{"tag_prefix": "XMP-rt:", "overwrite_original": true}"#,
        )
        .unwrap();

        let config = BackendConfig::from_json_file(&path).unwrap();
        assert_eq!(config.tag_prefix.as_deref(), Some("XMP-rt:"));
        assert!(config.overwrite_original);
        assert_eq!(config.exec_cmd, TagConfig::EXIFTOOL_CMD);
        assert_eq!(config.namespace(), "XMP-rt:");
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = BackendConfig::from_json_file(&temp_dir.path().join("nope.json"));
        assert!(matches!(result, Err(FiletagError::Config { .. })));
    }
}
