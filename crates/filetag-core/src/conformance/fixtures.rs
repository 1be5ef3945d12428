//! Fixture files for conformance scenarios.
//!
//! Every scenario gets its own pair of files in a fresh temporary directory.
//! The directory and everything a backend wrote into it (sidecars, databases,
//! moved files) is deleted when the pair is dropped, whether the scenario
//! passed or not.

use crate::backend::FileRef;
use crate::config::FixtureConfig;
use crate::{FiletagError, Result};
use chrono::Utc;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Where the fixture files of a scenario come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureSource {
    /// Empty files. Enough for backends that never open the file.
    Blank,
    /// Working copies of real files, for backends that write into them.
    Templates { f1: PathBuf, f2: PathBuf },
}

impl FixtureSource {
    /// Templates at the conventional `test-data/f1.tif` and `test-data/f2.tif`
    /// below `root`.
    pub fn test_data(root: &Path) -> Self {
        let dir = root.join(FixtureConfig::TEST_DATA_DIR);
        FixtureSource::Templates {
            f1: dir.join(FixtureConfig::F1_NAME),
            f2: dir.join(FixtureConfig::F2_NAME),
        }
    }

    pub fn provision(&self) -> Result<FixturePair> {
        match self {
            FixtureSource::Blank => FixturePair::blank(),
            FixtureSource::Templates { f1, f2 } => FixturePair::from_templates(f1, f2),
        }
    }
}

/// Two fixture files, `f1` and `f2`, owned by a temporary directory.
pub struct FixturePair {
    dir: TempDir,
    pub f1: FileRef,
    pub f2: FileRef,
}

impl FixturePair {
    /// Create two empty files.
    pub fn blank() -> Result<Self> {
        let dir = create_dir()?;
        let f1 = dir.path().join(FixtureConfig::F1_NAME);
        let f2 = dir.path().join(FixtureConfig::F2_NAME);
        for path in [&f1, &f2] {
            fs::write(path, b"").map_err(|e| FiletagError::io_with_path(e, path))?;
        }

        Ok(Self {
            dir,
            f1: FileRef::from(f1),
            f2: FileRef::from(f2),
        })
    }

    /// Copy two template files into a fresh directory.
    ///
    /// Copies are named `f1-<template name>.<unix millis>` and
    /// `f2-<template name>.<unix millis>`, so the templates themselves are
    /// never modified and templates sharing a file name still give two files.
    pub fn from_templates(f1: &Path, f2: &Path) -> Result<Self> {
        let dir = create_dir()?;
        let stamp = Utc::now().timestamp_millis();

        debug!("Copying f1.");
        let f1 = copy_template(f1, "f1", dir.path(), stamp)?;
        debug!("Copying f2.");
        let f2 = copy_template(f2, "f2", dir.path(), stamp)?;

        Ok(Self { dir, f1, f2 })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn files(&self) -> [FileRef; 2] {
        [self.f1.clone(), self.f2.clone()]
    }
}

impl Drop for FixturePair {
    fn drop(&mut self) {
        debug!("Deleting {} and {}", self.f1, self.f2);
    }
}

fn create_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("filetag-fixtures-")
        .tempdir()
        .map_err(|e| FiletagError::Io {
            message: format!("Failed to create fixture directory: {}", e),
            path: None,
            source: Some(e),
        })
}

fn copy_template(template: &Path, label: &str, dir: &Path, stamp: i64) -> Result<FileRef> {
    let name = template.file_name().ok_or_else(|| FiletagError::Config {
        message: format!("Fixture template has no file name: {}", template.display()),
    })?;
    let mut copy_name = OsString::from(format!("{}-", label));
    copy_name.push(name);
    copy_name.push(format!(".{}", stamp));
    let dest = dir.join(copy_name);

    fs::copy(template, &dest).map_err(|e| FiletagError::io_with_path(e, template))?;
    Ok(FileRef::from(dest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fixtures_are_removed_on_drop() {
        let fixtures = FixturePair::blank().unwrap();
        let dir = fixtures.dir().to_path_buf();
        assert!(fixtures.f1.as_path().exists());
        assert!(fixtures.f2.as_path().exists());
        assert_ne!(fixtures.f1, fixtures.f2);

        drop(fixtures);
        assert!(!dir.exists());
    }

    #[test]
    fn test_template_copies_leave_templates_alone() {
        let templates = TempDir::new().unwrap();
        let f1 = templates.path().join("f1.tif");
        let f2 = templates.path().join("f2.tif");
        fs::write(&f1, b"one").unwrap();
        fs::write(&f2, b"two").unwrap();

        let fixtures = FixtureSource::Templates {
            f1: f1.clone(),
            f2: f2.clone(),
        }
        .provision()
        .unwrap();

        assert_eq!(fs::read(fixtures.f1.as_path()).unwrap(), b"one");
        assert!(fixtures.f1.as_str().contains("f1.tif."));
        fs::write(fixtures.f2.as_path(), b"changed").unwrap();
        assert_eq!(fs::read(&f2).unwrap(), b"two");
    }

    #[test]
    fn test_templates_sharing_a_name_give_two_files() {
        let templates = TempDir::new().unwrap();
        for (dir, bytes) in [("a", b"one"), ("b", b"two")] {
            fs::create_dir(templates.path().join(dir)).unwrap();
            fs::write(templates.path().join(dir).join("img.tif"), bytes).unwrap();
        }

        let fixtures = FixturePair::from_templates(
            &templates.path().join("a").join("img.tif"),
            &templates.path().join("b").join("img.tif"),
        )
        .unwrap();

        assert_ne!(fixtures.f1, fixtures.f2);
        assert_eq!(fs::read(fixtures.f1.as_path()).unwrap(), b"one");
        assert_eq!(fs::read(fixtures.f2.as_path()).unwrap(), b"two");
    }

    #[test]
    fn test_missing_template_fails() {
        let templates = TempDir::new().unwrap();
        let source = FixtureSource::test_data(templates.path());
        assert!(source.provision().is_err());
    }
}
