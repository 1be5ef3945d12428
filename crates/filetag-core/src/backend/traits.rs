//! Tag backend trait and shared types.

use crate::metadata::Metadata;
use crate::{FiletagError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Opaque reference to a file whose tags are manipulated.
///
/// Either a filesystem path or a `file://` URI. Backends use it as an
/// identity; file contents are never inspected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem location named by this reference.
    pub fn as_path(&self) -> &Path {
        Path::new(self.0.strip_prefix("file://").unwrap_or(&self.0))
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FileRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Path> for FileRef {
    fn from(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for FileRef {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

impl AsRef<Path> for FileRef {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

/// Result of a `get_tags` call: one entry per requested file.
pub type TagMap = BTreeMap<FileRef, Metadata>;

/// A store of file-attached key/value tags.
///
/// Semantics every implementation must honor:
/// - `get_tags` returns an entry for every requested file, `{}` for files
///   never written, and degrades to `{}` for all requested files when the
///   underlying store cannot be read or parsed.
/// - `set_tags` applies the given pairs to every listed file; fields absent
///   from `metadata` are left unchanged.
/// - `copy_tags` replaces the destination's tags with a snapshot of the
///   source's. Existing destination tags are discarded, not merged.
/// - `move_tags` is `copy_tags` followed by clearing the source.
/// - `remove_tags` clears each listed file independently.
/// - `copy_tags` and `move_tags` fail with [`FiletagError::SourceMissing`]
///   when the source file does not exist.
///
/// A backend is opened before use and closed afterwards; operations on a
/// closed backend fail with [`FiletagError::BackendClosed`]. No guarantees are
/// made for concurrent callers.
pub trait TagBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn open(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn get_tags(&self, files: &[FileRef]) -> Result<TagMap>;

    fn set_tags(&self, files: &[FileRef], metadata: &Metadata) -> Result<()>;

    fn copy_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()>;

    fn move_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()>;

    fn remove_tags(&self, files: &[FileRef]) -> Result<()>;
}

impl<T: TagBackend + ?Sized> TagBackend for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn open(&self) -> Result<()> {
        (**self).open()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn get_tags(&self, files: &[FileRef]) -> Result<TagMap> {
        (**self).get_tags(files)
    }

    fn set_tags(&self, files: &[FileRef], metadata: &Metadata) -> Result<()> {
        (**self).set_tags(files, metadata)
    }

    fn copy_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        (**self).copy_tags(src, dest)
    }

    fn move_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        (**self).move_tags(src, dest)
    }

    fn remove_tags(&self, files: &[FileRef]) -> Result<()> {
        (**self).remove_tags(files)
    }
}

/// A map with an empty record for every file.
pub fn empty_tag_map(files: &[FileRef]) -> TagMap {
    files
        .iter()
        .map(|f| (f.clone(), Metadata::new()))
        .collect()
}

/// Fail with `SourceMissing` unless the source file exists.
pub(crate) fn ensure_source_exists(src: &FileRef) -> Result<()> {
    if src.as_path().exists() {
        Ok(())
    } else {
        Err(FiletagError::SourceMissing(src.as_path().to_path_buf()))
    }
}

/// Whether two references name the same file.
///
/// Spellings that differ only in `.` segments compare equal; existing files
/// are also compared by their canonical path, which resolves `..` and symlinks.
pub(crate) fn same_file(a: &FileRef, b: &FileRef) -> bool {
    if a == b || a.as_path() == b.as_path() {
        return true;
    }
    match (fs::canonicalize(a.as_path()), fs::canonicalize(b.as_path())) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Open/closed flag shared by the backends without a connection to hold.
#[derive(Debug, Default)]
pub(crate) struct OpenFlag(AtomicBool);

impl OpenFlag {
    pub fn set(&self, open: bool) {
        self.0.store(open, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn ensure(&self, backend: &'static str) -> Result<()> {
        if self.get() {
            Ok(())
        } else {
            Err(FiletagError::BackendClosed { backend })
        }
    }
}
