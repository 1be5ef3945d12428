//! JSON sidecar tag backend.
//!
//! Tags for `<path>` are kept in `<path>.tags.json`, grouped by namespace:
//!
//! ```text
//! {
//!   "XMP-rt:": { "color": "red", "captured": "2024-01-05-070809" },
//!   "other:":  { ... }
//! }
//! ```
//!
//! Only this backend's namespace is read or replaced; other namespaces in the
//! same sidecar are preserved.

use super::traits::{
    empty_tag_map, ensure_source_exists, same_file, FileRef, OpenFlag, TagBackend, TagMap,
};
use crate::config::{BackendConfig, TagConfig};
use crate::metadata::{atomic_read_json, atomic_write_json, backup_path_for, Metadata};
use crate::{FiletagError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

type SidecarDocument = BTreeMap<String, Metadata>;

pub struct SidecarBackend {
    namespace: String,
    keep_backup: bool,
    open: OpenFlag,
}

impl SidecarBackend {
    pub fn new(namespace: impl Into<String>, overwrite_original: bool) -> Self {
        Self {
            namespace: namespace.into(),
            keep_backup: !overwrite_original,
            open: OpenFlag::default(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.namespace(), config.overwrite_original)
    }

    /// Sidecar location for a file.
    pub fn sidecar_path(file: &FileRef) -> PathBuf {
        let mut name = file.as_path().as_os_str().to_owned();
        name.push(".");
        name.push(TagConfig::SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    fn read_document(file: &FileRef) -> Result<SidecarDocument> {
        Ok(atomic_read_json(&Self::sidecar_path(file))?.unwrap_or_default())
    }

    fn read_namespace(&self, file: &FileRef) -> Result<Metadata> {
        Ok(Self::read_document(file)?
            .remove(&self.namespace)
            .unwrap_or_default())
    }

    /// Replace this backend's namespace in a sidecar, deleting the sidecar
    /// once nothing is left in it.
    fn write_namespace(&self, file: &FileRef, metadata: Metadata) -> Result<()> {
        let path = Self::sidecar_path(file);
        let mut document = Self::read_document(file)?;

        if metadata.is_empty() {
            if document.remove(&self.namespace).is_none() {
                return Ok(());
            }
        } else {
            document.insert(self.namespace.clone(), metadata);
        }

        if !document.is_empty() {
            return atomic_write_json(&path, &document, self.keep_backup);
        }

        let result = if self.keep_backup {
            fs::rename(&path, backup_path_for(&path))
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                debug!("Removed sidecar {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FiletagError::io_with_path(e, path)),
        }
    }
}

impl TagBackend for SidecarBackend {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn open(&self) -> Result<()> {
        self.open.set(true);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.set(false);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn get_tags(&self, files: &[FileRef]) -> Result<TagMap> {
        self.open.ensure(self.name())?;

        let mut result = TagMap::new();
        for file in files {
            match self.read_namespace(file) {
                Ok(metadata) => {
                    result.insert(file.clone(), metadata);
                }
                Err(e) => {
                    warn!("Unreadable sidecar for {}, reporting empty tags: {}", file, e);
                    return Ok(empty_tag_map(files));
                }
            }
        }
        Ok(result)
    }

    fn set_tags(&self, files: &[FileRef], metadata: &Metadata) -> Result<()> {
        self.open.ensure(self.name())?;
        if metadata.is_empty() {
            return Ok(());
        }

        for file in files {
            let mut current = self.read_namespace(file)?;
            current.extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.write_namespace(file, current)?;
        }
        Ok(())
    }

    fn copy_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        self.open.ensure(self.name())?;
        ensure_source_exists(src)?;
        if same_file(src, dest) {
            return Ok(());
        }

        let snapshot = self.read_namespace(src)?;
        self.write_namespace(dest, snapshot)?;
        debug!("Copied sidecar tags {} -> {}", src, dest);
        Ok(())
    }

    fn move_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        self.open.ensure(self.name())?;
        ensure_source_exists(src)?;
        if same_file(src, dest) {
            return Ok(());
        }

        let snapshot = self.read_namespace(src)?;
        self.write_namespace(dest, snapshot)?;
        self.write_namespace(src, Metadata::new())?;
        debug!("Moved sidecar tags {} -> {}", src, dest);
        Ok(())
    }

    fn remove_tags(&self, files: &[FileRef]) -> Result<()> {
        self.open.ensure(self.name())?;
        for file in files {
            self.write_namespace(file, Metadata::new())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn md(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn open_backend(namespace: &str, overwrite_original: bool) -> SidecarBackend {
        let backend = SidecarBackend::new(namespace, overwrite_original);
        backend.open().unwrap();
        backend
    }

    #[test]
    fn test_sidecar_path() {
        let file = FileRef::from("test-data/f1.tif");
        assert_eq!(
            SidecarBackend::sidecar_path(&file),
            PathBuf::from("test-data/f1.tif.tags.json")
        );
    }

    #[test]
    fn test_other_namespaces_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let f1 = FileRef::from(temp_dir.path().join("f1.tif"));
        let ours = open_backend("XMP-rt:", true);
        let theirs = open_backend("XMP-dc:", true);

        ours.set_tags(&[f1.clone()], &md(&[("color", "red")])).unwrap();
        theirs.set_tags(&[f1.clone()], &md(&[("creator", "me")])).unwrap();
        ours.remove_tags(&[f1.clone()]).unwrap();

        assert!(ours.get_tags(&[f1.clone()]).unwrap()[&f1].is_empty());
        assert_eq!(theirs.get_tags(&[f1.clone()]).unwrap()[&f1], md(&[("creator", "me")]));
    }

    #[test]
    fn test_remove_deletes_empty_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let f1 = FileRef::from(temp_dir.path().join("f1.tif"));
        let backend = open_backend("", true);

        backend.set_tags(&[f1.clone()], &md(&[("color", "red")])).unwrap();
        assert!(SidecarBackend::sidecar_path(&f1).exists());

        backend.remove_tags(&[f1.clone()]).unwrap();
        assert!(!SidecarBackend::sidecar_path(&f1).exists());
    }

    #[test]
    fn test_non_destructive_writes_keep_backup() {
        let temp_dir = TempDir::new().unwrap();
        let f1 = FileRef::from(temp_dir.path().join("f1.tif"));
        let backend = open_backend("", false);

        backend.set_tags(&[f1.clone()], &md(&[("color", "red")])).unwrap();
        backend.set_tags(&[f1.clone()], &md(&[("color", "blue")])).unwrap();

        let backup = backup_path_for(&SidecarBackend::sidecar_path(&f1));
        let previous: Option<SidecarDocument> = atomic_read_json(&backup).unwrap();
        assert_eq!(previous.unwrap()[""], md(&[("color", "red")]));
    }

    #[test]
    fn test_malformed_sidecar_degrades_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        let f1 = FileRef::from(temp_dir.path().join("f1.tif"));
        let f2 = FileRef::from(temp_dir.path().join("f2.tif"));
        let backend = open_backend("", true);

        backend.set_tags(&[f2.clone()], &md(&[("color", "red")])).unwrap();
        fs::write(SidecarBackend::sidecar_path(&f1), "{ broken").unwrap();

        let tags = backend.get_tags(&[f1.clone(), f2.clone()]).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags[&f1].is_empty());
        assert!(tags[&f2].is_empty());
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let temp_dir = TempDir::new().unwrap();
        let f1 = FileRef::from(temp_dir.path().join("f1.tif"));
        let backend = open_backend("XMP-rt:", true);

        backend
            .set_tags(&[f1.clone()], &md(&[("color", "red"), ("title", "a")]))
            .unwrap();
        backend.set_tags(&[f1.clone()], &md(&[("title", "b")])).unwrap();

        let tags = backend.get_tags(&[f1.clone()]).unwrap();
        assert_eq!(tags[&f1], md(&[("color", "red"), ("title", "b")]));
    }

    #[test]
    fn test_move_onto_other_spelling_keeps_tags() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f1.tif");
        fs::write(&path, b"").unwrap();
        let f1 = FileRef::from(path);
        let alias = FileRef::from(temp_dir.path().join(".").join("f1.tif"));
        let backend = open_backend("", true);

        backend.set_tags(&[f1.clone()], &md(&[("color", "red")])).unwrap();
        backend.move_tags(&f1, &alias).unwrap();
        assert_eq!(backend.get_tags(&[alias.clone()]).unwrap()[&alias], md(&[("color", "red")]));

        backend.copy_tags(&alias, &f1).unwrap();
        assert_eq!(backend.get_tags(&[f1.clone()]).unwrap()[&f1], md(&[("color", "red")]));
    }
}
