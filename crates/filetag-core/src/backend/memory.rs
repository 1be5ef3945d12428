//! In-memory tag backend.
//!
//! Reference implementation of the contract. State lives for as long as the
//! backend is open and is dropped on close.

use super::traits::{ensure_source_exists, FileRef, OpenFlag, TagBackend, TagMap};
use crate::metadata::Metadata;
use crate::{FiletagError, Result};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    open: OpenFlag,
    tags: RwLock<HashMap<FileRef, Metadata>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<FileRef, Metadata>>> {
        self.open.ensure(self.name())?;
        self.tags
            .read()
            .map_err(|e| FiletagError::Other(format!("Tag map lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<FileRef, Metadata>>> {
        self.open.ensure(self.name())?;
        self.tags
            .write()
            .map_err(|e| FiletagError::Other(format!("Tag map lock poisoned: {}", e)))
    }
}

impl TagBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self) -> Result<()> {
        self.open.set(true);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Ok(mut tags) = self.tags.write() {
            tags.clear();
        }
        self.open.set(false);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn get_tags(&self, files: &[FileRef]) -> Result<TagMap> {
        let tags = self.read()?;
        Ok(files
            .iter()
            .map(|f| (f.clone(), tags.get(f).cloned().unwrap_or_default()))
            .collect())
    }

    fn set_tags(&self, files: &[FileRef], metadata: &Metadata) -> Result<()> {
        let mut tags = self.write()?;
        for file in files {
            tags.entry(file.clone())
                .or_default()
                .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(())
    }

    fn copy_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        let mut tags = self.write()?;
        ensure_source_exists(src)?;
        if src == dest {
            return Ok(());
        }

        match tags.get(src).cloned() {
            Some(snapshot) => {
                tags.insert(dest.clone(), snapshot);
            }
            None => {
                tags.remove(dest);
            }
        }
        debug!("Copied tags {} -> {}", src, dest);
        Ok(())
    }

    fn move_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        let mut tags = self.write()?;
        ensure_source_exists(src)?;
        if src == dest {
            return Ok(());
        }

        match tags.remove(src) {
            Some(snapshot) => {
                tags.insert(dest.clone(), snapshot);
            }
            None => {
                tags.remove(dest);
            }
        }
        debug!("Moved tags {} -> {}", src, dest);
        Ok(())
    }

    fn remove_tags(&self, files: &[FileRef]) -> Result<()> {
        let mut tags = self.write()?;
        for file in files {
            tags.remove(file);
        }
        Ok(())
    }
}
