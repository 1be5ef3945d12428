//! Tag backends.
//!
//! [`TagBackend`] is the contract every store implements. Bundled variants:
//! - [`ExifToolBackend`]: tags written into the file by the `exiftool` command
//! - [`SqliteBackend`]: tags in a SQLite table
//! - [`SidecarBackend`]: tags in a JSON file next to each tagged file
//! - [`MemoryBackend`]: tags in a map, dropped on close

mod exiftool;
mod memory;
mod session;
mod sidecar;
mod sqlite;
mod traits;

pub use exiftool::ExifToolBackend;
pub use memory::MemoryBackend;
pub use session::BackendSession;
pub use sidecar::SidecarBackend;
pub use sqlite::SqliteBackend;
pub use traits::{empty_tag_map, FileRef, TagBackend, TagMap};

use crate::config::BackendConfig;
use crate::{FiletagError, Result};
use std::fmt;
use std::str::FromStr;

/// Bundled backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    ExifTool,
    Sqlite,
    Sidecar,
    Memory,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::ExifTool,
        BackendKind::Sqlite,
        BackendKind::Sidecar,
        BackendKind::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::ExifTool => "exiftool",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Sidecar => "sidecar",
            BackendKind::Memory => "memory",
        }
    }

    /// Construct a closed backend of this kind.
    pub fn build(self, config: &BackendConfig) -> Box<dyn TagBackend> {
        match self {
            BackendKind::ExifTool => Box::new(ExifToolBackend::from_config(config)),
            BackendKind::Sqlite => Box::new(SqliteBackend::from_config(config)),
            BackendKind::Sidecar => Box::new(SidecarBackend::from_config(config)),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = FiletagError;

    fn from_str(s: &str) -> Result<Self> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| FiletagError::Config {
                message: format!("Unknown backend: {}", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("exiftool".parse::<BackendKind>().unwrap(), BackendKind::ExifTool);
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!("redis".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_build_returns_closed_backend() {
        let config = BackendConfig::default();
        for kind in [BackendKind::Sidecar, BackendKind::Memory, BackendKind::ExifTool] {
            let backend = kind.build(&config);
            assert_eq!(backend.name(), kind.as_str());
            assert!(!backend.is_open());
        }
    }
}
