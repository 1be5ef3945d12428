//! Filetag Core - pluggable file tag storage with a backend conformance suite.
//!
//! A [`FieldSchema`] declares which metadata fields a deployment recognizes.
//! A [`TagBackend`] stores per-file metadata for those fields: inside the file
//! through `exiftool`, in a SQLite table, or in JSON sidecar files. The
//! [`conformance`] module checks any backend against a fixed battery of
//! read/write/copy/move/remove scenarios using metadata produced by the
//! [`MetadataGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use filetag_core::{BackendSession, FieldSchema, FileRef, MetadataGenerator, SqliteBackend};
//!
//! fn main() -> filetag_core::Result<()> {
//!     let schema = FieldSchema::load("schema.json".as_ref())?;
//!     let backend = SqliteBackend::new("tags.sqlite", "");
//!     let session = BackendSession::open(&backend)?;
//!
//!     let photo = FileRef::from("photo.tif");
//!     let metadata = MetadataGenerator::new(&schema).generate();
//!     session.set_tags(&[photo.clone()], &metadata)?;
//!     println!("{:?}", session.get_tags(&[photo])?);
//!
//!     session.close()
//! }
//! ```

pub mod backend;
pub mod config;
pub mod conformance;
pub mod error;
pub mod metadata;
pub mod schema;

// Re-export commonly used types
pub use backend::{
    BackendKind, BackendSession, ExifToolBackend, FileRef, MemoryBackend, SidecarBackend,
    SqliteBackend, TagBackend, TagMap,
};
pub use config::{BackendConfig, FixtureConfig, TagConfig};
pub use conformance::{
    ConformanceFailure, ConformanceReport, ConformanceSuite, FixturePair, FixtureSource, Scenario,
};
pub use error::{FiletagError, Result};
pub use metadata::{Metadata, MetadataGenerator, DATE_FORMAT};
pub use schema::{FieldOption, FieldSchema, FieldType, MetadataField};
