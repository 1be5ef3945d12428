//! Conformance battery against every bundled backend.
//!
//! Each backend module expands into one test per scenario. The ExifTool
//! backend needs the `exiftool` binary and real image templates, so its run is
//! ignored by default; point `FILETAG_FIXTURE_DIR` at a directory holding
//! `test-data/f1.tif` and `test-data/f2.tif` and run with `--ignored`.

use filetag_core::{
    BackendSession, FieldSchema, FieldType, FileRef, FixturePair, Metadata, MetadataField,
    MemoryBackend, SidecarBackend, SqliteBackend, TagBackend,
};

fn test_schema() -> FieldSchema {
    FieldSchema::from_fields(vec![
        MetadataField::enumeration("color", ["red", "blue", "green"]),
        MetadataField::new("title", FieldType::String),
        MetadataField::new("description", FieldType::Text),
        MetadataField::new("captured", FieldType::Date),
    ])
    .expect("valid schema")
}

fn color_schema() -> FieldSchema {
    FieldSchema::from_json_str(
        r#"{"fields": [{"id": "color", "type": "enum", "options": [{"id": "red"}, {"id": "blue"}]}]}"#,
    )
    .expect("valid schema")
}

mod memory {
    use super::*;

    filetag_core::conformance_tests!(test_schema(), |_: &FixturePair| Ok(MemoryBackend::new()));
}

mod sqlite {
    use super::*;

    filetag_core::conformance_tests!(test_schema(), |pair: &FixturePair| {
        Ok(SqliteBackend::new(pair.dir().join("tags.sqlite"), "XMP-rt:"))
    });
}

mod sidecar {
    use super::*;

    filetag_core::conformance_tests!(test_schema(), |_: &FixturePair| {
        Ok(SidecarBackend::new("XMP-rt:", true))
    });
}

mod sidecar_with_backups {
    use super::*;

    filetag_core::conformance_tests!(test_schema(), |_: &FixturePair| {
        Ok(SidecarBackend::new("", false))
    });
}

mod exiftool {
    use super::*;
    use filetag_core::{BackendConfig, ConformanceSuite, ExifToolBackend, FixtureSource};
    use std::path::PathBuf;

    #[test]
    #[ignore = "requires exiftool and FILETAG_FIXTURE_DIR"]
    fn test_exiftool_conformance() {
        let Some(root) = std::env::var_os("FILETAG_FIXTURE_DIR").map(PathBuf::from) else {
            eprintln!("FILETAG_FIXTURE_DIR not set, skipping");
            return;
        };

        let schema = test_schema();
        let config = BackendConfig::default()
            .with_tag_prefix("XMP-rt:")
            .with_overwrite_original(true);
        let report = ConformanceSuite::new(&schema).run(&FixtureSource::test_data(&root), |_| {
            Ok(ExifToolBackend::from_config(&config))
        });

        assert!(report.passed(), "{}", report);
    }
}

fn color(value: &str) -> Metadata {
    Metadata::from([("color".to_string(), value.to_string())])
}

/// The red/blue walkthrough: set, copy, then move back onto the source.
fn check_color_walkthrough(backend: &dyn TagBackend, f1: &FileRef, f2: &FileRef) {
    let schema = color_schema();
    let red = color("red");
    schema.validate(&red).unwrap();

    let both = [f1.clone(), f2.clone()];
    backend.set_tags(&[f1.clone()], &red).unwrap();
    let tags = backend.get_tags(&both).unwrap();
    assert_eq!(tags[f1], red);
    assert!(tags[f2].is_empty());

    backend.copy_tags(f1, f2).unwrap();
    let tags = backend.get_tags(&both).unwrap();
    assert_eq!(tags[f1], red);
    assert_eq!(tags[f2], red);

    backend.move_tags(f2, f1).unwrap();
    let tags = backend.get_tags(&both).unwrap();
    assert_eq!(tags[f1], red);
    assert!(tags[f2].is_empty());
}

#[test]
fn test_color_walkthrough_all_backends() {
    let fixtures = FixturePair::blank().unwrap();
    let backends: Vec<Box<dyn TagBackend>> = vec![
        Box::new(MemoryBackend::new()),
        Box::new(SqliteBackend::new(fixtures.dir().join("tags.sqlite"), "")),
        Box::new(SidecarBackend::new("", true)),
    ];

    for backend in &backends {
        let session = BackendSession::open(backend.as_ref()).unwrap();
        check_color_walkthrough(&*session, &fixtures.f1, &fixtures.f2);
        session.remove_tags(&fixtures.files()).unwrap();
        session.close().unwrap();
    }
}

#[test]
fn test_copy_from_missing_source_fails() {
    let fixtures = FixturePair::blank().unwrap();
    let missing = FileRef::from(fixtures.dir().join("missing.tif"));

    let backends: Vec<Box<dyn TagBackend>> = vec![
        Box::new(MemoryBackend::new()),
        Box::new(SqliteBackend::new(fixtures.dir().join("tags.sqlite"), "")),
        Box::new(SidecarBackend::new("", true)),
    ];

    for backend in &backends {
        let session = BackendSession::open(backend.as_ref()).unwrap();
        let copy = session.copy_tags(&missing, &fixtures.f1);
        assert!(
            matches!(copy, Err(filetag_core::FiletagError::SourceMissing(_))),
            "{} copy: {:?}",
            backend.name(),
            copy
        );
        let moved = session.move_tags(&missing, &fixtures.f1);
        assert!(
            matches!(moved, Err(filetag_core::FiletagError::SourceMissing(_))),
            "{} move: {:?}",
            backend.name(),
            moved
        );
    }
}

#[test]
fn test_operations_after_close_are_rejected() {
    let fixtures = FixturePair::blank().unwrap();
    let backend = SqliteBackend::new(fixtures.dir().join("tags.sqlite"), "");
    BackendSession::open(&backend).unwrap().close().unwrap();

    let result = backend.get_tags(&fixtures.files());
    assert!(matches!(
        result,
        Err(filetag_core::FiletagError::BackendClosed { backend: "sqlite" })
    ));
}

#[test]
fn test_closed_backends_reject_copy_before_checking_source() {
    let fixtures = FixturePair::blank().unwrap();
    let missing = FileRef::from(fixtures.dir().join("missing.tif"));
    let backends: Vec<Box<dyn TagBackend>> = vec![
        Box::new(MemoryBackend::new()),
        Box::new(SqliteBackend::new(fixtures.dir().join("tags.sqlite"), "")),
        Box::new(SidecarBackend::new("", true)),
        Box::new(filetag_core::ExifToolBackend::from_config(
            &filetag_core::BackendConfig::default(),
        )),
    ];

    for backend in &backends {
        for result in [
            backend.copy_tags(&missing, &fixtures.f1),
            backend.move_tags(&missing, &fixtures.f1),
        ] {
            assert!(
                matches!(result, Err(filetag_core::FiletagError::BackendClosed { .. })),
                "{}: {:?}",
                backend.name(),
                result
            );
        }
    }
}
