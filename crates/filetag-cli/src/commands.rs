//! Subcommand implementations.

use crate::Command;
use anyhow::{bail, Context, Result};
use filetag_core::{
    BackendConfig, BackendKind, BackendSession, ConformanceSuite, FieldSchema, FileRef,
    FixturePair, FixtureSource, Metadata, MetadataGenerator, TagBackend, TagConfig,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Parse a `field=value` pair. The value may itself contain `=`.
pub fn parse_tag(s: &str) -> std::result::Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid tag `{}`: expected field=value", s))?;
    if field.is_empty() {
        return Err(format!("invalid tag `{}`: empty field name", s));
    }
    Ok((field.to_string(), value.to_string()))
}

fn file_refs(paths: Vec<PathBuf>) -> Vec<FileRef> {
    paths.into_iter().map(FileRef::from).collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_schema(path: &Path) -> Result<FieldSchema> {
    FieldSchema::load(path).with_context(|| format!("Failed to load schema {}", path.display()))
}

pub fn run(command: Command, kind: BackendKind, config: &BackendConfig) -> Result<()> {
    match command {
        Command::Generate { schema, seed } => {
            let schema = load_schema(&schema)?;
            let metadata = match seed {
                Some(seed) => MetadataGenerator::with_seed(&schema, seed).generate(),
                None => MetadataGenerator::new(&schema).generate(),
            };
            print_json(&metadata)
        }
        Command::Conformance {
            schema,
            seed,
            f1,
            f2,
        } => {
            let schema = load_schema(&schema)?;
            let fixtures = match (f1, f2) {
                (Some(f1), Some(f2)) => FixtureSource::Templates { f1, f2 },
                _ => FixtureSource::Blank,
            };
            conformance(&schema, seed, &fixtures, kind, config)
        }
        command => {
            let backend = kind.build(config);
            let session = BackendSession::open(backend.as_ref())?;
            tag_command(&*session, command)?;
            session.close()?;
            Ok(())
        }
    }
}

/// Commands that operate on an open backend.
fn tag_command(backend: &dyn TagBackend, command: Command) -> Result<()> {
    match command {
        Command::Get { files } => print_json(&backend.get_tags(&file_refs(files))?),
        Command::Set {
            files,
            tags,
            schema,
        } => {
            let metadata: Metadata = tags.into_iter().collect();
            if let Some(schema) = schema {
                load_schema(&schema)?.validate(&metadata)?;
            }
            backend.set_tags(&file_refs(files), &metadata)?;
            Ok(())
        }
        Command::Copy { src, dest } => {
            backend.copy_tags(&FileRef::from(src), &FileRef::from(dest))?;
            Ok(())
        }
        Command::Move { src, dest } => {
            backend.move_tags(&FileRef::from(src), &FileRef::from(dest))?;
            Ok(())
        }
        Command::Remove { files } => {
            backend.remove_tags(&file_refs(files))?;
            Ok(())
        }
        Command::Validate { schema, files } => {
            let schema = load_schema(&schema)?;
            let tags = backend.get_tags(&file_refs(files))?;

            let mut invalid = 0;
            for (file, metadata) in &tags {
                match schema.validate(metadata) {
                    Ok(()) => println!("{}: ok", file),
                    Err(e) => {
                        invalid += 1;
                        println!("{}: {}", file, e);
                    }
                }
            }
            if invalid > 0 {
                bail!("{} of {} files have invalid tags", invalid, tags.len());
            }
            Ok(())
        }
        Command::Generate { .. } | Command::Conformance { .. } => {
            bail!("command does not use a backend")
        }
    }
}

fn conformance(
    schema: &FieldSchema,
    seed: Option<u64>,
    fixtures: &FixtureSource,
    kind: BackendKind,
    config: &BackendConfig,
) -> Result<()> {
    if schema.is_empty() {
        bail!("Conformance needs a schema with at least one field");
    }
    if kind == BackendKind::Sqlite && config.database_path.is_some() {
        warn!("Ignoring --database: each scenario uses a fresh database");
    }

    let mut suite = ConformanceSuite::new(schema);
    if let Some(seed) = seed {
        suite = suite.with_seed(seed);
    }

    let report = suite.run(fixtures, |pair: &FixturePair| {
        let config = config
            .clone()
            .with_database_path(pair.dir().join(TagConfig::SQLITE_FILE_NAME));
        Ok(kind.build(&config))
    });

    print!("{}", report);
    if !report.passed() {
        bail!("{} backend failed {} scenario(s)", report.backend, report.failures().count());
    }
    info!("{} backend conforms", report.backend);
    Ok(())
}
