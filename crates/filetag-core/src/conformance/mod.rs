//! Backend conformance suite.
//!
//! A fixed battery of scenarios that any [`TagBackend`] must pass for a given
//! [`FieldSchema`]. Each scenario gets fresh fixture files and a freshly built
//! backend, sets up state with `set_tags`, exercises one operation and checks
//! the resulting `get_tags` snapshot against metadata produced by the
//! [`MetadataGenerator`].
//!
//! The schema must declare at least one field; the remove scenarios check that
//! written tags are visible before clearing them.
//!
//! Run the battery directly:
//!
//! ```rust,ignore
//! let suite = ConformanceSuite::new(&schema);
//! let report = suite.run(&FixtureSource::Blank, |_| Ok(MemoryBackend::new()));
//! assert!(report.passed(), "{}", report);
//! ```
//!
//! or expand it into one `#[test]` per scenario with [`conformance_tests!`].
//!
//! [`conformance_tests!`]: crate::conformance_tests

mod fixtures;

pub use fixtures::{FixturePair, FixtureSource};

use crate::backend::{BackendSession, FileRef, TagBackend, TagMap};
use crate::metadata::{Metadata, MetadataGenerator};
use crate::schema::FieldSchema;
use crate::FiletagError;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// One scenario of the battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    Empty,
    RandomReadWrite,
    PartialUpdate,
    Copy,
    CopyOverwrite,
    RemoveSingle,
    RemoveMultiple,
    Move,
    MoveOverwrite,
}

impl Scenario {
    pub const ALL: [Scenario; 9] = [
        Scenario::Empty,
        Scenario::RandomReadWrite,
        Scenario::PartialUpdate,
        Scenario::Copy,
        Scenario::CopyOverwrite,
        Scenario::RemoveSingle,
        Scenario::RemoveMultiple,
        Scenario::Move,
        Scenario::MoveOverwrite,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Empty => "empty",
            Scenario::RandomReadWrite => "random_read_write",
            Scenario::PartialUpdate => "partial_update",
            Scenario::Copy => "copy",
            Scenario::CopyOverwrite => "copy_overwrite",
            Scenario::RemoveSingle => "remove_single",
            Scenario::RemoveMultiple => "remove_multiple",
            Scenario::Move => "move",
            Scenario::MoveOverwrite => "move_overwrite",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a scenario did not pass.
#[derive(Debug, Error)]
pub enum ConformanceFailure {
    #[error("[{scenario}] {file}: expected {expected:?}, got {actual:?}")]
    Mismatch {
        scenario: Scenario,
        file: FileRef,
        expected: Metadata,
        actual: Metadata,
    },

    #[error("[{scenario}] {file}: expected tags, got none")]
    UnexpectedlyEmpty { scenario: Scenario, file: FileRef },

    #[error("[{scenario}] {file}: missing from get_tags result")]
    MissingEntry { scenario: Scenario, file: FileRef },

    #[error("[{scenario}] {operation} failed: {source}")]
    Backend {
        scenario: Scenario,
        operation: &'static str,
        #[source]
        source: FiletagError,
    },
}

impl ConformanceFailure {
    pub fn scenario(&self) -> Scenario {
        match self {
            ConformanceFailure::Mismatch { scenario, .. }
            | ConformanceFailure::UnexpectedlyEmpty { scenario, .. }
            | ConformanceFailure::MissingEntry { scenario, .. }
            | ConformanceFailure::Backend { scenario, .. } => *scenario,
        }
    }
}

type Outcome = std::result::Result<(), ConformanceFailure>;

/// Results of a full run.
#[derive(Debug)]
pub struct ConformanceReport {
    pub backend: String,
    pub results: Vec<(Scenario, Outcome)>,
}

impl ConformanceReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|(_, outcome)| outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConformanceFailure> {
        self.results
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().err())
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        writeln!(
            f,
            "{} backend: {} passed, {} failed",
            self.backend,
            self.results.len() - failed,
            failed
        )?;
        for (scenario, outcome) in &self.results {
            match outcome {
                Ok(()) => writeln!(f, "  ok    {}", scenario)?,
                Err(failure) => writeln!(f, "  FAIL  {}", failure)?,
            }
        }
        Ok(())
    }
}

/// The scenario battery for one schema.
pub struct ConformanceSuite<'a> {
    schema: &'a FieldSchema,
    seed: Option<u64>,
}

impl<'a> ConformanceSuite<'a> {
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self { schema, seed: None }
    }

    /// Make generated metadata reproducible across runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn generator(&self, scenario: Scenario) -> MetadataGenerator<'a> {
        match self.seed {
            Some(seed) => MetadataGenerator::with_seed(
                self.schema,
                seed.wrapping_add(scenario as u64),
            ),
            None => MetadataGenerator::new(self.schema),
        }
    }

    /// Run every scenario, each with fresh fixtures and a fresh backend.
    pub fn run<B, F>(&self, fixtures: &FixtureSource, mut make_backend: F) -> ConformanceReport
    where
        B: TagBackend,
        F: FnMut(&FixturePair) -> crate::Result<B>,
    {
        let mut backend_name = String::from("unknown");
        let mut results = Vec::with_capacity(Scenario::ALL.len());

        for scenario in Scenario::ALL {
            let build = |pair: &FixturePair| -> crate::Result<B> {
                let backend = make_backend(pair)?;
                backend_name = backend.name().to_string();
                Ok(backend)
            };
            let outcome = self.run_isolated(fixtures, build, scenario);
            match &outcome {
                Ok(()) => info!("{} ... ok", scenario),
                Err(failure) => info!("{} ... FAILED: {}", scenario, failure),
            }
            results.push((scenario, outcome));
        }

        ConformanceReport {
            backend: backend_name,
            results,
        }
    }

    /// Provision fixtures, build and open a backend, run one scenario, and
    /// release everything again.
    pub fn run_isolated<B, F>(
        &self,
        fixtures: &FixtureSource,
        make_backend: F,
        scenario: Scenario,
    ) -> Outcome
    where
        B: TagBackend,
        F: FnOnce(&FixturePair) -> crate::Result<B>,
    {
        let setup = |operation: &'static str| {
            move |source: FiletagError| ConformanceFailure::Backend {
                scenario,
                operation,
                source,
            }
        };

        let pair = fixtures.provision().map_err(setup("provision fixtures"))?;
        let backend = make_backend(&pair).map_err(setup("build backend"))?;
        let session = BackendSession::open(&backend).map_err(setup("open"))?;

        self.run_scenario(&*session, &pair, scenario)?;
        session.close().map_err(setup("close"))
    }

    /// Run one scenario against an open backend.
    pub fn run_scenario<B: TagBackend + ?Sized>(
        &self,
        backend: &B,
        fixtures: &FixturePair,
        scenario: Scenario,
    ) -> Outcome {
        debug!("Running {} against {}", scenario, backend.name());
        let mut generator = self.generator(scenario);
        let check = Check {
            scenario,
            backend,
            f1: &fixtures.f1,
            f2: &fixtures.f2,
        };

        match scenario {
            Scenario::Empty => check.empty(),
            Scenario::RandomReadWrite => check.random_read_write(&mut generator),
            Scenario::PartialUpdate => check.partial_update(&mut generator),
            Scenario::Copy => check.copy(&mut generator),
            Scenario::CopyOverwrite => check.copy_overwrite(&mut generator),
            Scenario::RemoveSingle => check.remove_single(&mut generator),
            Scenario::RemoveMultiple => check.remove_multiple(&mut generator),
            Scenario::Move => check.move_tags(&mut generator),
            Scenario::MoveOverwrite => check.move_overwrite(&mut generator),
        }
    }
}

/// Backend calls and assertions for one scenario over `f1` and `f2`.
struct Check<'b, B: TagBackend + ?Sized> {
    scenario: Scenario,
    backend: &'b B,
    f1: &'b FileRef,
    f2: &'b FileRef,
}

impl<B: TagBackend + ?Sized> Check<'_, B> {
    fn backend_err(&self, operation: &'static str) -> impl FnOnce(FiletagError) -> ConformanceFailure {
        let scenario = self.scenario;
        move |source| ConformanceFailure::Backend {
            scenario,
            operation,
            source,
        }
    }

    /// Read both fixtures; the result must hold an entry for each.
    fn read(&self) -> std::result::Result<TagMap, ConformanceFailure> {
        let tags = self
            .backend
            .get_tags(&[self.f1.clone(), self.f2.clone()])
            .map_err(self.backend_err("get_tags"))?;
        debug!("read_metadata: {:?}", tags);

        for file in [self.f1, self.f2] {
            if !tags.contains_key(file) {
                return Err(ConformanceFailure::MissingEntry {
                    scenario: self.scenario,
                    file: file.clone(),
                });
            }
        }
        Ok(tags)
    }

    fn set(&self, files: &[&FileRef], metadata: &Metadata) -> Outcome {
        let files: Vec<FileRef> = files.iter().map(|&f| f.clone()).collect();
        self.backend
            .set_tags(&files, metadata)
            .map_err(self.backend_err("set_tags"))
    }

    fn expect(&self, tags: &TagMap, file: &FileRef, expected: &Metadata) -> Outcome {
        let actual = tags.get(file).cloned().unwrap_or_default();
        if &actual == expected {
            Ok(())
        } else {
            Err(ConformanceFailure::Mismatch {
                scenario: self.scenario,
                file: file.clone(),
                expected: expected.clone(),
                actual,
            })
        }
    }

    fn expect_empty(&self, tags: &TagMap, file: &FileRef) -> Outcome {
        self.expect(tags, file, &Metadata::new())
    }

    fn expect_tagged(&self, tags: &TagMap, file: &FileRef) -> Outcome {
        match tags.get(file) {
            Some(metadata) if !metadata.is_empty() => Ok(()),
            _ => Err(ConformanceFailure::UnexpectedlyEmpty {
                scenario: self.scenario,
                file: file.clone(),
            }),
        }
    }

    fn empty(&self) -> Outcome {
        let tags = self.read()?;
        self.expect_empty(&tags, self.f1)?;
        self.expect_empty(&tags, self.f2)
    }

    fn random_read_write(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        let metadata = generator.generate();
        self.set(&[self.f1, self.f2], &metadata)?;

        let tags = self.read()?;
        self.expect(&tags, self.f1, &metadata)?;
        self.expect(&tags, self.f2, &metadata)?;

        let new_metadata = generator.generate();
        self.set(&[self.f1], &new_metadata)?;

        let tags = self.read()?;
        self.expect(&tags, self.f1, &new_metadata)?;
        self.expect(&tags, self.f2, &metadata)
    }

    /// Writing one field leaves the other fields of the file alone.
    fn partial_update(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        let metadata = generator.generate();
        self.set(&[self.f1], &metadata)?;

        let update: Metadata = generator.generate().into_iter().take(1).collect();
        self.set(&[self.f1], &update)?;

        let mut expected = metadata;
        expected.extend(update);
        let tags = self.read()?;
        self.expect(&tags, self.f1, &expected)?;
        self.expect_empty(&tags, self.f2)
    }

    fn copy(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        let metadata = generator.generate();
        self.set(&[self.f1], &metadata)?;

        let tags = self.read()?;
        self.expect(&tags, self.f1, &metadata)?;
        self.expect_empty(&tags, self.f2)?;

        self.backend
            .copy_tags(self.f1, self.f2)
            .map_err(self.backend_err("copy_tags"))?;

        let tags = self.read()?;
        self.expect(&tags, self.f1, &metadata)?;
        self.expect(&tags, self.f2, &metadata)
    }

    fn copy_overwrite(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        let src_md = generator.generate();
        let dest_md = generator.generate();

        self.set(&[self.f1], &src_md)?;
        self.set(&[self.f2], &dest_md)?;
        let tags = self.read()?;
        self.expect(&tags, self.f1, &src_md)?;
        self.expect(&tags, self.f2, &dest_md)?;

        self.backend
            .copy_tags(self.f1, self.f2)
            .map_err(self.backend_err("copy_tags"))?;

        let tags = self.read()?;
        self.expect(&tags, self.f1, &src_md)?;
        self.expect(&tags, self.f2, &src_md)
    }

    fn remove_single(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        self.set(&[self.f1, self.f2], &generator.generate())?;
        let tags = self.read()?;
        self.expect_tagged(&tags, self.f1)?;
        self.expect_tagged(&tags, self.f2)?;

        self.backend
            .remove_tags(&[self.f1.clone()])
            .map_err(self.backend_err("remove_tags"))?;
        let tags = self.read()?;
        self.expect_empty(&tags, self.f1)?;
        self.expect_tagged(&tags, self.f2)?;

        self.backend
            .remove_tags(&[self.f2.clone()])
            .map_err(self.backend_err("remove_tags"))?;
        let tags = self.read()?;
        self.expect_empty(&tags, self.f1)?;
        self.expect_empty(&tags, self.f2)
    }

    fn remove_multiple(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        self.set(&[self.f1, self.f2], &generator.generate())?;
        let tags = self.read()?;
        self.expect_tagged(&tags, self.f1)?;
        self.expect_tagged(&tags, self.f2)?;

        self.backend
            .remove_tags(&[self.f1.clone(), self.f2.clone()])
            .map_err(self.backend_err("remove_tags"))?;
        let tags = self.read()?;
        self.expect_empty(&tags, self.f1)?;
        self.expect_empty(&tags, self.f2)
    }

    fn move_tags(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        let metadata = generator.generate();
        self.set(&[self.f1], &metadata)?;

        let tags = self.read()?;
        self.expect(&tags, self.f1, &metadata)?;
        self.expect_empty(&tags, self.f2)?;

        self.backend
            .move_tags(self.f1, self.f2)
            .map_err(self.backend_err("move_tags"))?;

        let tags = self.read()?;
        self.expect_empty(&tags, self.f1)?;
        self.expect(&tags, self.f2, &metadata)
    }

    fn move_overwrite(&self, generator: &mut MetadataGenerator<'_>) -> Outcome {
        let md1 = generator.generate();
        let md2 = generator.generate();

        self.set(&[self.f1], &md1)?;
        self.set(&[self.f2], &md2)?;
        let tags = self.read()?;
        self.expect(&tags, self.f1, &md1)?;
        self.expect(&tags, self.f2, &md2)?;

        self.backend
            .move_tags(self.f2, self.f1)
            .map_err(self.backend_err("move_tags"))?;

        let tags = self.read()?;
        self.expect(&tags, self.f1, &md2)?;
        self.expect_empty(&tags, self.f2)
    }
}

/// Expand the conformance battery into one `#[test]` per scenario.
///
/// `$schema` builds the [`FieldSchema`]; `$make_backend` is a closure from
/// `&FixturePair` to `Result<impl TagBackend>`. An optional third argument
/// picks the [`FixtureSource`] (blank files by default).
///
/// ```rust,ignore
/// mod sqlite {
///     use super::*;
///     filetag_core::conformance_tests!(color_schema(), |pair: &FixturePair| {
///         Ok(SqliteBackend::new(pair.dir().join("tags.sqlite"), ""))
///     });
/// }
/// ```
#[macro_export]
macro_rules! conformance_tests {
    (@scenarios $schema:expr, $make_backend:expr, $fixtures:expr;
        $($test:ident => $scenario:ident),* $(,)?) => {
        $(
            #[test]
            fn $test() {
                let schema = $schema;
                let suite = $crate::conformance::ConformanceSuite::new(&schema);
                let fixtures = $fixtures;
                if let Err(failure) = suite.run_isolated(
                    &fixtures,
                    $make_backend,
                    $crate::conformance::Scenario::$scenario,
                ) {
                    panic!("{}", failure);
                }
            }
        )*
    };
    ($schema:expr, $make_backend:expr) => {
        $crate::conformance_tests!(
            $schema,
            $make_backend,
            $crate::conformance::FixtureSource::Blank
        );
    };
    ($schema:expr, $make_backend:expr, $fixtures:expr) => {
        $crate::conformance_tests!(@scenarios $schema, $make_backend, $fixtures;
            empty => Empty,
            random_read_write => RandomReadWrite,
            partial_update => PartialUpdate,
            copy => Copy,
            copy_overwrite => CopyOverwrite,
            remove_single => RemoveSingle,
            remove_multiple => RemoveMultiple,
            move_tags => Move,
            move_overwrite => MoveOverwrite,
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::schema::{FieldType, MetadataField};
    use crate::Result;

    fn schema() -> FieldSchema {
        FieldSchema::from_fields(vec![
            MetadataField::enumeration("color", ["red", "blue"]),
            MetadataField::new("title", FieldType::String),
            MetadataField::new("captured", FieldType::Date),
        ])
        .unwrap()
    }

    enum Fault {
        /// Copies by merging instead of replacing.
        MergingCopy,
        /// Writes replace the whole record instead of updating fields.
        ReplacingSet,
    }

    /// Memory backend with one deliberate contract violation.
    struct Faulty(MemoryBackend, Fault);

    impl TagBackend for Faulty {
        fn name(&self) -> &'static str {
            "faulty"
        }
        fn open(&self) -> Result<()> {
            self.0.open()
        }
        fn close(&self) -> Result<()> {
            self.0.close()
        }
        fn is_open(&self) -> bool {
            self.0.is_open()
        }
        fn get_tags(&self, files: &[FileRef]) -> Result<TagMap> {
            self.0.get_tags(files)
        }
        fn set_tags(&self, files: &[FileRef], metadata: &Metadata) -> Result<()> {
            if let Fault::ReplacingSet = self.1 {
                self.0.remove_tags(files)?;
            }
            self.0.set_tags(files, metadata)
        }
        fn copy_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
            if let Fault::ReplacingSet = self.1 {
                return self.0.copy_tags(src, dest);
            }
            let mut snapshot = self.0.get_tags(&[src.clone()])?;
            let mut metadata = snapshot.remove(src).unwrap_or_default();
            metadata.insert("extra".to_string(), "left-over".to_string());
            self.0.set_tags(&[dest.clone()], &metadata)
        }
        fn move_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
            self.0.move_tags(src, dest)
        }
        fn remove_tags(&self, files: &[FileRef]) -> Result<()> {
            self.0.remove_tags(files)
        }
    }

    #[test]
    fn test_memory_backend_passes() {
        let schema = schema();
        let report = ConformanceSuite::new(&schema)
            .with_seed(7)
            .run(&FixtureSource::Blank, |_| Ok(MemoryBackend::new()));

        assert!(report.passed(), "{}", report);
        assert_eq!(report.results.len(), Scenario::ALL.len());
        assert_eq!(report.backend, "memory");
    }

    #[test]
    fn test_merging_copy_is_reported() {
        let schema = schema();
        let report = ConformanceSuite::new(&schema).run(&FixtureSource::Blank, |_| {
            Ok(Faulty(MemoryBackend::new(), Fault::MergingCopy))
        });

        assert!(!report.passed());
        let failed: Vec<Scenario> = report.failures().map(|f| f.scenario()).collect();
        assert_eq!(failed, vec![Scenario::Copy, Scenario::CopyOverwrite]);

        let message = report.failures().next().unwrap().to_string();
        assert!(message.starts_with("[copy]"));
        assert!(message.contains("f2.tif"));
    }

    #[test]
    fn test_replacing_set_is_reported() {
        let schema = schema();
        let report = ConformanceSuite::new(&schema).run(&FixtureSource::Blank, |_| {
            Ok(Faulty(MemoryBackend::new(), Fault::ReplacingSet))
        });

        let failed: Vec<Scenario> = report.failures().map(|f| f.scenario()).collect();
        assert_eq!(failed, vec![Scenario::PartialUpdate]);
    }

    #[test]
    fn test_backend_error_names_operation() {
        let schema = schema();
        let outcome = ConformanceSuite::new(&schema).run_isolated(
            &FixtureSource::Blank,
            |_| -> Result<MemoryBackend> { Err(FiletagError::Other("no store".into())) },
            Scenario::Empty,
        );

        match outcome {
            Err(ConformanceFailure::Backend { operation, .. }) => {
                assert_eq!(operation, "build backend")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_backend_closed_after_failure() {
        let schema = schema();
        let fixtures = FixturePair::blank().unwrap();
        let backend = Faulty(MemoryBackend::new(), Fault::MergingCopy);
        {
            let session = BackendSession::open(&backend).unwrap();
            let outcome = ConformanceSuite::new(&schema).run_scenario(
                &*session,
                &fixtures,
                Scenario::CopyOverwrite,
            );
            assert!(outcome.is_err());
        }
        assert!(!backend.is_open());
    }
}
