//! ExifTool-backed tags.
//!
//! Tags are written into the files themselves by invoking the external
//! `exiftool` command. Custom namespaces (for example `XMP-rt:`) are defined in
//! an ExifTool config file passed with `-config`.
//!
//! Because the tags travel inside the file, `copy_tags` and `move_tags` copy or
//! move the file itself.

use super::traits::{
    empty_tag_map, ensure_source_exists, same_file, FileRef, OpenFlag, TagBackend, TagMap,
};
use crate::config::BackendConfig;
use crate::metadata::Metadata;
use crate::{FiletagError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

const SOURCE_FILE_KEY: &str = "SourceFile";

pub struct ExifToolBackend {
    exec_cmd: String,
    config_path: Option<PathBuf>,
    tag_prefix: Option<String>,
    overwrite_original: bool,
    open: OpenFlag,
}

impl ExifToolBackend {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            exec_cmd: config.exec_cmd.clone(),
            config_path: config.exiftool_config.clone(),
            tag_prefix: config.tag_prefix.clone(),
            overwrite_original: config.overwrite_original,
            open: OpenFlag::default(),
        }
    }

    /// Command-line form of a tag, qualified with the prefix unless the tag
    /// already carries it.
    pub fn tag_arg(&self, tag: &str) -> String {
        match &self.tag_prefix {
            Some(prefix) if !tag.starts_with(prefix.as_str()) => format!("-{}{}", prefix, tag),
            _ => format!("-{}", tag),
        }
    }

    fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.exec_cmd);
        if let Some(config_path) = &self.config_path {
            cmd.arg("-config").arg(config_path);
        }
        cmd.args(args);
        debug!("exiftool command: {:?}", cmd);
        cmd
    }

    fn run(&self, args: &[OsString]) -> Result<Output> {
        self.command(args).output().map_err(|e| FiletagError::Tool {
            command: self.exec_cmd.clone(),
            message: format!("failed to execute: {}", e),
            exit_code: None,
        })
    }

    /// Run a writing command and surface a non-zero exit.
    fn run_checked(&self, args: &[OsString]) -> Result<()> {
        let output = self.run(args)?;
        debug!("Stdout: {}", String::from_utf8_lossy(&output.stdout).trim());
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!("Stderr: {}", stderr);
        Err(FiletagError::Tool {
            command: self.exec_cmd.clone(),
            message: stderr,
            exit_code: output.status.code(),
        })
    }

    fn write_args(&self, files: &[FileRef], metadata: &Metadata) -> Vec<OsString> {
        let mut args: Vec<OsString> = files.iter().map(path_arg).collect();
        args.extend(
            metadata
                .iter()
                .map(|(tag, value)| format!("{}={}", self.tag_arg(tag), value).into()),
        );
        if self.overwrite_original {
            args.push("-overwrite_original".into());
        }
        args
    }

    fn clear_args(&self, files: &[FileRef]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![format!("{}=", self.tag_arg("all")).into()];
        args.extend(files.iter().map(path_arg));
        if self.overwrite_original {
            args.push("-overwrite_original".into());
        }
        args
    }

    fn read_args(&self, files: &[FileRef]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-json".into(), self.tag_arg("*").into()];
        args.extend(files.iter().map(path_arg));
        args
    }
}

/// The tool sees plain paths; `file://` references are stripped.
fn path_arg(file: &FileRef) -> OsString {
    file.as_path().as_os_str().to_owned()
}

/// Turn `exiftool -json` output into a tag map.
///
/// Records are matched back to the requested references through their
/// `SourceFile` path; tag names are lowercased and scalar values rendered as
/// text. Output that does not parse yields an empty record for every requested
/// file.
pub(crate) fn parse_json_output(stdout: &[u8], files: &[FileRef]) -> TagMap {
    let records: Vec<Map<String, Value>> = match serde_json::from_slice(stdout) {
        Ok(records) => records,
        Err(e) => {
            debug!("JSONDecodeError: {}", e);
            return empty_tag_map(files);
        }
    };

    let requested: HashMap<&Path, &FileRef> =
        files.iter().map(|file| (file.as_path(), file)).collect();

    let mut result = TagMap::new();
    for record in records {
        let Some(source) = record.get(SOURCE_FILE_KEY).and_then(Value::as_str) else {
            continue;
        };
        let source = requested
            .get(Path::new(source))
            .map(|&file| file.clone())
            .unwrap_or_else(|| FileRef::from(source));
        let metadata: Metadata = record
            .iter()
            .filter(|(key, _)| key.as_str() != SOURCE_FILE_KEY)
            .filter_map(|(key, value)| value_as_text(value).map(|v| (key.to_lowercase(), v)))
            .collect();
        result.insert(source, metadata);
    }

    for file in files {
        result.entry(file.clone()).or_default();
    }
    result
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent).map_err(|e| FiletagError::io_with_path(e, parent))
        }
        _ => Ok(()),
    }
}

impl TagBackend for ExifToolBackend {
    fn name(&self) -> &'static str {
        "exiftool"
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

        let output = self.run(&self.read_args(files))?;

        Ok(parse_json_output(&output.stdout, files))
    }

    fn set_tags(&self, files: &[FileRef], metadata: &Metadata) -> Result<()> {
        self.open.ensure(self.name())?;
        if files.is_empty() || metadata.is_empty() {
            return Ok(());
        }
        self.run_checked(&self.write_args(files, metadata))
    }

    fn copy_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        self.open.ensure(self.name())?;
        ensure_source_exists(src)?;
        if same_file(src, dest) {
            return Ok(());
        }

        ensure_parent_dir(dest.as_path())?;
        fs::copy(src.as_path(), dest.as_path())
            .map_err(|e| FiletagError::io_with_path(e, dest.as_path()))?;
        debug!("Copied {} -> {}", src, dest);
        Ok(())
    }

    fn move_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        self.open.ensure(self.name())?;
        ensure_source_exists(src)?;
        if same_file(src, dest) {
            return Ok(());
        }

        ensure_parent_dir(dest.as_path())?;
        if let Err(e) = fs::rename(src.as_path(), dest.as_path()) {
            // Cross-device moves cannot be renamed.
            warn!("Rename {} -> {} failed ({}), copying instead", src, dest, e);
            fs::copy(src.as_path(), dest.as_path())
                .map_err(|e| FiletagError::io_with_path(e, dest.as_path()))?;
            fs::remove_file(src.as_path())
                .map_err(|e| FiletagError::io_with_path(e, src.as_path()))?;
        }
        debug!("Moved {} -> {}", src, dest);
        Ok(())
    }

    fn remove_tags(&self, files: &[FileRef]) -> Result<()> {
        self.open.ensure(self.name())?;

        // A file that is gone carries no tags.
        let existing: Vec<FileRef> = files
            .iter()
            .filter(|f| f.as_path().exists())
            .cloned()
            .collect();
        if existing.is_empty() {
            return Ok(());
        }
        self.run_checked(&self.clear_args(&existing))
    }
}
