//! Filetag CLI - drive a tag backend from the command line.
//!
//! Reads print pretty JSON on stdout; logs go to stderr.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use filetag_core::{BackendConfig, BackendKind};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "filetag")]
#[command(about = "Read and write file tags through a pluggable backend")]
struct Args {
    /// Enable debug logging (otherwise `RUST_LOG`, defaulting to info)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Backend configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tag backend
    #[arg(short, long, global = true, default_value = "exiftool")]
    backend: BackendKind,

    /// Tag namespace prefix (for example `XMP-rt:`)
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Write in place instead of keeping a copy of the previous state
    #[arg(long, global = true)]
    overwrite_original: bool,

    /// SQLite database location
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tags of each file
    Get {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Set tags on each file
    Set {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tag to set, as `field=value`
        #[arg(short, long = "tag", required = true, value_parser = commands::parse_tag)]
        tags: Vec<(String, String)>,

        /// Reject tags the schema does not allow
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Replace the tags of DEST with those of SRC
    Copy { src: PathBuf, dest: PathBuf },

    /// Copy the tags of SRC to DEST and clear SRC
    Move { src: PathBuf, dest: PathBuf },

    /// Clear all tags of each file
    Remove {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print a random metadata record for a schema
    Generate {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check the stored tags of each file against a schema
    Validate {
        #[arg(long)]
        schema: PathBuf,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run the conformance battery against the selected backend
    Conformance {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        /// Template copied to create the first fixture file
        #[arg(long, requires = "f2")]
        f1: Option<PathBuf>,

        /// Template copied to create the second fixture file
        #[arg(long, requires = "f1")]
        f2: Option<PathBuf>,
    },
}

impl Args {
    /// Config file contents, with command-line flags taking precedence.
    fn backend_config(&self) -> Result<BackendConfig> {
        let mut config = match &self.config {
            Some(path) => BackendConfig::from_json_file(path)?,
            None => BackendConfig::default(),
        };
        if let Some(prefix) = &self.prefix {
            config = config.with_tag_prefix(prefix.clone());
        }
        if self.overwrite_original {
            config = config.with_overwrite_original(true);
        }
        if let Some(database) = &self.database {
            config = config.with_database_path(database.clone());
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(log_filter(args.debug))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = args.backend_config()?;
    debug!("Using {} backend with {:?}", args.backend, config);

    commands::run(args.command, args.backend, &config)
}

fn log_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
