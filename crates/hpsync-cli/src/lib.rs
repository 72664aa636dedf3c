//! hpsync - release hash sync for the hp Scoop bucket
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves the release version from `Cargo.toml`, hashes every
//! architecture's build artifact, checkpoints the digests and writes them
//! into each manifest mirror of the bucket.
//!
//! # Recovery
//!
//! ```text
//! hpsync hash     # resolve + hash + checkpoint, mirrors untouched
//! hpsync apply    # load the checkpoint, apply to every mirror
//! hpsync sync     # both, resuming from a matching checkpoint if present
//! ```

pub mod cmd;
pub mod ui;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hpsync")]
#[command(author, version, about = "hpsync - release hash sync for the hp Scoop bucket")]
pub struct Cli {
    /// Release configuration file
    #[arg(long, global = true, env = "HPSYNC_CONFIG", default_value = "hpsync.toml")]
    pub config: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging (sets the default log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the current and previous version
    Version,
    /// Hash every artifact and write the checkpoint; mirrors are not touched
    Hash,
    /// Apply the saved checkpoint to every mirror (recovery)
    Apply,
    /// Run the whole pipeline
    Sync {
        /// Always hash, ignoring any checkpoint
        #[arg(long, conflicts_with = "resume")]
        fresh: bool,
        /// Require a checkpoint for the current version
        #[arg(long)]
        resume: bool,
    },
    /// Compute SHA256 of local files (for manifest authoring)
    Digest {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the changelog section for a release
    Notes {
        /// Release tag (defaults to v<current version>)
        #[arg(long)]
        tag: Option<String>,
    },
    /// Create a GitHub release and upload assets
    Publish(PublishArgs),
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Release tag (defaults to v<current version>)
    #[arg(long)]
    pub tag: Option<String>,
    /// Release title (defaults to "hp <version>")
    #[arg(long)]
    pub name: Option<String>,
    /// Release body; overrides --notes-file
    #[arg(long)]
    pub notes: Option<String>,
    /// File to read release notes from (defaults to the configured changelog)
    #[arg(long)]
    pub notes_file: Option<PathBuf>,
    /// Create a draft release
    #[arg(long)]
    pub draft: bool,
    /// Mark the release as a prerelease
    #[arg(long)]
    pub prerelease: bool,
    /// Target commitish
    #[arg(long, default_value = "main")]
    pub target: String,
    /// Asset to upload (repeatable)
    #[arg(long, value_name = "PATH")]
    pub attach: Vec<PathBuf>,
    /// Reuse the release when the tag already exists
    #[arg(long)]
    pub allow_existing: bool,
    /// Show the payload without calling the API
    #[arg(long)]
    pub dry_run: bool,
}
