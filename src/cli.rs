//! Command-line interface definitions.
//!
//! All arguments use the clap derive API. The binary has a single
//! operation: index a target directory, report duplicate groups, and
//! optionally resolve them.
//!
//! # Example
//!
//! ```bash
//! # Index a directory and list duplicate groups
//! dupindex ~/Downloads
//!
//! # Rebuild the index from scratch
//! dupindex ~/Downloads --force
//!
//! # Show every member path per group
//! dupindex ~/Downloads --details
//!
//! # Quarantine non-canonical duplicates
//! dupindex ~/Downloads --auto-remove
//! ```

use clap::Parser;
use std::path::PathBuf;

/// Persistent file index and duplicate resolution engine.
///
/// dupindex maintains a per-target index of file content digests,
/// reports byte-identical duplicate groups, and can quarantine or
/// delete the non-canonical copies.
#[derive(Debug, Parser)]
#[command(name = "dupindex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to index and check for duplicates
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Drop any existing index for this target and rebuild from scratch
    #[arg(long)]
    pub force: bool,

    /// Print every member path for each duplicate group
    #[arg(long)]
    pub details: bool,

    /// Move non-canonical duplicates into the quarantine tree after scanning
    #[arg(long, conflicts_with = "delete")]
    pub auto_remove: bool,

    /// Delete non-canonical duplicates outright after scanning
    ///
    /// Warning: Files cannot be recovered after deletion.
    #[arg(long)]
    pub delete: bool,

    /// Path to the index database
    ///
    /// If not specified, a per-target file in the platform data
    /// directory is used.
    #[arg(long, value_name = "PATH", env = "DUPINDEX_DB")]
    pub db: Option<PathBuf>,

    /// Quarantine root directory
    ///
    /// Defaults to "<target-name>-quarantine" next to the target.
    #[arg(long, value_name = "PATH")]
    pub quarantine: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}
