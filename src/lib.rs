//! dupindex - Persistent File Index and Duplicate Resolution Engine
//!
//! Maintains a per-target index of file content digests (BLAKE3) in
//! SQLite, reconciles it incrementally against the filesystem, derives
//! byte-identical duplicate groups on demand, and resolves groups by
//! quarantining or deleting non-canonical copies.

pub mod actions;
pub mod cli;
pub mod duplicates;
pub mod error;
pub mod identity;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod store;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;

use actions::ResolutionEngine;
use cli::Cli;
use duplicates::DuplicateIndex;
use error::ExitCode;
use progress::Progress;
use scanner::IncrementalScanner;
use store::RecordStore;

/// Default backing-store path for a target: a per-target file in the
/// platform data directory, named after the target's basename.
pub fn default_store_path(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    let dirs = directories::ProjectDirs::from("com", "dupindex", "dupindex")
        .context("failed to determine platform data directory")?;
    let dir = dirs.data_local_dir();
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create data directory {}", dir.display()))?;
    Ok(dir.join(format!("{}.db", name)))
}

/// Default quarantine root: `<target-name>-quarantine` next to the
/// target, so quarantined files never re-enter the scanned tree.
fn default_quarantine_root(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dupindex".to_string());
    target
        .parent()
        .unwrap_or(target)
        .join(format!("{}-quarantine", name))
}

/// Run the application logic for a parsed command line.
///
/// # Errors
///
/// Returns an error only for unrecoverable failures: the target is
/// unusable, the store file cannot be removed under `--force`, or the
/// store cannot be opened. Per-file scan and resolution failures are
/// reported in the console output and do not fail the run.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let target = cli
        .target
        .canonicalize()
        .with_context(|| format!("cannot access target directory {}", cli.target.display()))?;

    let store_path = match cli.db {
        Some(ref path) => path.clone(),
        None => default_store_path(&target)?,
    };

    if cli.force && store_path.exists() {
        fs::remove_file(&store_path).with_context(|| {
            format!("cannot remove existing index {}", store_path.display())
        })?;
        log::info!("Removed existing index {}", store_path.display());
    }

    let mut store = RecordStore::open(&store_path)
        .with_context(|| format!("cannot open index {}", store_path.display()))?;

    let progress = Arc::new(Progress::new(cli.quiet));
    let outcome = IncrementalScanner::new(&mut store)
        .with_progress(progress)
        .scan(&target)
        .context("scan failed")?;

    if !cli.quiet {
        print_scan_summary(&outcome);
        print_duplicates(&store, cli.details)?;
    }

    if cli.auto_remove || cli.delete {
        resolve_all(&mut store, &target, cli.quarantine.as_deref(), cli.delete, cli.quiet)?;
    }

    store.close();
    Ok(ExitCode::Success)
}

fn print_scan_summary(outcome: &scanner::ScanOutcome) {
    println!(
        "Scan complete in {:.2?} ({:.0} files/s)",
        outcome.elapsed,
        outcome.files_per_second()
    );
    println!(
        "  new: {} ({}), unchanged: {}, removed: {} ({}), skipped: {}",
        outcome.new_files,
        ByteSize::b(outcome.new_bytes),
        outcome.unchanged_files,
        outcome.removed_files,
        ByteSize::b(outcome.removed_bytes),
        outcome.skipped_files
    );
    println!(
        "  indexed: {} file(s), {}",
        outcome.total_files,
        ByteSize::b(outcome.total_bytes)
    );
}

fn print_duplicates(store: &RecordStore, details: bool) -> Result<()> {
    let index = DuplicateIndex::new(store);
    let groups = index.list_groups()?;

    if groups.is_empty() {
        println!("No duplicates found.");
        return Ok(());
    }

    println!(
        "{} duplicate group(s), {} reclaimable:",
        groups.len(),
        ByteSize::b(index.reclaimable_bytes()?)
    );
    for group in &groups {
        println!(
            "  {} x{} ({} each) {}",
            &group.digest[..group.digest.len().min(12)],
            group.count,
            ByteSize::b(group.size),
            group.representative
        );
        if details {
            for member in index.members(&group.digest)? {
                println!("    {}", member.path);
            }
        }
    }
    Ok(())
}

fn resolve_all(
    store: &mut RecordStore,
    target: &Path,
    quarantine: Option<&Path>,
    delete: bool,
    quiet: bool,
) -> Result<()> {
    let base = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| target.to_path_buf(), Path::to_path_buf);
    let quarantine_root =
        quarantine.map_or_else(|| default_quarantine_root(target), Path::to_path_buf);

    let digests: Vec<String> = DuplicateIndex::new(store)
        .list_groups()?
        .into_iter()
        .map(|g| g.digest)
        .collect();

    let mut engine = ResolutionEngine::new(store, &base, &quarantine_root);
    let mut resolved = 0usize;
    let mut failed = 0usize;
    let mut freed = 0u64;
    for digest in &digests {
        let outcome = if delete {
            engine.delete_duplicates(digest)?
        } else {
            engine.keep_original(digest)?
        };
        resolved += outcome.resolved_count();
        failed += outcome.failure_count();
        freed += outcome.freed_bytes;
    }

    if !quiet {
        let verb = if delete { "Deleted" } else { "Quarantined" };
        if failed == 0 {
            println!("{} {} file(s), freed {}", verb, resolved, ByteSize::b(freed));
        } else {
            println!(
                "{} {} file(s), {} failed, freed {}",
                verb,
                resolved,
                failed,
                ByteSize::b(freed)
            );
        }
    }
    Ok(())
}
