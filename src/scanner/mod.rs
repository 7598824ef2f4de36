//! Incremental directory scanning against the record store.
//!
//! The scanner reconciles the persistent index with the filesystem:
//! files already present by identity are skipped without re-hashing,
//! new files are hashed and inserted, and records whose paths have
//! vanished from disk are purged. Per-file failures never abort the
//! scan; only a store failure or an unreadable root is fatal.
//!
//! # Traversal
//!
//! Depth-first, children sorted by file name for a deterministic
//! order. Symlinks are not followed. Paths are recorded relative to
//! the *parent* of the scanned target, so every record path carries
//! the target directory's own name as its first segment; that keeps
//! records unambiguous if the target is ever rescanned under a
//! different parent.
//!
//! The tree is walked twice: a cheap metadata-only pass that counts
//! files, then the processing pass. The pre-computed total keeps
//! progress percentages and ETA stable.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::scanner::IncrementalScanner;
//! use dupindex::store::RecordStore;
//! use std::path::Path;
//!
//! let mut store = RecordStore::open(Path::new("photos.db")).unwrap();
//! let outcome = IncrementalScanner::new(&mut store)
//!     .scan(Path::new("/home/user/photos"))
//!     .unwrap();
//! println!("{} new, {} removed", outcome.new_files, outcome.removed_files);
//! ```

pub mod hasher;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use walkdir::WalkDir;

use crate::identity::PathIdentity;
use crate::progress::ProgressCallback;
use crate::store::{meta, FileRecord, RecordStore, StoreError};
use self::hasher::Hasher;

/// Errors that are fatal to a whole scan.
///
/// Per-file stat/hash/insert failures are not represented here; they
/// are logged, counted in [`ScanOutcome::skipped_files`], and the scan
/// continues.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The target path was not found.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The target path is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The target directory itself could not be read.
    #[error("cannot read directory {path}: {source}")]
    RootIo {
        /// The unreadable directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The record store failed; the index state can no longer be trusted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How an invocation relates to prior scans of the same store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// No prior scan metadata; every discovered file is a new insert.
    #[default]
    Fresh,
    /// Prior metadata exists; reconciliation purges vanished records
    /// before traversal. A missing end timestamp additionally means the
    /// prior run never completed.
    Resume,
}

/// Aggregate result of one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Mode this scan ran in.
    pub mode: ScanMode,
    /// Files inserted into the index.
    pub new_files: u64,
    /// Bytes of newly indexed content.
    pub new_bytes: u64,
    /// Records purged because their paths vanished from disk.
    pub removed_files: u64,
    /// Bytes freed from the index by purged records.
    pub removed_bytes: u64,
    /// Files skipped because their identity was already indexed.
    pub unchanged_files: u64,
    /// Files skipped due to per-file errors.
    pub skipped_files: u64,
    /// Records in the index after the scan.
    pub total_files: u64,
    /// Total indexed bytes after the scan.
    pub total_bytes: u64,
    /// Wall-clock scan duration.
    pub elapsed: Duration,
}

impl ScanOutcome {
    /// Processing throughput over new plus unchanged files.
    #[must_use]
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.new_files + self.unchanged_files) as f64 / secs
    }
}

/// Walks a target tree and reconciles it against the record store.
///
/// The scanner is the only writer of record inserts and purges. It
/// hashes strictly one file at a time; there is no parallel hashing,
/// which keeps the pre-computed progress total exact.
pub struct IncrementalScanner<'a> {
    store: &'a mut RecordStore,
    hasher: Hasher,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<'a> IncrementalScanner<'a> {
    /// Create a scanner writing through the given store handle.
    #[must_use]
    pub fn new(store: &'a mut RecordStore) -> Self {
        Self {
            store,
            hasher: Hasher::new(),
            progress: None,
        }
    }

    /// Attach a progress collaborator.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn phase_start(&self, phase: &str, total: u64) {
        if let Some(ref p) = self.progress {
            p.on_phase_start(phase, total);
        }
    }

    fn phase_end(&self, phase: &str) {
        if let Some(ref p) = self.progress {
            p.on_phase_end(phase);
        }
    }

    fn report(&self, current: u64, path: &Path) {
        if let Some(ref p) = self.progress {
            p.on_progress(current, &path.to_string_lossy());
        }
    }

    /// Run one scan of `target`.
    ///
    /// # Errors
    ///
    /// Fatal only for an unusable target directory or a store failure.
    pub fn scan(&mut self, target: &Path) -> Result<ScanOutcome, ScanError> {
        let start = Instant::now();

        if !target.exists() {
            return Err(ScanError::NotFound(target.to_path_buf()));
        }
        if !target.is_dir() {
            return Err(ScanError::NotADirectory(target.to_path_buf()));
        }
        // Root readability is fatal; everything below it is per-file.
        std::fs::read_dir(target).map_err(|source| ScanError::RootIo {
            path: target.to_path_buf(),
            source,
        })?;

        let base = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| target.to_path_buf(), Path::to_path_buf);

        let mode = if self
            .store
            .get_meta::<String>(meta::SCAN_STARTED)?
            .is_some()
        {
            ScanMode::Resume
        } else {
            ScanMode::Fresh
        };

        let prior_incomplete = mode == ScanMode::Resume
            && self.store.get_meta::<String>(meta::SCAN_ENDED)?.is_none();
        if prior_incomplete {
            log::info!("Prior scan did not record an end time; resuming");
        }

        let target_name = target
            .file_name()
            .map_or_else(|| target.to_string_lossy().into_owned(), |n| {
                n.to_string_lossy().into_owned()
            });

        self.store
            .set_meta(meta::SCAN_STARTED, &Utc::now().to_rfc3339())?;
        self.store.delete_meta(meta::SCAN_ENDED)?;
        self.store.set_meta(meta::TARGET, &target_name)?;
        self.store
            .set_meta(meta::BASE_PATH, &base.to_string_lossy())?;

        let mut outcome = ScanOutcome {
            mode,
            ..ScanOutcome::default()
        };

        if mode == ScanMode::Resume {
            self.reconcile(&base, &mut outcome)?;
        }

        // Pre-pass: count files so progress percentages are stable.
        self.phase_start("counting", 0);
        let total = count_files(target);
        self.phase_end("counting");

        self.phase_start("indexing", total);
        let mut processed = 0u64;
        for entry in WalkDir::new(target).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    outcome.skipped_files += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            processed += 1;
            self.report(processed, entry.path());
            self.process_file(&base, entry.path(), &mut outcome);
        }
        self.phase_end("indexing");

        let (total_files, total_bytes) = self.store.totals()?;
        outcome.total_files = total_files;
        outcome.total_bytes = total_bytes;

        self.store
            .set_meta(meta::SCAN_ENDED, &Utc::now().to_rfc3339())?;

        outcome.elapsed = start.elapsed();
        log::info!(
            "Scan complete: {} new, {} unchanged, {} removed, {} skipped in {:.2?}",
            outcome.new_files,
            outcome.unchanged_files,
            outcome.removed_files,
            outcome.skipped_files,
            outcome.elapsed
        );
        Ok(outcome)
    }

    /// Purge records whose paths no longer exist on disk.
    ///
    /// This is the only place stale records are removed, and the batch
    /// of deletes runs in a single store transaction: a crash mid-pass
    /// applies either all purges or none.
    fn reconcile(&mut self, base: &Path, outcome: &mut ScanOutcome) -> Result<(), ScanError> {
        let mut missing: Vec<(String, u64, String)> = Vec::new();
        self.store.for_each_record(|record| {
            let absolute = base.join(&record.path);
            if !absolute.exists() {
                missing.push((record.id, record.size, record.path));
            }
        })?;

        if missing.is_empty() {
            log::debug!("Reconciliation: no stale records");
            return Ok(());
        }

        for (_, _, path) in &missing {
            log::debug!("Purging vanished file: {}", path);
        }

        let ids: Vec<String> = missing.iter().map(|(id, _, _)| id.clone()).collect();
        let removed = self.store.remove_records(&ids)?;
        outcome.removed_files = removed as u64;
        outcome.removed_bytes = missing.iter().map(|(_, size, _)| size).sum();
        log::info!(
            "Reconciliation purged {} record(s), {} bytes",
            outcome.removed_files,
            outcome.removed_bytes
        );
        Ok(())
    }

    /// Index a single file. Failures are logged and counted, never raised.
    fn process_file(&mut self, base: &Path, path: &Path, outcome: &mut ScanOutcome) {
        let relative = match path.strip_prefix(base) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => {
                log::warn!("File outside base directory, skipping: {}", path.display());
                outcome.skipped_files += 1;
                return;
            }
        };

        let identity = match PathIdentity::from_relative(&relative) {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("Cannot derive identity for {}: {}", path.display(), e);
                outcome.skipped_files += 1;
                return;
            }
        };

        match self.store.get(&identity.id) {
            Ok(Some(_)) => {
                // Already indexed; no re-hash, so in-place content edits
                // are invisible until the index is rebuilt.
                outcome.unchanged_files += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Store lookup failed for {}: {}", path.display(), e);
                outcome.skipped_files += 1;
                return;
            }
        }

        let size = match path.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("Cannot stat {}: {}", path.display(), e);
                outcome.skipped_files += 1;
                return;
            }
        };

        let digest = match self.hasher.hash_file(path) {
            Ok(digest) => digest,
            Err(e) => {
                log::warn!("Cannot hash {}: {}", path.display(), e);
                outcome.skipped_files += 1;
                return;
            }
        };

        let relative_path = identity.relative_path();
        let record = FileRecord::new(identity.id, relative_path, digest, size);
        match self.store.insert(&record) {
            Ok(()) => {
                outcome.new_files += 1;
                outcome.new_bytes += size;
            }
            Err(StoreError::DuplicateId(id)) => {
                // Two walked paths normalized to one identity; keep the
                // first and count this one as skipped.
                log::warn!("Identity collision for {} (id {})", path.display(), id);
                outcome.skipped_files += 1;
            }
            Err(e) => {
                log::error!("Insert failed for {}: {}", path.display(), e);
                outcome.skipped_files += 1;
            }
        }
    }
}

/// Count regular files under `root`. Entry errors are logged and the
/// entry skipped; the processing pass will surface them again.
fn count_files(root: &Path) -> u64 {
    let mut total = 0u64;
    for entry in WalkDir::new(root) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => total += 1,
            Ok(_) => {}
            Err(e) => log::debug!("Count pass: skipping unreadable entry: {}", e),
        }
    }
    total
}
