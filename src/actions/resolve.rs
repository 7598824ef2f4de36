//! Duplicate resolution: canonical selection and filesystem mutation.
//!
//! A resolution takes the members of one duplicate group, designates a
//! canonical survivor, and either quarantines or deletes the rest.
//! Filesystem mutations are applied file by file; a failure skips that
//! file, leaves it indexed and on disk, and the operation reports
//! per-file successes and failures rather than a single boolean.
//!
//! Store records for successfully mutated files are removed afterwards
//! in one transaction. A crash between the filesystem pass and that
//! transaction leaves stale records behind; the next reconciliation
//! pass purges them, which is the designed recovery path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::{FileRecord, RecordStore, StoreError};

/// Errors that reject a resolution request outright.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The digest has fewer than two indexed members.
    #[error("no duplicate group for digest {0}")]
    NoDuplicates(String),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Picks the member of a duplicate group that survives resolution.
///
/// Implementations receive at least one member and must return one of
/// them. Policies judge paths only; no content or timestamp signal is
/// available at this seam.
pub trait CanonicalPolicy: Send + Sync {
    /// Select the canonical member.
    fn select<'a>(&self, members: &'a [FileRecord]) -> &'a FileRecord;
}

/// Default policy: the shortest path string wins; among equal lengths,
/// the lexicographically first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestPath;

impl CanonicalPolicy for ShortestPath {
    fn select<'a>(&self, members: &'a [FileRecord]) -> &'a FileRecord {
        let mut best = &members[0];
        for member in &members[1..] {
            let shorter = member.path.len() < best.path.len();
            let tie_first =
                member.path.len() == best.path.len() && member.path < best.path;
            if shorter || tie_first {
                best = member;
            }
        }
        best
    }
}

/// One successfully resolved (moved or deleted) file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Path relative to the index base.
    pub path: String,
    /// Byte length.
    pub size: u64,
    /// Quarantine destination, `None` for deletions.
    pub quarantined_to: Option<PathBuf>,
}

/// Outcome of one resolution operation.
#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    /// Canonical member left untouched (`None` for whole-group deletes).
    pub kept: Option<String>,
    /// Successfully moved or deleted files.
    pub resolved: Vec<ResolvedFile>,
    /// Per-file failures as (path, reason); these stay indexed and on disk.
    pub failures: Vec<(String, String)>,
    /// Bytes freed by the successful mutations.
    pub freed_bytes: u64,
}

impl ResolveOutcome {
    /// Number of successfully resolved files.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Number of per-file failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether every attempted mutation succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Resolved {} file(s), freed {} bytes",
                self.resolved_count(),
                self.freed_bytes
            )
        } else {
            format!(
                "Resolved {} file(s), {} failed, freed {} bytes",
                self.resolved_count(),
                self.failure_count(),
                self.freed_bytes
            )
        }
    }
}

enum Mutation {
    Quarantine,
    Delete,
}

/// Resolves duplicate groups against both the filesystem and the store.
///
/// # Example
///
/// ```no_run
/// use dupindex::actions::ResolutionEngine;
/// use dupindex::store::RecordStore;
/// use std::path::Path;
///
/// let mut store = RecordStore::open(Path::new("photos.db")).unwrap();
/// let mut engine = ResolutionEngine::new(
///     &mut store,
///     Path::new("/home/user"),
///     Path::new("/home/user/photos-quarantine"),
/// );
/// let outcome = engine.keep_original("deadbeef...").unwrap();
/// println!("{}", outcome.summary());
/// ```
pub struct ResolutionEngine<'a> {
    store: &'a mut RecordStore,
    base: PathBuf,
    quarantine_root: PathBuf,
    policy: Box<dyn CanonicalPolicy>,
}

impl<'a> ResolutionEngine<'a> {
    /// Create an engine resolving against `base` (the directory record
    /// paths are relative to) with the given quarantine root.
    #[must_use]
    pub fn new(store: &'a mut RecordStore, base: &Path, quarantine_root: &Path) -> Self {
        Self {
            store,
            base: base.to_path_buf(),
            quarantine_root: quarantine_root.to_path_buf(),
            policy: Box::new(ShortestPath),
        }
    }

    /// Substitute the canonical selection policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn CanonicalPolicy>) -> Self {
        self.policy = policy;
        self
    }

    fn members_checked(&self, digest: &str) -> Result<Vec<FileRecord>, ResolveError> {
        let members = self.store.records_by_digest(digest)?;
        if members.len() < 2 {
            return Err(ResolveError::NoDuplicates(digest.to_string()));
        }
        Ok(members)
    }

    /// Keep the canonical member in place and move every other member
    /// into the quarantine tree, mirroring its relative path.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NoDuplicates`] when the group has fewer than two
    /// members; [`ResolveError::Store`] when the record removal
    /// transaction fails. Per-file move failures are reported in the
    /// outcome, not raised.
    pub fn keep_original(&mut self, digest: &str) -> Result<ResolveOutcome, ResolveError> {
        let members = self.members_checked(digest)?;
        let canonical = self.policy.select(&members).clone();
        log::info!(
            "Resolving group {}: keeping {}, quarantining {} member(s)",
            digest,
            canonical.path,
            members.len() - 1
        );
        self.resolve(&members, Some(&canonical), Mutation::Quarantine)
    }

    /// Keep the canonical member and delete every other member outright.
    ///
    /// # Errors
    ///
    /// Same contract as [`keep_original`](Self::keep_original).
    pub fn delete_duplicates(&mut self, digest: &str) -> Result<ResolveOutcome, ResolveError> {
        let members = self.members_checked(digest)?;
        let canonical = self.policy.select(&members).clone();
        log::info!(
            "Resolving group {}: keeping {}, deleting {} member(s)",
            digest,
            canonical.path,
            members.len() - 1
        );
        self.resolve(&members, Some(&canonical), Mutation::Delete)
    }

    /// Delete every member of the group, canonical included.
    ///
    /// # Errors
    ///
    /// Same contract as [`keep_original`](Self::keep_original).
    pub fn delete_group(&mut self, digest: &str) -> Result<ResolveOutcome, ResolveError> {
        let members = self.members_checked(digest)?;
        log::info!(
            "Resolving group {}: deleting all {} member(s)",
            digest,
            members.len()
        );
        self.resolve(&members, None, Mutation::Delete)
    }

    fn resolve(
        &mut self,
        members: &[FileRecord],
        keep: Option<&FileRecord>,
        mutation: Mutation,
    ) -> Result<ResolveOutcome, ResolveError> {
        let mut outcome = ResolveOutcome {
            kept: keep.map(|k| k.path.clone()),
            ..ResolveOutcome::default()
        };
        let mut resolved_ids = Vec::new();

        for member in members {
            if keep.is_some_and(|k| k.id == member.id) {
                continue;
            }
            let result = match mutation {
                Mutation::Quarantine => self.quarantine_file(member).map(Some),
                Mutation::Delete => self.delete_file(member).map(|()| None),
            };
            match result {
                Ok(destination) => {
                    resolved_ids.push(member.id.clone());
                    outcome.freed_bytes += member.size;
                    outcome.resolved.push(ResolvedFile {
                        path: member.path.clone(),
                        size: member.size,
                        quarantined_to: destination,
                    });
                }
                Err(e) => {
                    log::warn!("Failed to resolve {}: {}", member.path, e);
                    outcome.failures.push((member.path.clone(), e.to_string()));
                }
            }
        }

        // One transaction for the whole group's record removals, after
        // the filesystem pass.
        self.store.remove_records(&resolved_ids)?;
        Ok(outcome)
    }

    /// Move one file under the quarantine root at its mirrored relative
    /// path, creating parent directories on demand. All-or-nothing per
    /// file; an existing destination is a failure, not an overwrite.
    fn quarantine_file(&self, member: &FileRecord) -> io::Result<PathBuf> {
        let source = self.base.join(&member.path);
        let destination = self.quarantine_root.join(&member.path);

        if destination.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("quarantine destination exists: {}", destination.display()),
            ));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&source, &destination)?;
        log::debug!("Quarantined {} -> {}", source.display(), destination.display());
        Ok(destination)
    }

    fn delete_file(&self, member: &FileRecord) -> io::Result<()> {
        let source = self.base.join(&member.path);
        fs::remove_file(&source)?;
        log::debug!("Deleted {}", source.display());
        Ok(())
    }
}
