//! Record and group types persisted by the store.

use serde::{Deserialize, Serialize};

/// One indexed file.
///
/// The `id` is derived from the normalized relative path, so a rename
/// produces a new record while an in-place overwrite keeps the old one
/// until the index is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path-derived identity (32 hex chars), primary key.
    pub id: String,
    /// Path relative to the index base, forward slashes on all platforms.
    pub path: String,
    /// Content digest at last scan time (BLAKE3, hex).
    pub digest: String,
    /// Byte length at last scan time.
    pub size: u64,
}

impl FileRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(id: String, path: String, digest: String, size: u64) -> Self {
        Self {
            id,
            path,
            digest,
            size,
        }
    }
}

/// Summary row for a set of records sharing one digest (`count >= 2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Shared content digest.
    pub digest: String,
    /// Byte length of each member (members are byte-identical).
    pub size: u64,
    /// Number of records with this digest.
    pub count: u64,
    /// Lexicographically smallest member path; orders group listings.
    pub representative: String,
}

impl GroupSummary {
    /// Bytes that would be freed by keeping a single member.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size * self.count.saturating_sub(1)
    }
}

/// Metadata keys written by the scanner.
pub mod meta {
    /// RFC 3339 timestamp of the most recent scan start.
    pub const SCAN_STARTED: &str = "scan_started";
    /// RFC 3339 timestamp of the most recent clean scan completion.
    /// Absent while a scan runs, and stays absent if it is killed.
    pub const SCAN_ENDED: &str = "scan_ended";
    /// Name of the scanned target directory.
    pub const TARGET: &str = "target";
    /// Base directory all record paths are relative to.
    pub const BASE_PATH: &str = "base_path";
}
