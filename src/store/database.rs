//! SQLite-backed record store.
//!
//! The store owns the persisted schema: a `files` table keyed by the
//! path-derived identity, indexed by content digest for duplicate
//! grouping, and a `metadata` table of JSON-encoded key/value pairs
//! with update timestamps.
//!
//! The store is an explicit handle with a scoped `open`/`close`
//! lifecycle. `close` is idempotent; operations on a closed handle fail
//! with [`StoreError::Closed`]. Cross-process exclusion is left to
//! SQLite's own file locking.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::record::{FileRecord, GroupSummary};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id   TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    hash TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_files_hash ON files (hash);

CREATE TABLE IF NOT EXISTS metadata (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store file could not be opened or initialized.
    /// Fatal to the whole run.
    #[error("cannot open record store at {path}: {source}")]
    Unavailable {
        /// Backing file path
        path: PathBuf,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// An insert collided with an existing record id.
    #[error("record id already present: {0}")]
    DuplicateId(String),

    /// The handle was used after `close`.
    #[error("record store is closed")]
    Closed,

    /// A metadata value failed to encode or decode.
    #[error("invalid metadata value for key '{key}': {source}")]
    Metadata {
        /// Metadata key
        key: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Any other SQLite failure.
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

/// Persistent table of file records plus scan metadata.
///
/// # Example
///
/// ```no_run
/// use dupindex::store::{FileRecord, RecordStore};
/// use std::path::Path;
///
/// let mut store = RecordStore::open(Path::new("photos.db")).unwrap();
/// let record = FileRecord::new(
///     "00ff00ff00ff00ff00ff00ff00ff00ff".into(),
///     "photos/a.jpg".into(),
///     "digest".into(),
///     1024,
/// );
/// store.insert(&record).unwrap();
/// store.close();
/// ```
#[derive(Debug)]
pub struct RecordStore {
    conn: Option<Connection>,
    path: PathBuf,
}

impl RecordStore {
    /// Open the store at `path`, creating schema objects as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the file cannot be
    /// opened or the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|source| StoreError::Unavailable {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Opened record store at {}", path.display());
        Ok(Self {
            conn: Some(conn),
            path: path.to_path_buf(),
        })
    }

    /// Open an in-memory store (tests and dry runs).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if SQLite refuses the
    /// in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Unavailable {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|source| StoreError::Unavailable {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            conn: Some(conn),
            path,
        })
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the handle is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Close the handle. Idempotent; safe to call when already closed.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_conn, e)) = conn.close() {
                log::warn!("Failed to close record store cleanly: {}", e);
            } else {
                log::debug!("Closed record store at {}", self.path.display());
            }
        }
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::Closed)
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] when the id is already
    /// present. The store never silently upserts; callers check with
    /// [`get`](Self::get) first.
    pub fn insert(&self, record: &FileRecord) -> Result<(), StoreError> {
        let result = self.conn()?.execute(
            "INSERT INTO files (id, path, hash, size) VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.path, record.digest, record.size],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateId(record.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a record by id. Absence is not an error.
    pub fn get(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        let record = self
            .conn()?
            .query_row(
                "SELECT id, path, hash, size FROM files WHERE id = ?1",
                [id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Stream every record through `f` without materializing the table.
    ///
    /// Used by the reconciliation pass; rows are visited in storage
    /// order, one at a time.
    pub fn for_each_record<F>(&self, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(FileRecord),
    {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, path, hash, size FROM files")?;
        let rows = stmt.query_map([], row_to_record)?;
        for row in rows {
            f(row?);
        }
        Ok(())
    }

    /// All records, ordered by path. Convenience for queries and tests.
    pub fn all_records(&self) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, path, hash, size FROM files ORDER BY path")?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Record count and total indexed bytes.
    pub fn totals(&self) -> Result<(u64, u64), StoreError> {
        let (count, bytes) = self.conn()?.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM files",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        Ok((count as u64, bytes as u64))
    }

    /// Delete a record by id. Idempotent; returns whether a row existed.
    pub fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let n = self
            .conn()?
            .execute("DELETE FROM files WHERE id = ?1", [id])?;
        Ok(n > 0)
    }

    /// Delete a batch of records inside a single transaction.
    ///
    /// Either every listed id is deleted or none are; returns the number
    /// of rows actually removed (absent ids are skipped silently).
    pub fn remove_records(&mut self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM files WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Groups of records sharing a digest, `count >= 2`, ordered by the
    /// lexicographically smallest member path.
    pub fn duplicate_groups(&self) -> Result<Vec<GroupSummary>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT hash, size, COUNT(*), MIN(path) FROM files \
             GROUP BY hash HAVING COUNT(*) >= 2 ORDER BY MIN(path)",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(GroupSummary {
                digest: row.get(0)?,
                size: row.get::<_, i64>(1)? as u64,
                count: row.get::<_, i64>(2)? as u64,
                representative: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All records with the given digest, ordered by path.
    pub fn records_by_digest(&self, digest: &str) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, path, hash, size FROM files WHERE hash = ?1 ORDER BY path")?;
        let rows = stmt.query_map([digest], row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Write a metadata value (JSON-encoded) with the current timestamp.
    pub fn set_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value).map_err(|source| StoreError::Metadata {
            key: key.to_string(),
            source,
        })?;
        self.conn()?.execute(
            "INSERT INTO metadata (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Read a metadata value, or `None` when the key is absent.
    pub fn get_meta<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let json: Option<String> = self
            .conn()?
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        match json {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|source| StoreError::Metadata {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Remove a metadata key. Idempotent.
    pub fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.conn()?
            .execute("DELETE FROM metadata WHERE key = ?1", [key])?;
        Ok(())
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        self.close();
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        digest: row.get(2)?,
        size: row.get::<_, i64>(3)? as u64,
    })
}
