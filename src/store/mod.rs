//! Persistent record store: schema, lookups, and scan metadata.
//!
//! One backing SQLite file per scanned target. The store is the sole
//! owner of persisted state; the scanner writes inserts and purges,
//! the resolution engine removes records alongside its filesystem
//! mutations, and everything else reads.

mod database;
mod record;

pub use database::{RecordStore, StoreError};
pub use record::{meta, FileRecord, GroupSummary};
