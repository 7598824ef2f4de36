//! Read-only duplicate queries over the record store.
//!
//! Groups are derived on every call and never cached, so results always
//! reflect the current index state even across scanner or resolution
//! mutations.

use serde::Serialize;

use crate::store::{FileRecord, GroupSummary, RecordStore, StoreError};

/// One member of a duplicate group, shaped for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMember {
    /// Path relative to the index base.
    pub path: String,
    /// Byte length.
    pub size: u64,
}

/// A duplicate group joined with its member paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDetails {
    /// Shared content digest.
    pub digest: String,
    /// Byte length of each member.
    pub size: u64,
    /// Number of members.
    pub count: u64,
    /// Members ordered lexicographically by path.
    pub members: Vec<GroupMember>,
}

/// Read-only view over the store's duplicate relation.
///
/// # Example
///
/// ```no_run
/// use dupindex::duplicates::DuplicateIndex;
/// use dupindex::store::RecordStore;
/// use std::path::Path;
///
/// let store = RecordStore::open(Path::new("photos.db")).unwrap();
/// let index = DuplicateIndex::new(&store);
/// for group in index.list_groups().unwrap() {
///     println!("{} x{} ({} bytes each)", group.digest, group.count, group.size);
/// }
/// ```
pub struct DuplicateIndex<'a> {
    store: &'a RecordStore,
}

impl<'a> DuplicateIndex<'a> {
    /// Create a view over the given store handle.
    #[must_use]
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// All groups with `count >= 2`, ordered by their representative
    /// (lexicographically smallest) member path.
    pub fn list_groups(&self) -> Result<Vec<GroupSummary>, StoreError> {
        self.store.duplicate_groups()
    }

    /// Members of the group with the given digest, ordered by path.
    ///
    /// An unknown digest yields an empty list, not an error.
    pub fn members(&self, digest: &str) -> Result<Vec<FileRecord>, StoreError> {
        self.store.records_by_digest(digest)
    }

    /// Groups joined with their members, for presentation layers.
    pub fn group_details(&self) -> Result<Vec<GroupDetails>, StoreError> {
        let mut details = Vec::new();
        for group in self.list_groups()? {
            let members = self
                .members(&group.digest)?
                .into_iter()
                .map(|r| GroupMember {
                    path: r.path,
                    size: r.size,
                })
                .collect();
            details.push(GroupDetails {
                digest: group.digest,
                size: group.size,
                count: group.count,
                members,
            });
        }
        Ok(details)
    }

    /// Bytes reclaimable by reducing every group to a single member.
    pub fn reclaimable_bytes(&self) -> Result<u64, StoreError> {
        Ok(self
            .list_groups()?
            .iter()
            .map(GroupSummary::reclaimable_bytes)
            .sum())
    }
}
