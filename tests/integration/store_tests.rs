use dupindex::store::{FileRecord, RecordStore, StoreError};
use tempfile::tempdir;

fn record(id: &str, path: &str, digest: &str, size: u64) -> FileRecord {
    FileRecord::new(id.into(), path.into(), digest.into(), size)
}

#[test]
fn test_open_creates_schema_and_persists() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.db");

    let mut store = RecordStore::open(&db).unwrap();
    store.insert(&record("1", "t/a.txt", "d", 42)).unwrap();
    store.set_meta("target", &"t").unwrap();
    store.close();

    // A second open sees the same state without recreating anything
    let store = RecordStore::open(&db).unwrap();
    assert_eq!(store.get("1").unwrap().unwrap().size, 42);
    let target: Option<String> = store.get_meta("target").unwrap();
    assert_eq!(target.as_deref(), Some("t"));
}

#[test]
fn test_open_in_missing_directory_is_unavailable() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("no/such/dir/index.db");

    let err = RecordStore::open(&db).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
}

#[test]
fn test_lifecycle_close_then_use() {
    let dir = tempdir().unwrap();
    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    store.close();
    store.close(); // idempotent

    assert!(matches!(store.get("x").unwrap_err(), StoreError::Closed));
    assert!(matches!(
        store.duplicate_groups().unwrap_err(),
        StoreError::Closed
    ));
}

#[test]
fn test_insert_conflict_reports_duplicate_id() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    store.insert(&record("same", "t/a", "d1", 1)).unwrap();

    let err = store.insert(&record("same", "t/b", "d2", 2)).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(id) if id == "same"));
}

#[test]
fn test_group_query_joins_members_on_demand() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    store.insert(&record("1", "t/z.txt", "dup", 5)).unwrap();
    store.insert(&record("2", "t/a.txt", "dup", 5)).unwrap();
    store.insert(&record("3", "t/solo.txt", "one", 9)).unwrap();

    let groups = store.duplicate_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].digest, "dup");
    assert_eq!(groups[0].count, 2);
    assert_eq!(groups[0].representative, "t/a.txt");

    let members = store.records_by_digest("dup").unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].path, "t/a.txt");
}
