use dupindex::duplicates::DuplicateIndex;
use dupindex::scanner::{IncrementalScanner, ScanMode};
use dupindex::store::{meta, RecordStore};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("empty");
    fs::create_dir(&target).unwrap();

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    let outcome = IncrementalScanner::new(&mut store).scan(&target).unwrap();

    assert_eq!(outcome.new_files, 0);
    assert_eq!(outcome.total_files, 0);
    assert!(store.all_records().unwrap().is_empty());
    assert!(DuplicateIndex::new(&store).list_groups().unwrap().is_empty());
}

#[test]
fn test_duplicates_across_directories_form_one_group() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("tree");
    write_file(&target.join("one/a.bin"), b"identical payload");
    write_file(&target.join("two/b.bin"), b"identical payload");
    write_file(&target.join("unique.bin"), b"something else");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();

    let index = DuplicateIndex::new(&store);
    let groups = index.list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 2);
    assert_eq!(groups[0].size, 17);

    let members = index.members(&groups[0].digest).unwrap();
    let paths: Vec<_> = members.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["tree/one/a.bin", "tree/two/b.bin"]);
}

#[test]
fn test_second_scan_is_idempotent() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("tree");
    write_file(&target.join("a.txt"), b"aaa");
    write_file(&target.join("sub/b.txt"), b"bbb");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    let first = IncrementalScanner::new(&mut store).scan(&target).unwrap();
    assert_eq!(first.mode, ScanMode::Fresh);
    assert_eq!(first.new_files, 2);

    let records_before = store.all_records().unwrap();
    let second = IncrementalScanner::new(&mut store).scan(&target).unwrap();

    assert_eq!(second.mode, ScanMode::Resume);
    assert_eq!(second.new_files, 0);
    assert_eq!(second.removed_files, 0);
    assert_eq!(second.unchanged_files, 2);
    assert_eq!(store.all_records().unwrap(), records_before);
}

#[test]
fn test_reconciliation_purges_deleted_file_from_groups() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("tree");
    write_file(&target.join("a.txt"), b"payload");
    write_file(&target.join("b.txt"), b"payload");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    assert_eq!(DuplicateIndex::new(&store).list_groups().unwrap().len(), 1);

    fs::remove_file(target.join("b.txt")).unwrap();
    let outcome = IncrementalScanner::new(&mut store).scan(&target).unwrap();

    assert_eq!(outcome.removed_files, 1);
    assert_eq!(outcome.removed_bytes, 7);
    // The survivor no longer has a partner, so no group remains
    assert!(DuplicateIndex::new(&store).list_groups().unwrap().is_empty());
    assert_eq!(store.all_records().unwrap().len(), 1);
}

#[test]
fn test_interrupted_scan_resumes_without_rehashing() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("tree");
    let file = target.join("a.txt");
    write_file(&file, b"original");
    write_file(&target.join("gone.txt"), b"to be removed");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    let digest_before = store
        .all_records()
        .unwrap()
        .iter()
        .find(|r| r.path == "tree/a.txt")
        .unwrap()
        .digest
        .clone();

    // Simulate an interrupted run: the end marker never got written,
    // and the disk changed in the meantime.
    store.delete_meta(meta::SCAN_ENDED).unwrap();
    write_file(&file, b"modified in place after the interrupted scan");
    fs::remove_file(target.join("gone.txt")).unwrap();

    let outcome = IncrementalScanner::new(&mut store).scan(&target).unwrap();
    assert_eq!(outcome.mode, ScanMode::Resume);

    // Present ids are skipped, not re-hashed: the stale digest survives
    let record = store
        .all_records()
        .unwrap()
        .into_iter()
        .find(|r| r.path == "tree/a.txt")
        .unwrap();
    assert_eq!(record.digest, digest_before);

    // Reconciliation still purged the vanished entry
    assert_eq!(outcome.removed_files, 1);
    assert!(store
        .all_records()
        .unwrap()
        .iter()
        .all(|r| r.path != "tree/gone.txt"));

    let ended: Option<String> = store.get_meta(meta::SCAN_ENDED).unwrap();
    assert!(ended.is_some());
}

#[test]
fn test_index_survives_store_reopen() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("tree");
    write_file(&target.join("a.txt"), b"dup");
    write_file(&target.join("b.txt"), b"dup");
    let db = dir.path().join("index.db");

    let mut store = RecordStore::open(&db).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    store.close();

    let store = RecordStore::open(&db).unwrap();
    let groups = DuplicateIndex::new(&store).list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 2);
}

#[test]
fn test_new_file_between_scans_is_picked_up() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("tree");
    write_file(&target.join("a.txt"), b"first");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();

    write_file(&target.join("later/b.txt"), b"second");
    let outcome = IncrementalScanner::new(&mut store).scan(&target).unwrap();

    assert_eq!(outcome.new_files, 1);
    assert_eq!(outcome.unchanged_files, 1);
    assert_eq!(outcome.total_files, 2);
}
