use dupindex::actions::{ResolutionEngine, ResolveError};
use dupindex::duplicates::DuplicateIndex;
use dupindex::scanner::IncrementalScanner;
use dupindex::store::RecordStore;
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

/// Three identical 100-byte files; keep-original must pick the shortest
/// path and quarantine the other two at mirrored relative paths.
#[test]
fn test_keep_original_shortest_path_scenario() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    let content = [7u8; 100];
    write_file(&target.join("a/x.txt"), &content);
    write_file(&target.join("b/x.txt"), &content);
    write_file(&target.join("c/longname/x.txt"), &content);

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();

    let groups = DuplicateIndex::new(&store).list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 3);
    assert_eq!(groups[0].size, 100);
    let digest = groups[0].digest.clone();

    let quarantine = dir.path().join("t-quarantine");
    let mut engine = ResolutionEngine::new(&mut store, dir.path(), &quarantine);
    let outcome = engine.keep_original(&digest).unwrap();

    assert_eq!(outcome.kept.as_deref(), Some("t/a/x.txt"));
    assert_eq!(outcome.resolved_count(), 2);
    assert_eq!(outcome.freed_bytes, 200);
    assert!(outcome.all_succeeded());

    // Exactly one record remains for the digest
    assert_eq!(store.records_by_digest(&digest).unwrap().len(), 1);

    // Kept file untouched, others moved at mirrored relative paths
    assert!(target.join("a/x.txt").exists());
    assert!(!target.join("b/x.txt").exists());
    assert!(!target.join("c/longname/x.txt").exists());
    assert!(quarantine.join("t/b/x.txt").exists());
    assert!(quarantine.join("t/c/longname/x.txt").exists());

    // Quarantined content is intact
    assert_eq!(fs::read(quarantine.join("t/b/x.txt")).unwrap(), content);
}

#[test]
fn test_resolution_below_threshold_is_rejected() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    write_file(&target.join("only.txt"), b"alone");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    let digest = store.all_records().unwrap()[0].digest.clone();

    let quarantine = dir.path().join("q");
    let mut engine = ResolutionEngine::new(&mut store, dir.path(), &quarantine);

    let err = engine.keep_original(&digest).unwrap_err();
    assert!(matches!(err, ResolveError::NoDuplicates(_)));

    let err = engine.keep_original("unknown-digest").unwrap_err();
    assert!(matches!(err, ResolveError::NoDuplicates(_)));
}

#[test]
fn test_delete_duplicates_keeps_canonical_on_disk() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    write_file(&target.join("a.txt"), b"payload!");
    write_file(&target.join("deep/b.txt"), b"payload!");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    let digest = DuplicateIndex::new(&store).list_groups().unwrap()[0]
        .digest
        .clone();

    let quarantine = dir.path().join("q");
    let mut engine = ResolutionEngine::new(&mut store, dir.path(), &quarantine);
    let outcome = engine.delete_duplicates(&digest).unwrap();

    assert_eq!(outcome.kept.as_deref(), Some("t/a.txt"));
    assert_eq!(outcome.resolved_count(), 1);
    assert_eq!(outcome.freed_bytes, 8);
    assert!(target.join("a.txt").exists());
    assert!(!target.join("deep/b.txt").exists());
    // Nothing was quarantined
    assert!(!quarantine.exists());
    assert_eq!(store.records_by_digest(&digest).unwrap().len(), 1);
}

#[test]
fn test_delete_group_removes_every_member() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    write_file(&target.join("a.txt"), b"zap");
    write_file(&target.join("b.txt"), b"zap");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    let digest = DuplicateIndex::new(&store).list_groups().unwrap()[0]
        .digest
        .clone();

    let quarantine = dir.path().join("q");
    let mut engine = ResolutionEngine::new(&mut store, dir.path(), &quarantine);
    let outcome = engine.delete_group(&digest).unwrap();

    assert_eq!(outcome.kept, None);
    assert_eq!(outcome.resolved_count(), 2);
    assert!(!target.join("a.txt").exists());
    assert!(!target.join("b.txt").exists());
    assert!(store.records_by_digest(&digest).unwrap().is_empty());
}

#[test]
fn test_per_file_failure_leaves_record_and_file() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    write_file(&target.join("a.txt"), b"same bytes");
    write_file(&target.join("bb.txt"), b"same bytes");
    write_file(&target.join("ccc.txt"), b"same bytes");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    let digest = DuplicateIndex::new(&store).list_groups().unwrap()[0]
        .digest
        .clone();

    // Occupy one quarantine destination to force a collision failure
    let quarantine = dir.path().join("q");
    write_file(&quarantine.join("t/bb.txt"), b"already here");

    let mut engine = ResolutionEngine::new(&mut store, dir.path(), &quarantine);
    let outcome = engine.keep_original(&digest).unwrap();

    assert_eq!(outcome.kept.as_deref(), Some("t/a.txt"));
    assert_eq!(outcome.resolved_count(), 1);
    assert_eq!(outcome.failure_count(), 1);
    assert_eq!(outcome.failures[0].0, "t/bb.txt");
    assert_eq!(outcome.freed_bytes, 10);

    // The failed member stays on disk and indexed
    assert!(target.join("bb.txt").exists());
    let remaining = store.records_by_digest(&digest).unwrap();
    let paths: Vec<_> = remaining.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["t/a.txt", "t/bb.txt"]);

    // The occupied destination was not overwritten
    assert_eq!(
        fs::read(quarantine.join("t/bb.txt")).unwrap(),
        b"already here"
    );
}

#[test]
fn test_quarantined_files_disappear_after_next_scan() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("t");
    write_file(&target.join("a.txt"), b"dup");
    write_file(&target.join("b/copy.txt"), b"dup");

    let mut store = RecordStore::open(&dir.path().join("index.db")).unwrap();
    IncrementalScanner::new(&mut store).scan(&target).unwrap();
    let digest = DuplicateIndex::new(&store).list_groups().unwrap()[0]
        .digest
        .clone();

    let quarantine = dir.path().join("t-quarantine");
    ResolutionEngine::new(&mut store, dir.path(), &quarantine)
        .keep_original(&digest)
        .unwrap();

    // The quarantine tree is a sibling of the target, so a rescan of
    // the target neither re-indexes the moved file nor purges anything.
    let outcome = IncrementalScanner::new(&mut store).scan(&target).unwrap();
    assert_eq!(outcome.new_files, 0);
    assert_eq!(outcome.removed_files, 0);
    assert!(DuplicateIndex::new(&store).list_groups().unwrap().is_empty());
}
