//! End-to-end scans over real temporary trees, using the SQLite store.

use bitsum::store::{ChecksumStore, SqliteStore};
use bitsum::{scan, BitsumError, Policy, ReportMode, ScanConfig};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config_for(root: &Path) -> ScanConfig {
    ScanConfig {
        roots: vec![root.to_path_buf()],
        workers: 2,
        one_filesystem: false,
        exclude: HashSet::new(),
        exclude_re: Vec::new(),
        subset_percent: 100,
        subset_seed: 1,
        report: ReportMode::Quiet,
    }
}

fn open_store(dir: &TempDir) -> (Arc<dyn ChecksumStore>, PathBuf) {
    let db = dir.path().join("sums.db");
    let store = SqliteStore::open(&db, &dir.path().join("data"), false).unwrap();
    (Arc::new(store), db)
}

fn populate(root: &Path) -> Vec<PathBuf> {
    let sub = root.join("sub");
    fs::create_dir(&sub).unwrap();
    let paths = vec![root.join("a.txt"), root.join("b.bin"), sub.join("c.log")];
    for (i, path) in paths.iter().enumerate() {
        fs::write(path, format!("file number {i}")).unwrap();
    }
    paths
}

/// Rewrite content but restore the previous mtime, like bitrot would.
fn corrupt_preserving_mtime(path: &Path, content: &[u8]) {
    let mtime = fs::metadata(path).unwrap().modified().unwrap();
    fs::write(path, content).unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(mtime).unwrap();
}

fn touch(path: &Path) {
    let mtime = fs::metadata(path).unwrap().modified().unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(mtime + Duration::from_secs(5)).unwrap();
}

#[test]
fn test_generate_then_verify_clean_tree() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let paths = populate(&data);
    let config = config_for(&data);

    let (store, db) = open_store(&dir);
    let counts = scan(&config, Arc::clone(&store), Policy::Generate).unwrap();
    assert_eq!(counts.new_records as usize, paths.len());
    store.close().unwrap();

    // A fresh store over the same database sees every record.
    let store: Arc<dyn ChecksumStore> = Arc::new(SqliteStore::open(&db, &data, false).unwrap());
    let counts = scan(&config, store, Policy::Verify).unwrap();
    assert_eq!(counts.matched as usize, paths.len());
    assert_eq!(counts.corrupted, 0);
    assert_eq!(counts.modified, 0);
}

#[test]
fn test_verify_flags_corruption_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let paths = populate(&data);
    let config = config_for(&data);

    let (store, _db) = open_store(&dir);
    scan(&config, Arc::clone(&store), Policy::Generate).unwrap();

    corrupt_preserving_mtime(&paths[1], b"flipped bits");
    let err = scan(&config, store, Policy::Verify).unwrap_err();
    assert!(matches!(err, BitsumError::Corruption { count: 1 }));
}

#[test]
fn test_update_refreshes_modified_files() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let paths = populate(&data);
    let config = config_for(&data);

    let (store, _db) = open_store(&dir);
    scan(&config, Arc::clone(&store), Policy::Generate).unwrap();

    touch(&paths[0]);
    let counts = scan(&config, Arc::clone(&store), Policy::Update).unwrap();
    assert_eq!(counts.modified, 1);
    assert_eq!(counts.matched as u64, paths.len() as u64 - 1);

    // After the refresh the tree verifies clean again.
    let counts = scan(&config, store, Policy::Verify).unwrap();
    assert_eq!(counts.matched as usize, paths.len());
    assert_eq!(counts.modified, 0);
}

#[test]
fn test_update_does_not_mask_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let paths = populate(&data);
    let config = config_for(&data);

    let (store, _db) = open_store(&dir);
    scan(&config, Arc::clone(&store), Policy::Generate).unwrap();

    corrupt_preserving_mtime(&paths[2], b"rotten");
    let err = scan(&config, Arc::clone(&store), Policy::Update).unwrap_err();
    assert!(matches!(err, BitsumError::Corruption { count: 1 }));

    // The stored record was kept, so the next verify still sees it.
    let err = scan(&config, store, Policy::Verify).unwrap_err();
    assert!(matches!(err, BitsumError::Corruption { count: 1 }));
}

#[test]
fn test_subset_zero_scans_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    populate(&data);

    let mut config = config_for(&data);
    config.subset_percent = 0;

    let (store, _db) = open_store(&dir);
    let counts = scan(&config, store, Policy::Generate).unwrap();
    assert_eq!(counts.new_records, 0);
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let paths = populate(&data);
    let config = config_for(&data);

    let db = dir.path().join("sums.db");
    let store: Arc<dyn ChecksumStore> = Arc::new(SqliteStore::open(&db, &data, true).unwrap());
    let counts = scan(&config, Arc::clone(&store), Policy::Generate).unwrap();
    assert_eq!(counts.new_records as usize, paths.len());
    store.close().unwrap();

    // Nothing persisted: every file is still new on the next pass.
    let store: Arc<dyn ChecksumStore> = Arc::new(SqliteStore::open(&db, &data, false).unwrap());
    let counts = scan(&config, store, Policy::Generate).unwrap();
    assert_eq!(counts.new_records as usize, paths.len());
}

#[test]
fn test_exclusion_keeps_tree_partial() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    populate(&data);

    let mut config = config_for(&data);
    config.exclude.insert(data.join("sub"));

    let (store, _db) = open_store(&dir);
    let counts = scan(&config, store, Policy::Generate).unwrap();
    assert_eq!(counts.new_records, 2);
}
