//! Per-file classification policies
//!
//! Each policy is a small state machine run by a worker against one file.
//! All three check store presence before reading the full record, so the
//! common no-record case never takes a not-found error path.

use crate::checksum::CheckRecord;
use crate::error::Result;
use crate::progress::Progress;
use crate::store::ChecksumStore;
use crate::walker::WorkItem;

/// What to do with each scanned file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Write records for files that have none; leave existing ones alone.
    Generate,

    /// Check existing records without ever writing.
    Verify,

    /// Verify, refreshing the record for modified or new files. Corrupted
    /// files keep their stored record so the violation stays visible.
    Update,
}

impl Policy {
    /// Run the policy against one file. The item's metadata was captured
    /// before the file was opened (see [`CheckRecord`]).
    pub fn apply(
        &self,
        store: &dyn ChecksumStore,
        progress: &Progress,
        item: &WorkItem,
    ) -> Result<()> {
        match self {
            Policy::Generate => generate(store, progress, item),
            Policy::Verify => verify(store, progress, item),
            Policy::Update => update(store, progress, item),
        }
    }
}

fn generate(store: &dyn ChecksumStore, progress: &Progress, item: &WorkItem) -> Result<()> {
    if store.has(&item.file, &item.path)? {
        // Already has a record; generate never verifies or overwrites.
        return Ok(());
    }

    let current = CheckRecord::compute(&item.file, &item.metadata)?;
    store.write(&item.file, &item.path, &current)?;
    progress.record_new(&item.path, &current);
    Ok(())
}

fn verify(store: &dyn ChecksumStore, progress: &Progress, item: &WorkItem) -> Result<()> {
    if !store.has(&item.file, &item.path)? {
        progress.record_missing(&item.path, None);
        return Ok(());
    }

    let stored = store.read(&item.file, &item.path)?;
    let current = CheckRecord::compute(&item.file, &item.metadata)?;

    if stored.modtime_usec != current.modtime_usec {
        progress.record_modified(&item.path, &stored, &current);
    } else if stored.crc32c != current.crc32c {
        progress.record_corrupted(&item.path, &stored, &current);
    } else {
        progress.record_matched(&item.path, &current);
    }
    Ok(())
}

fn update(store: &dyn ChecksumStore, progress: &Progress, item: &WorkItem) -> Result<()> {
    // Checksum the current state first; the classification below compares
    // against it either way.
    let current = CheckRecord::compute(&item.file, &item.metadata)?;

    if !store.has(&item.file, &item.path)? {
        // Expected for newly created files.
        progress.record_missing(&item.path, Some(&current));
        store.write(&item.file, &item.path, &current)?;
        return Ok(());
    }

    let stored = store.read(&item.file, &item.path)?;
    if stored.modtime_usec != current.modtime_usec {
        // File modified; refresh the baseline.
        progress.record_modified(&item.path, &stored, &current);
        store.write(&item.file, &item.path, &current)?;
    } else if stored.crc32c != current.crc32c {
        // Leave the stored record untouched so the next verify still sees
        // the violation.
        progress.record_corrupted(&item.path, &stored, &current);
    } else {
        progress.record_matched(&item.path, &current);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ReportMode;
    use crate::store::MemoryStore;
    use std::fs::{self, File};
    use std::path::Path;

    fn item_for(path: &Path) -> WorkItem {
        let metadata = fs::metadata(path).unwrap();
        let file = File::open(path).unwrap();
        WorkItem {
            file,
            path: path.to_path_buf(),
            metadata,
        }
    }

    /// Rewrite a file's content but restore its previous mtime, simulating
    /// silent corruption.
    fn corrupt_preserving_mtime(path: &Path, content: &[u8]) {
        let mtime = fs::metadata(path).unwrap().modified().unwrap();
        fs::write(path, content).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    /// Bump a file's mtime without touching content.
    fn touch(path: &Path) {
        let mtime = fs::metadata(path).unwrap().modified().unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(mtime + std::time::Duration::from_secs(5)).unwrap();
    }

    fn scratch(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_generate_writes_once_then_noops() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        assert_eq!(store.len(), 1);
        let first = store.get(&path).unwrap();

        // Second pass: record exists, nothing written, nothing counted.
        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        assert_eq!(store.get(&path).unwrap(), first);

        let counts = progress.snapshot();
        assert_eq!(counts.new_records, 1);
        assert_eq!(counts.corrupted, 0);
    }

    #[test]
    fn test_verify_classifies_matched() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        Policy::Verify
            .apply(&store, &progress, &item_for(&path))
            .unwrap();

        let counts = progress.snapshot();
        assert_eq!(counts.matched, 1);
        assert_eq!(counts.modified, 0);
        assert_eq!(counts.corrupted, 0);
    }

    #[test]
    fn test_verify_missing_is_not_an_error() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Verify
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        assert_eq!(progress.snapshot().new_records, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_verify_detects_corruption_and_keeps_record() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        let baseline = store.get(&path).unwrap();

        corrupt_preserving_mtime(&path, b"jello");
        Policy::Verify
            .apply(&store, &progress, &item_for(&path))
            .unwrap();

        assert_eq!(progress.snapshot().corrupted, 1);
        assert_eq!(store.get(&path).unwrap(), baseline);
    }

    #[test]
    fn test_modified_mtime_beats_content_comparison() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        touch(&path);

        // Content unchanged but mtime moved: modified, not corrupted.
        Policy::Verify
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        let counts = progress.snapshot();
        assert_eq!(counts.modified, 1);
        assert_eq!(counts.corrupted, 0);
    }

    #[test]
    fn test_verify_never_writes() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        let baseline = store.get(&path).unwrap();

        touch(&path);
        Policy::Verify
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        assert_eq!(store.get(&path).unwrap(), baseline);
    }

    #[test]
    fn test_update_refreshes_modified_record() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        let baseline = store.get(&path).unwrap();

        touch(&path);
        Policy::Update
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        let refreshed = store.get(&path).unwrap();
        assert_ne!(refreshed.modtime_usec, baseline.modtime_usec);
        assert_eq!(refreshed.crc32c, baseline.crc32c);

        // The refreshed baseline now matches.
        Policy::Verify
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        assert_eq!(progress.snapshot().matched, 1);
    }

    #[test]
    fn test_update_writes_missing_record() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Update
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(progress.snapshot().new_records, 1);
    }

    #[test]
    fn test_update_leaves_corrupted_record_untouched() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap();
        let baseline = store.get(&path).unwrap();

        corrupt_preserving_mtime(&path, b"jello");
        Policy::Update
            .apply(&store, &progress, &item_for(&path))
            .unwrap();

        assert_eq!(progress.snapshot().corrupted, 1);
        assert_eq!(store.get(&path).unwrap(), baseline);
    }

    #[test]
    fn test_store_errors_propagate() {
        let (_dir, path) = scratch(b"hello");
        let store = MemoryStore::new();
        let progress = Progress::new(ReportMode::Quiet);

        store.fail_writes(true);
        let err = Policy::Generate
            .apply(&store, &progress, &item_for(&path))
            .unwrap_err();
        assert!(matches!(err, crate::error::BitsumError::Store(_)));
    }
}
