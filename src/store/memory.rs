//! In-memory checksum store
//!
//! Test double implementing the full store contract, with injectable read
//! and write failures for exercising the worker error funnel without a
//! misbehaving filesystem.

use crate::checksum::CheckRecord;
use crate::error::{StoreError, StoreResult};
use crate::store::ChecksumStore;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Checksum store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<PathBuf, CheckRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `read` calls fail with an I/O error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `write` calls fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Record stored for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<CheckRecord> {
        self.lock().get(path).copied()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Insert a record directly, bypassing the trait (for test setup).
    pub fn insert(&self, path: PathBuf, record: CheckRecord) {
        self.lock().insert(path, record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, CheckRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChecksumStore for MemoryStore {
    fn has(&self, _file: &File, path: &Path) -> StoreResult<bool> {
        Ok(self.lock().contains_key(path))
    }

    fn read(&self, _file: &File, path: &Path) -> StoreResult<CheckRecord> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("injected read failure")));
        }
        self.lock()
            .get(path)
            .copied()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write(&self, _file: &File, path: &Path, record: &CheckRecord) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "injected write failure",
            )));
        }
        self.lock().insert(path.to_path_buf(), *record);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
