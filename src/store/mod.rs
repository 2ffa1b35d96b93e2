//! Checksum store backends
//!
//! A store is a persistent, flat mapping from file identity to at most one
//! check record. Two backends exist: extended attributes on the file itself
//! (the default) and a SQLite table keyed by root-relative path. An
//! in-memory double implements the same contract for tests.
//!
//! The store handle is shared read/write across all workers; backends
//! serialize their own internal state. Records are only created or
//! overwritten by generate/update, never deleted.

pub mod memory;
pub mod sqlite;
pub mod xattr;

use crate::checksum::CheckRecord;
use crate::error::StoreResult;
use std::fs::File;
use std::path::Path;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use xattr::XattrStore;

/// Contract for a checksum store backend.
///
/// `has` and `read` are side-effect-free and repeatable; `write` is an
/// idempotent overwrite and a no-op in dry-run mode. A missing record
/// surfaces as [`crate::error::StoreError::NotFound`], distinguishable from
/// I/O failure. Each method receives both the open file handle and its path
/// so backends can key off either.
pub trait ChecksumStore: Send + Sync {
    /// Whether a record exists for the file.
    fn has(&self, file: &File, path: &Path) -> StoreResult<bool>;

    /// Read the record for the file.
    fn read(&self, file: &File, path: &Path) -> StoreResult<CheckRecord>;

    /// Write (or overwrite) the record for the file.
    fn write(&self, file: &File, path: &Path, record: &CheckRecord) -> StoreResult<()>;

    /// Flush and release backend resources.
    fn close(&self) -> StoreResult<()>;
}
