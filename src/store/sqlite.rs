//! SQLite checksum store
//!
//! One row per root-relative path with checksum and timestamp columns,
//! created on first open. The connection is shared across workers behind a
//! mutex; contention is low because checksum computation dominates.

use crate::checksum::CheckRecord;
use crate::error::{StoreError, StoreResult};
use crate::store::ChecksumStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS checksums (
    path TEXT PRIMARY KEY,
    crc32c INTEGER NOT NULL,
    modtime_usec INTEGER NOT NULL
)
"#;

const OPEN_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
"#;

/// Checksum store backed by a SQLite table keyed by root-relative path
pub struct SqliteStore {
    /// Root that paths are relativized against
    root: PathBuf,
    conn: Mutex<Connection>,
    dry_run: bool,
}

impl SqliteStore {
    /// Open (creating if absent) the database at `db_path`, keying records
    /// relative to `root`.
    pub fn open(db_path: &Path, root: &Path, dry_run: bool) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(OPEN_PRAGMAS)?;
        conn.execute(CREATE_TABLE, [])?;
        debug!(db = %db_path.display(), root = %root.display(), "opened sqlite store");
        Ok(Self {
            root: root.to_path_buf(),
            conn: Mutex::new(conn),
            dry_run,
        })
    }

    /// Root-relative key for a file. Paths outside the root keep their full
    /// form so keys stay unique.
    fn key(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChecksumStore for SqliteStore {
    fn has(&self, _file: &File, path: &Path) -> StoreResult<bool> {
        let count: i64 = self.lock().query_row(
            "SELECT count(1) FROM checksums WHERE path = ?1",
            params![self.key(path)],
            |row| row.get(0),
        )?;
        Ok(count == 1)
    }

    fn read(&self, _file: &File, path: &Path) -> StoreResult<CheckRecord> {
        self.lock()
            .query_row(
                "SELECT crc32c, modtime_usec FROM checksums WHERE path = ?1",
                params![self.key(path)],
                |row| {
                    Ok(CheckRecord {
                        crc32c: row.get(0)?,
                        modtime_usec: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write(&self, _file: &File, path: &Path, record: &CheckRecord) -> StoreResult<()> {
        if self.dry_run {
            return Ok(());
        }
        self.lock().execute(
            "INSERT OR REPLACE INTO checksums (path, crc32c, modtime_usec) \
             VALUES (?1, ?2, ?3)",
            params![self.key(path), record.crc32c, record.modtime_usec],
        )?;
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        // The connection itself closes on drop; checkpoint the WAL so the
        // database file is complete on its own.
        self.lock()
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE); PRAGMA optimize;")?;
        Ok(())
    }
}
