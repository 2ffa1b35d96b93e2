//! Error types for bitsum
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Wrap worker errors with the offending path for diagnosis
//! - A missing checksum record is a distinguishable condition, never a
//!   generic I/O error

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the bitsum application
#[derive(Error, Debug)]
pub enum BitsumError {
    /// A policy failed while processing one file; carries the file's path
    #[error("error in '{path}': {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<BitsumError>,
    },

    /// Checksum store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Traversal errors (permission, stat failure, ...)
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// I/O errors (open, read, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Summary-level failure: corruption was detected but no harder error
    /// occurred
    #[error("detected {count} corrupted files")]
    Corruption { count: u64 },

    /// All workers exited before the walk finished
    #[error("worker pool shut down unexpectedly")]
    PoolClosed,
}

impl BitsumError {
    /// Wrap an error with the path of the file being processed.
    pub fn in_file(path: PathBuf, source: impl Into<BitsumError>) -> Self {
        BitsumError::File {
            path,
            source: Box::new(source.into()),
        }
    }
}

/// Checksum store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record exists for the file. Expected for new files; callers check
    /// `has` first so this only surfaces on racy or inconsistent stores.
    #[error("no checksum record for '{path}'")]
    NotFound { path: PathBuf },

    /// A record exists but does not have the fixed 12-byte layout
    #[error("invalid checksum record for '{path}': expected {expected} bytes, got {len}")]
    InvalidRecord {
        path: PathBuf,
        expected: usize,
        len: usize,
    },

    /// SQLite error from the table backend
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error from the extended-attribute backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and CLI errors; all fail fast before any walking begins
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Subset percentage out of range
    #[error("subset percentage {percent} must be in the [0, 100] range")]
    InvalidSubsetPercent { percent: u32 },

    /// Invalid exclusion regex
    #[error("invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Invalid worker count
    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },
}

/// Result type alias for BitsumError
pub type Result<T> = std::result::Result<T, BitsumError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;
