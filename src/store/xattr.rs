//! Extended-attribute checksum store
//!
//! Stores the 12-byte record directly on the file in the `user.bitsum-v1`
//! attribute, so records travel with the file and need no external state.
//! All operations go through the already-open file descriptor.

use crate::checksum::CheckRecord;
use crate::error::{StoreError, StoreResult};
use crate::store::ChecksumStore;
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use xattr::FileExt;

/// Attribute name holding the packed record
pub const ATTR_NAME: &str = "user.bitsum-v1";

/// Checksum store backed by per-file extended attributes
#[derive(Debug, Clone, Copy)]
pub struct XattrStore {
    dry_run: bool,
}

impl XattrStore {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl ChecksumStore for XattrStore {
    fn has(&self, file: &File, _path: &Path) -> StoreResult<bool> {
        let mut attrs = file.list_xattr()?;
        Ok(attrs.any(|a| a == OsStr::new(ATTR_NAME)))
    }

    fn read(&self, file: &File, path: &Path) -> StoreResult<CheckRecord> {
        let value = file
            .get_xattr(ATTR_NAME)?
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_path_buf(),
            })?;
        CheckRecord::decode(&value).ok_or_else(|| StoreError::InvalidRecord {
            path: path.to_path_buf(),
            expected: CheckRecord::ENCODED_LEN,
            len: value.len(),
        })
    }

    fn write(&self, file: &File, _path: &Path, record: &CheckRecord) -> StoreResult<()> {
        if self.dry_run {
            return Ok(());
        }
        file.set_xattr(ATTR_NAME, &record.encode())?;
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
