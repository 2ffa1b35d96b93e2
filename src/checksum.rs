//! Per-file check records and CRC32C computation
//!
//! A check record pairs the CRC32C (Castagnoli polynomial) of a file's
//! content with the file's modification time at the moment the checksum was
//! computed. The persisted layout is fixed at 12 bytes little-endian:
//! 4-byte checksum followed by an 8-byte signed microsecond Unix timestamp.

use std::fs::Metadata;
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;

/// Read buffer size for streaming checksum computation
const CHUNK_SIZE: usize = 64 * 1024;

/// Checksum record for one file
///
/// The modification time is always captured from metadata obtained *before*
/// the file content is read. Because files are not locked while we read
/// them, a file modified mid-read could otherwise produce a wrong checksum
/// and a false corruption report; with this ordering such a file is detected
/// later as modified instead. This relies on mtime resolution being fine
/// enough to observe the change, which is a filesystem limitation we cannot
/// work around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckRecord {
    /// CRC32C of the file contents
    pub crc32c: u32,

    /// Modification time when the checksum was computed, in Unix microseconds
    pub modtime_usec: i64,
}

impl CheckRecord {
    /// Size of the persisted little-endian layout
    pub const ENCODED_LEN: usize = 12;

    /// Compute a record from file content and pre-open metadata.
    pub fn compute<R: Read>(content: R, metadata: &Metadata) -> io::Result<Self> {
        Ok(Self {
            crc32c: stream_crc32c(content)?,
            modtime_usec: modtime_micros(metadata),
        })
    }

    /// Encode into the fixed 12-byte little-endian layout.
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[..4].copy_from_slice(&self.crc32c.to_le_bytes());
        buf[4..].copy_from_slice(&self.modtime_usec.to_le_bytes());
        buf
    }

    /// Decode from the fixed layout; `None` if the length is wrong.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return None;
        }
        let crc32c = u32::from_le_bytes(bytes[..4].try_into().ok()?);
        let modtime_usec = i64::from_le_bytes(bytes[4..].try_into().ok()?);
        Some(Self {
            crc32c,
            modtime_usec,
        })
    }
}

/// Modification time of `metadata` in Unix microseconds.
pub fn modtime_micros(metadata: &Metadata) -> i64 {
    metadata.mtime() * 1_000_000 + metadata.mtime_nsec() / 1_000
}

/// Stream CRC32C over the full content of a reader. No partial sampling.
pub fn stream_crc32c<R: Read>(mut content: R) -> io::Result<u32> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut crc = 0u32;
    loop {
        let n = content.read(&mut buf)?;
        if n == 0 {
            return Ok(crc);
        }
        crc = crc32c::crc32c_append(crc, &buf[..n]);
    }
}
