//! Bitrot detection for file trees
//!
//! Walks directory trees and keeps a CRC32C checksum plus a reference
//! mtime per file, either in extended attributes or in a SQLite database.
//! A later scan that finds changed content under an unchanged mtime flags
//! the file as corrupted; changed mtimes mean legitimate modification.
//!
//! The binary in `main.rs` is a thin shell: it parses arguments, opens a
//! store, and calls [`walker::scan`] with one of the three [`Policy`]
//! variants.

pub mod checksum;
pub mod config;
pub mod error;
pub mod policy;
pub mod progress;
pub mod store;
pub mod subset;
pub mod walker;

pub use checksum::CheckRecord;
pub use config::{CliArgs, Command, ScanConfig};
pub use error::{BitsumError, Result};
pub use policy::Policy;
pub use progress::{Counts, ReportMode};
pub use walker::scan;
