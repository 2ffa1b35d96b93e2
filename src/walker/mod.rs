//! Directory walker and scan orchestration
//!
//! The walk is single-threaded: traversal order, subtree-skip decisions and
//! the subset draw are inherently sequential. Checksum computation and
//! store I/O are parallelized by handing (handle, metadata) items to the
//! worker pool over a bounded queue, which throttles traversal to checksum
//! throughput. Between entries the walker polls the pool's error channel
//! and aborts on the first error observed.

pub mod pool;

use crate::config::ScanConfig;
use crate::error::{BitsumError, Result};
use crate::policy::Policy;
use crate::progress::{Counts, Progress, Reporter};
use crate::store::ChecksumStore;
use crate::subset::Subset;
use std::fs::{self, File};
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

pub use pool::{WorkItem, WorkerPool};

/// Per-filesystem identifier, equality-comparable only
pub type DeviceId = u64;

/// What to do with one traversal entry
enum EntryAction {
    /// Not a file to process; keep walking
    Skip,

    /// Do not descend into this directory (or the rest of this file's
    /// directory)
    SkipSubtree,

    /// Hand the opened file to the pool
    Process(WorkItem),
}

/// Walk every root and apply `policy` to each selected regular file.
///
/// Returns the final counters on success. Fails with the first traversal,
/// open or worker error observed, or with a corruption summary when files
/// were classified corrupted and nothing harder went wrong.
pub fn scan(
    config: &ScanConfig,
    store: Arc<dyn ChecksumStore>,
    policy: Policy,
) -> Result<Counts> {
    let progress = Arc::new(Progress::new(config.report));
    let reporter = Reporter::spawn(Arc::clone(&progress))?;
    let mut subset = Subset::new(config.subset_percent, config.subset_seed)?;
    let pool = WorkerPool::spawn(config.workers, policy, store, Arc::clone(&progress))?;

    info!(
        roots = config.roots.len(),
        workers = config.workers,
        policy = ?policy,
        "starting scan"
    );

    let mut walk_err: Option<BitsumError> = None;
    'roots: for root in &config.roots {
        let root_dev = device_for_path(root);
        let mut entries = WalkDir::new(root).into_iter();
        loop {
            // A worker error stops the walk immediately; queued items still
            // drain below.
            if let Some(err) = pool.poll_error() {
                walk_err = Some(err);
                break 'roots;
            }

            let next = match entries.next() {
                Some(next) => next,
                None => break,
            };
            match examine_entry(config, root_dev, &mut subset, next) {
                Ok(EntryAction::Skip) => {}
                Ok(EntryAction::SkipSubtree) => entries.skip_current_dir(),
                Ok(EntryAction::Process(item)) => {
                    if let Err(err) = pool.submit(item) {
                        walk_err = Some(err);
                        break 'roots;
                    }
                }
                Err(err) => {
                    walk_err = Some(err);
                    break 'roots;
                }
            }
        }
    }

    let late_err = pool.finish();
    reporter.stop();

    let counts = progress.snapshot();
    if let Some(err) = first_error(walk_err, late_err) {
        return Err(err);
    }
    if counts.corrupted > 0 {
        return Err(BitsumError::Corruption {
            count: counts.corrupted,
        });
    }
    Ok(counts)
}

/// Classify one traversal entry.
///
/// The order of checks is load-bearing:
/// 1. exclusion first, so excluded paths can suppress traversal errors and
///    excluded directories skip their whole subtree;
/// 2. surviving traversal errors abort the walk;
/// 3. directories and non-regular files are never processed;
/// 4. metadata is captured by stat *before* the file is opened (the mtime
///    race heuristic depends on this);
/// 5. the one-filesystem boundary is checked against that metadata, so
///    foreign-device entries are skipped without being opened;
/// 6. the subset draw happens last, just before the open.
fn examine_entry(
    config: &ScanConfig,
    root_dev: DeviceId,
    subset: &mut Subset,
    next: walkdir::Result<DirEntry>,
) -> Result<EntryAction> {
    let entry = match next {
        Ok(entry) => entry,
        Err(err) => {
            // Exclusion can be used to silence directories that would
            // otherwise fail the walk.
            if err.path().is_some_and(|p| config.is_excluded(p)) {
                return Ok(EntryAction::Skip);
            }
            return Err(err.into());
        }
    };

    let path = entry.path();
    if config.is_excluded(path) {
        debug!(path = %path.display(), "excluded");
        return Ok(if entry.file_type().is_dir() {
            EntryAction::SkipSubtree
        } else {
            EntryAction::Skip
        });
    }

    if entry.file_type().is_dir() {
        if config.one_filesystem && entry.metadata()?.dev() != root_dev {
            debug!(path = %path.display(), "filesystem boundary, skipping subtree");
            return Ok(EntryAction::SkipSubtree);
        }
        // Directories are descended, never processed.
        return Ok(EntryAction::Skip);
    }
    if !entry.file_type().is_file() {
        return Ok(EntryAction::Skip);
    }

    // Stat before open; this metadata is what the policies trust.
    let metadata = entry.metadata()?;
    if config.one_filesystem && metadata.dev() != root_dev {
        return Ok(EntryAction::SkipSubtree);
    }

    if !subset.should_process() {
        return Ok(EntryAction::Skip);
    }

    let file = File::open(path)
        .map_err(|err| BitsumError::in_file(path.to_path_buf(), err))?;
    Ok(EntryAction::Process(WorkItem {
        file,
        path: path.to_path_buf(),
        metadata,
    }))
}

/// Pick the invocation's single error. A failed submit means the pool
/// already shut down on a worker error, so the error recovered at join
/// time is the real cause and outranks `PoolClosed`.
fn first_error(
    walk_err: Option<BitsumError>,
    late_err: Option<BitsumError>,
) -> Option<BitsumError> {
    match (walk_err, late_err) {
        (Some(BitsumError::PoolClosed), Some(late)) => Some(late),
        (Some(err), _) => Some(err),
        (None, late) => late,
    }
}

/// Device id of a root. Failures return 0; the same failure surfaces
/// properly once the walk reaches the root.
fn device_for_path(path: &Path) -> DeviceId {
    fs::metadata(path).map(|meta| meta.dev()).unwrap_or(0)
}
