//! Progress aggregation and reporting
//!
//! Workers increment shared counters under one mutex; a reporter thread
//! renders them. When output is interactive (and neither quiet nor verbose)
//! a single status line is overwritten every 250ms; otherwise each
//! classified file gets one immediate line. Corrupted files are always
//! reported per-file unless quiet.

use crate::checksum::CheckRecord;
use console::style;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Reporter refresh interval
const TICK: Duration = Duration::from_millis(250);

/// How progress is rendered for this invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Single overwritten status line, refreshed periodically
    Interactive,

    /// One line per classified file, emitted immediately
    PerFile,

    /// No progress output at all
    Quiet,
}

impl ReportMode {
    /// Pick a mode from the output flags and TTY state.
    pub fn detect(verbose: bool, quiet: bool, force_tty: bool) -> Self {
        if quiet {
            ReportMode::Quiet
        } else if verbose {
            ReportMode::PerFile
        } else if force_tty || console::user_attended() {
            ReportMode::Interactive
        } else {
            ReportMode::PerFile
        }
    }
}

/// Classification counters for one invocation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub matched: u64,
    pub modified: u64,
    pub new_records: u64,
    pub corrupted: u64,
}

/// Thread-safe progress aggregator shared by all workers and the reporter
pub struct Progress {
    start: Instant,
    mode: ReportMode,
    bar: ProgressBar,
    counts: Mutex<Counts>,
}

impl Progress {
    pub fn new(mode: ReportMode) -> Self {
        let bar = if mode == ReportMode::Interactive {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{msg}").expect("invalid progress template"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            start: Instant::now(),
            mode,
            bar,
            counts: Mutex::new(Counts::default()),
        }
    }

    /// Snapshot of the current counters.
    pub fn snapshot(&self) -> Counts {
        *self.lock()
    }

    pub fn record_matched(&self, path: &Path, rec: &CheckRecord) {
        self.lock().matched += 1;
        self.per_file(|| {
            format!(
                "'{}': match (checksum:{:08x}, mtime:{})",
                path.display(),
                rec.crc32c,
                rec.modtime_usec
            )
        });
    }

    pub fn record_modified(&self, path: &Path, old: &CheckRecord, new: &CheckRecord) {
        self.lock().modified += 1;
        self.per_file(|| {
            format!(
                "'{}': file modified (not corrupted) \
                 (checksum: {:08x} -> {:08x}, mtime: {} -> {})",
                path.display(),
                old.crc32c,
                new.crc32c,
                old.modtime_usec,
                new.modtime_usec
            )
        });
    }

    pub fn record_new(&self, path: &Path, rec: &CheckRecord) {
        self.lock().new_records += 1;
        self.per_file(|| {
            format!(
                "'{}': writing checksum (checksum:{:08x}, mtime:{})",
                path.display(),
                rec.crc32c,
                rec.modtime_usec
            )
        });
    }

    /// A file with no stored record. `written` carries the record that was
    /// written for it (update mode), if any.
    pub fn record_missing(&self, path: &Path, written: Option<&CheckRecord>) {
        self.lock().new_records += 1;
        self.per_file(|| match written {
            Some(rec) => format!(
                "'{}': missing checksum record, adding it (checksum:{:08x}, mtime:{})",
                path.display(),
                rec.crc32c,
                rec.modtime_usec
            ),
            None => format!("'{}': missing checksum record", path.display()),
        });
    }

    pub fn record_corrupted(&self, path: &Path, expected: &CheckRecord, got: &CheckRecord) {
        self.lock().corrupted += 1;
        // Corruption is always reported per-file, even in interactive mode.
        let line = format!(
            "'{}': {} - expected:{:08x}, got:{:08x}",
            path.display(),
            style("FILE CORRUPTED").red().bold(),
            expected.crc32c,
            got.crc32c
        );
        match self.mode {
            ReportMode::Quiet => {}
            ReportMode::PerFile => println!("{line}"),
            ReportMode::Interactive => self.bar.println(line),
        }
    }

    /// Refresh the interactive status line.
    fn tick(&self) {
        if self.mode == ReportMode::Interactive {
            self.bar.set_message(self.status_line());
        }
    }

    /// Emit the final status line. Called exactly once, by the reporter.
    fn finish(&self) {
        match self.mode {
            ReportMode::Quiet => {}
            ReportMode::PerFile => println!("{}", self.status_line()),
            ReportMode::Interactive => self.bar.finish_with_message(self.status_line()),
        }
    }

    fn status_line(&self) -> String {
        let counts = self.snapshot();
        format!(
            "{}s: {} matched, {} modified, {} new, {} corrupted",
            self.start.elapsed().as_secs(),
            counts.matched,
            counts.modified,
            counts.new_records,
            counts.corrupted
        )
    }

    fn per_file(&self, line: impl FnOnce() -> String) {
        if self.mode == ReportMode::PerFile {
            println!("{}", line());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counts> {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Background reporter driving the periodic status line.
///
/// Started at scan begin; `stop` blocks until the final line has been
/// produced and the thread has exited.
pub struct Reporter {
    done_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Reporter {
    pub fn spawn(progress: Arc<Progress>) -> io::Result<Self> {
        let (done_tx, done_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("reporter".into())
            .spawn(move || loop {
                match done_rx.recv_timeout(TICK) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        progress.finish();
                        return;
                    }
                    Err(RecvTimeoutError::Timeout) => progress.tick(),
                }
            })?;
        Ok(Self {
            done_tx,
            handle: Some(handle),
        })
    }

    /// Stop the reporter, blocking until its final line is out.
    pub fn stop(mut self) {
        let _ = self.done_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
