//! CLI argument parsing and validated scan configuration
//!
//! CLI flags are parsed with clap derive macros, then validated into an
//! immutable [`ScanConfig`] that is passed into the walker and policies.
//! All validation failures surface before any walking begins.

use crate::error::ConfigError;
use crate::progress::ReportMode;
use clap::Parser;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Detect accidental data corruption (bitrot) in file trees
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bitsum",
    version,
    about = "Detect accidental data corruption (bitrot) in file trees",
    long_about = "Detects accidental data corruption (e.g. bitrot, storage media \
                  problems). Not intended to detect malicious modification.\n\n\
                  A CRC32C checksum and reference mtime are kept per file, either \
                  in the file's extended attributes (default) or in a SQLite \
                  database (--db). Directories given as roots are processed \
                  recursively.",
    after_help = "EXAMPLES:\n    \
        bitsum generate /data            # write checksums for new files\n    \
        bitsum verify /data              # verify, non-zero exit on corruption\n    \
        bitsum update /data              # verify and refresh changed files\n    \
        bitsum -x --db sums.db verify /  # sqlite store, one filesystem"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose mode (list each file)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode (no progress output)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry-run mode (do not write anything)
    #[arg(short = 'n', long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Don't cross filesystem boundaries
    #[arg(short = 'x', long = "one-filesystem", global = true)]
    pub one_filesystem: bool,

    /// Force TTY-style progress output
    #[arg(long = "force-tty", global = true)]
    pub force_tty: bool,

    /// Exclude this path (can be repeated)
    #[arg(long = "exclude", global = true, value_name = "PATH", action = clap::ArgAction::Append)]
    pub exclude: Vec<PathBuf>,

    /// Exclude paths matching this regexp (can be repeated)
    #[arg(long = "exclude-re", global = true, value_name = "REGEX", action = clap::ArgAction::Append)]
    pub exclude_re: Vec<String>,

    /// Percentage of files to process (0 = none, 100 = all)
    #[arg(long = "subset-pct", global = true, default_value_t = 100, value_name = "PCT")]
    pub subset_pct: u32,

    /// Seed for the subset selection PRNG, useful for testing (0 = random)
    #[arg(long = "subset-seed", global = true, default_value_t = 0, value_name = "SEED")]
    pub subset_seed: u64,

    /// Store checksums in a SQLite database at this path instead of
    /// extended attributes
    #[arg(long = "db", global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'w', long, global = true, default_value_t = default_workers(), value_name = "NUM")]
    pub workers: usize,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Write checksums for files that have none; existing checksums are
    /// left untouched and not verified
    Generate {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Verify checksums in the given paths
    Verify {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Verify checksums, updating them for new or changed files
    Update {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Print version information
    Version,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(16)
}

/// Validated, immutable configuration for one scan invocation
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root paths to walk, in order
    pub roots: Vec<PathBuf>,

    /// Worker thread count
    pub workers: usize,

    /// Don't cross filesystem boundaries
    pub one_filesystem: bool,

    /// Literal paths to exclude (cleaned)
    pub exclude: HashSet<PathBuf>,

    /// Compiled exclusion patterns, in flag order
    pub exclude_re: Vec<Regex>,

    /// Subset percentage (0..=100)
    pub subset_percent: u32,

    /// Subset PRNG seed (0 = random)
    pub subset_seed: u64,

    /// How progress is rendered
    pub report: ReportMode,
}

impl ScanConfig {
    /// Validate CLI arguments into a scan configuration for `roots`.
    pub fn from_args(args: &CliArgs, roots: Vec<PathBuf>) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.subset_pct > 100 {
            return Err(ConfigError::InvalidSubsetPercent {
                percent: args.subset_pct,
            });
        }

        let exclude: HashSet<PathBuf> = args.exclude.iter().map(|p| clean_path(p)).collect();

        let exclude_re = args
            .exclude_re
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| ConfigError::InvalidExcludePattern {
                    pattern: pattern.clone(),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            roots,
            workers: args.workers,
            one_filesystem: args.one_filesystem,
            exclude,
            exclude_re,
            subset_percent: args.subset_pct,
            subset_seed: args.subset_seed,
            report: ReportMode::detect(args.verbose, args.quiet, args.force_tty),
        })
    }

    /// Whether `path` is excluded. Literal paths are checked before the
    /// pattern list; the order is observable because exclusion also
    /// suppresses traversal errors.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude.contains(&clean_path(path)) {
            return true;
        }
        let text = path.to_string_lossy();
        self.exclude_re.iter().any(|re| re.is_match(&text))
    }
}

/// Normalize a path lexically (drops `.` components and trailing
/// separators) so literal exclusions compare predictably. `Components`
/// keeps a leading `.`, so it is filtered explicitly.
fn clean_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
