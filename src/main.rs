use anyhow::Context;
use bitsum::store::{ChecksumStore, SqliteStore, XattrStore};
use bitsum::{CliArgs, Command, Policy, ScanConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    let (policy, roots) = match &args.command {
        Command::Generate { paths } => (Policy::Generate, paths.clone()),
        Command::Verify { paths } => (Policy::Verify, paths.clone()),
        Command::Update { paths } => (Policy::Update, paths.clone()),
        Command::Version => {
            println!("bitsum {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let config = ScanConfig::from_args(&args, roots).context("invalid configuration")?;
    let store = open_store(&args, &config.roots).context("failed to open checksum store")?;

    debug!(
        workers = config.workers,
        subset = config.subset_percent,
        "starting scan"
    );
    let scan_result = bitsum::scan(&config, Arc::clone(&store), policy);
    // Close the store even when the scan failed, but let the scan error
    // take precedence.
    let close_result = store.close();

    let counts = scan_result?;
    close_result.context("failed to close checksum store")?;

    info!(
        matched = counts.matched,
        modified = counts.modified,
        new = counts.new_records,
        "scan complete"
    );
    Ok(())
}

fn open_store(args: &CliArgs, roots: &[PathBuf]) -> anyhow::Result<Arc<dyn ChecksumStore>> {
    match &args.db {
        Some(db_path) => {
            let root = roots.first().cloned().unwrap_or_else(|| PathBuf::from("/"));
            let store = SqliteStore::open(db_path, &root, args.dry_run)
                .with_context(|| format!("cannot open database '{}'", db_path.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(XattrStore::new(args.dry_run))),
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "bitsum=debug,warn"
    } else {
        "bitsum=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
