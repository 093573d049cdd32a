//! securesync CLI: bidirectional, content-encrypting bucket sync.

use clap::Parser;
use securesync::config::{Cli, RunConfig};
use securesync::error::Result;
use securesync::orchestrator;
use securesync::progress::ProgressReporter;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = RunConfig::from_cli(&cli)?;

    let reporter = Arc::new(if cli.quiet {
        ProgressReporter::disabled()
    } else {
        ProgressReporter::new()
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| securesync::error::SyncError::config(format!("failed to start async runtime: {e}")))?;

    runtime.block_on(orchestrator::run(config, reporter))
}
