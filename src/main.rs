//! cpu-load - Bounded Worker-Pool Demonstrator
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use cpu_load::config::{CliArgs, RunConfig};
use cpu_load::pool::PoolCoordinator;
use cpu_load::progress::{print_header, print_summary, ProgressReporter};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate before any thread exists
    let config = RunConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(&config);
    }

    let progress = if config.show_progress {
        Some(ProgressReporter::new(config.expected_progress_total()))
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Starting workers...");
    }

    // Returning from here on a violation exits the process, halting any
    // threads still running
    let result = PoolCoordinator::new(config.clone())
        .run(progress.as_ref())
        .context("Worker pool aborted")?;

    if let Some(ref p) = progress {
        p.finish("All done");
    }

    if config.show_progress {
        print_summary(&result);
    }

    info!(
        workers = result.workers.len(),
        duration_secs = result.duration.as_secs_f64(),
        "Run completed"
    );

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("cpu_load=debug,warn")
    } else {
        EnvFilter::new("cpu_load=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(())
}
