//! Configuration types for cpu-load
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Derived protocol parameters (progress interval, expected report count)

use crate::error::ConfigError;
use clap::Parser;

/// Default number of workers
pub const DEFAULT_WORKERS: usize = 24;

/// Default iterations per worker
pub const DEFAULT_ITERATIONS: u64 = 1_000_000_000;

/// Default data channel buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Progress reports per worker over a full budget
pub const PROGRESS_REPORTS: u64 = 4;

/// Smallest budget with a non-zero progress interval
const MIN_ITERATIONS: u64 = PROGRESS_REPORTS;

/// Minimum data channel buffer
const MIN_CHANNEL_CAPACITY: usize = 1;

/// CPU load generator built on per-worker channels
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cpu-load",
    version,
    about = "Runs N CPU-bound workers in parallel and validates their progress streams",
    long_about = "Starts a fixed pool of CPU-bound workers, each gated on a Start token sent over\n\
                  its own control channel. Workers report progress on a dedicated data channel,\n\
                  one validator thread per worker checks the stream, and the run completes once\n\
                  every validator has signalled on the shared completion channel.\n\n\
                  Watch a system monitor while it runs to see whether real parallelism is achieved.",
    after_help = "EXAMPLES:\n    \
        cpu-load\n    \
        cpu-load -n 8 -b 100000000\n    \
        cpu-load -n 64 -b 1000000 -c 1 -v"
)]
pub struct CliArgs {
    /// Number of workers to launch
    #[arg(short = 'n', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Number of iterations per worker
    #[arg(short = 'b', long, default_value_t = DEFAULT_ITERATIONS, value_name = "NUM")]
    pub iterations: u64,

    /// Buffered messages per data channel before a worker blocks
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHANNEL_CAPACITY, value_name = "NUM")]
    pub channel_capacity: usize,

    /// Quiet mode - suppress header, progress bar and summary
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (per-message validator logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of workers
    pub worker_count: usize,

    /// Iterations per worker
    pub iterations: u64,

    /// Data channel capacity
    pub channel_capacity: usize,

    /// Show progress bar, header and summary
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl RunConfig {
    /// Create a validated configuration with default channel capacity
    pub fn new(worker_count: usize, iterations: u64) -> Result<Self, ConfigError> {
        let config = Self {
            worker_count,
            iterations,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            show_progress: false,
            verbose: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let config = Self {
            worker_count: args.workers,
            iterations: args.iterations,
            channel_capacity: args.channel_capacity,
            show_progress: !args.quiet,
            verbose: args.verbose,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the data channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Result<Self, ConfigError> {
        self.channel_capacity = capacity;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
            });
        }

        // B / 4 must be non-zero or the progress modulus divides by zero
        if self.iterations < MIN_ITERATIONS {
            return Err(ConfigError::InvalidIterationBudget {
                iterations: self.iterations,
                min: MIN_ITERATIONS,
            });
        }

        if self.channel_capacity < MIN_CHANNEL_CAPACITY {
            return Err(ConfigError::InvalidChannelCapacity {
                capacity: self.channel_capacity,
                min: MIN_CHANNEL_CAPACITY,
            });
        }

        Ok(())
    }

    /// Iterations between progress reports (never zero once validated)
    pub fn progress_interval(&self) -> u64 {
        self.iterations / PROGRESS_REPORTS
    }

    /// Progress messages each worker emits: iterations in `0..B` divisible by the interval
    pub fn expected_progress_per_worker(&self) -> u64 {
        (self.iterations - 1) / self.progress_interval() + 1
    }

    /// Progress messages across the whole pool
    pub fn expected_progress_total(&self) -> u64 {
        self.expected_progress_per_worker()
            .saturating_mul(self.worker_count as u64)
    }
}
