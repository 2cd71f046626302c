//! Progress reporting for pool runs
//!
//! Provides a live progress bar over validated progress messages using
//! indicatif, plus the header and summary printed around a run.

use crate::config::RunConfig;
use crate::pool::{RunProgress, RunResult};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays run status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter expecting `total` progress messages
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress template")
                .progress_chars("=> ")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &RunProgress) {
        self.bar.set_length(progress.expected_messages);
        self.bar.set_position(progress.messages);

        let msg = format!(
            "Workers done: {}/{} | Rate: {:.1} msg/s",
            progress.completed_workers,
            progress.total_workers,
            progress.messages_per_second(),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of the run
pub fn print_header(config: &RunConfig) {
    println!();
    println!(
        "{} {}",
        style("cpu-load").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} ({} logical CPUs)",
        style("Workers:").bold(),
        config.worker_count,
        num_cpus::get()
    );
    println!(
        "  {} {}",
        style("Iterations:").bold(),
        format_number(config.iterations)
    );
    println!(
        "  {} every {} iterations",
        style("Progress:").bold(),
        format_number(config.progress_interval())
    );
    println!(
        "  {} {}",
        style("Channel capacity:").bold(),
        config.channel_capacity
    );
    println!();
}

/// Print a summary of the run results
pub fn print_summary(result: &RunResult) {
    println!();
    println!("{}", style("Run Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Started:").bold(),
        result.started_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    );
    println!(
        "  {} {}",
        style("Workers:").bold(),
        format_number(result.workers.len() as u64)
    );
    println!(
        "  {} {}",
        style("Progress messages:").bold(),
        format_number(result.progress_messages)
    );
    println!(
        "  {} {:.1}s ({:.0} iterations/sec)",
        style("Duration:").bold(),
        result.duration.as_secs_f64(),
        result.iterations_per_second()
    );
    if result.backpressure_events > 0 {
        println!(
            "  {} {}",
            style("Backpressure:").yellow().bold(),
            format_number(result.backpressure_events)
        );
    }
    println!();
}
