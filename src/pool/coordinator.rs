//! Pool coordinator - orchestrates one run of the worker pool
//!
//! The coordinator is responsible for:
//! - Allocating one channel pair per worker
//! - Launching workers and releasing them with a Start token
//! - Launching one validator per data stream
//! - Waiting on the completion barrier, failing fast on any violation
//! - Joining threads and collecting final statistics
//!
//! ```text
//! Setup -> Launched -> Started -> AwaitingCompletion -> Done
//! ```

use crate::config::RunConfig;
use crate::error::{LoadError, Result};
use crate::pool::barrier::{CompletionBarrier, DEFAULT_TICK};
use crate::pool::channel::{ChannelPair, ChannelStats, ControlSender, ValidatorEnd};
use crate::pool::message::Control;
use crate::pool::validator::Validator;
use crate::pool::worker::{Worker, WorkerReport};
use crate::pool::workload::{SqrtDrift, Workload};
use crate::progress::ProgressReporter;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// How long to wait for a faulting worker's thread to exit
const ROOT_CAUSE_GRACE: Duration = Duration::from_secs(1);

/// Phase of a pool run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    /// Channels allocated, nothing running
    Setup,
    /// Worker threads spawned, blocked on their control channels
    Launched,
    /// Start sent to every worker
    Started,
    /// Validators running, waiting on the completion barrier
    AwaitingCompletion,
    /// All streams validated
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Setup => "setup",
            RunPhase::Launched => "launched",
            RunPhase::Started => "started",
            RunPhase::AwaitingCompletion => "awaiting-completion",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunResult {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Time taken from setup to done
    pub duration: Duration,

    /// Per-worker reports, indexed by worker id
    pub workers: Vec<WorkerReport>,

    /// Progress messages validated across all workers
    pub progress_messages: u64,

    /// Sends that found a data channel full
    pub backpressure_events: u64,

    /// Iterations executed across all workers
    pub total_iterations: u64,
}

impl RunResult {
    /// Aggregate iteration rate
    pub fn iterations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_iterations as f64 / secs
        } else {
            0.0
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct RunProgress {
    /// Progress messages validated so far
    pub messages: u64,

    /// Progress messages expected in total
    pub expected_messages: u64,

    /// Workers whose streams have completed
    pub completed_workers: usize,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl RunProgress {
    /// Calculate validated messages per second
    pub fn messages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.messages as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates one run of the worker pool
pub struct PoolCoordinator<W: Workload = SqrtDrift> {
    /// Configuration
    config: RunConfig,

    /// Per-iteration workload, shared read-only by all workers
    workload: Arc<W>,

    /// Per-worker channel statistics
    stats: Vec<Arc<ChannelStats>>,

    /// Current phase
    phase: RunPhase,
}

impl PoolCoordinator<SqrtDrift> {
    /// Create a coordinator running the default workload
    pub fn new(config: RunConfig) -> Self {
        Self::with_workload(config, SqrtDrift)
    }
}

impl<W: Workload> PoolCoordinator<W> {
    /// Create a coordinator running a custom workload
    pub fn with_workload(config: RunConfig, workload: W) -> Self {
        Self {
            config,
            workload: Arc::new(workload),
            stats: Vec::new(),
            phase: RunPhase::Setup,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Current phase
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Snapshot of validated progress
    pub fn progress(&self, completed_workers: usize, elapsed: Duration) -> RunProgress {
        RunProgress {
            messages: self.stats.iter().map(|s| s.accepted()).sum(),
            expected_messages: self.config.expected_progress_total(),
            completed_workers,
            total_workers: self.config.worker_count,
            elapsed,
        }
    }

    /// Run the pool to completion
    ///
    /// Any protocol violation aborts the run immediately: threads still
    /// running are detached and left to the caller's process exit.
    pub fn run(mut self, reporter: Option<&ProgressReporter>) -> Result<RunResult> {
        let start_time = Instant::now();
        let started_at = Utc::now();

        info!(
            workers = self.config.worker_count,
            iterations = self.config.iterations,
            channel_capacity = self.config.channel_capacity,
            "Setting things up"
        );

        // Setup: one pair per worker, split by ownership
        let mut controls = Vec::with_capacity(self.config.worker_count);
        let mut worker_ends = Vec::with_capacity(self.config.worker_count);
        let mut validator_ends = Vec::with_capacity(self.config.worker_count);
        for id in 0..self.config.worker_count {
            let pair = ChannelPair::new(id, self.config.channel_capacity);
            self.stats.push(pair.stats());
            let (control, worker, validator) = pair.into_ends();
            controls.push(control);
            worker_ends.push(worker);
            validator_ends.push(validator);
        }

        // Launched
        let mut workers = Vec::with_capacity(self.config.worker_count);
        for end in worker_ends {
            workers.push(Worker::spawn(
                end,
                self.config.iterations,
                self.config.progress_interval(),
                Arc::clone(&self.workload),
            )?);
        }
        self.advance(RunPhase::Launched);

        // Started
        self.release(&controls)?;
        self.advance(RunPhase::Started);

        // AwaitingCompletion
        let barrier = CompletionBarrier::new(self.config.worker_count);
        let validators = self.spawn_validators(validator_ends, &barrier)?;
        self.advance(RunPhase::AwaitingCompletion);

        let waited = barrier.wait_with(DEFAULT_TICK, |completed| {
            if let Some(r) = reporter {
                r.update(&self.progress(completed, start_time.elapsed()));
            }
        });

        if let Err(e) = waited {
            return Err(root_cause(e, workers));
        }

        if let Some(r) = reporter {
            r.update(&self.progress(self.config.worker_count, start_time.elapsed()));
        }

        let reports = join_all(workers, validators)?;
        self.advance(RunPhase::Done);

        let duration = start_time.elapsed();
        let result = RunResult {
            started_at,
            duration,
            progress_messages: self.stats.iter().map(|s| s.accepted()).sum(),
            backpressure_events: self
                .stats
                .iter()
                .map(|s| s.backpressure_events.load(Ordering::Relaxed))
                .sum(),
            total_iterations: reports.iter().map(|r| r.iterations).sum(),
            workers: reports,
        };

        info!(
            progress_messages = result.progress_messages,
            backpressure_events = result.backpressure_events,
            duration_secs = duration.as_secs_f64(),
            "All done"
        );

        Ok(result)
    }

    /// Send the Start token on every control channel
    fn release(&self, controls: &[ControlSender]) -> Result<()> {
        info!("Starting the workers");
        for control in controls {
            control.send(Control::Start)?;
        }
        info!("All started - waiting for them to finish");
        Ok(())
    }

    /// Spawn one validator per data stream
    fn spawn_validators(
        &self,
        ends: Vec<ValidatorEnd>,
        barrier: &CompletionBarrier,
    ) -> Result<Vec<Validator>> {
        let validators = ends
            .into_iter()
            .map(|end| Validator::spawn(end, barrier.handle()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(count = validators.len(), "Validators spawned");
        Ok(validators)
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(next > self.phase, "phase {} after {}", next, self.phase);
        info!(from = %self.phase, to = %next, "Run phase");
        self.phase = next;
    }
}

/// Prefer the worker's own violation over the validator's view of it
fn root_cause(err: LoadError, workers: Vec<Worker>) -> LoadError {
    let culprit = match &err {
        LoadError::Protocol(violation) => violation.worker(),
        _ => {
            error!(error = %err, "Run aborted");
            return err;
        }
    };
    let worker = workers.into_iter().find(|w| w.id() == culprit);

    // A closed stream means the worker is on its way out; give it a moment
    // to exit so its own error can be joined without blocking indefinitely
    if let Some(worker) = worker.filter(|w| w.wait_finished(ROOT_CAUSE_GRACE)) {
        match worker.join() {
            Ok(Err(own)) => {
                error!(worker = culprit, error = %own, "Run aborted by worker");
                return LoadError::Protocol(own);
            }
            Err(panicked) => {
                error!(worker = culprit, error = %panicked, "Run aborted by worker");
                return LoadError::Worker(panicked);
            }
            Ok(Ok(_)) => {}
        }
    }

    error!(worker = culprit, error = %err, "Run aborted by validator");
    err
}

/// Join every thread; all streams have ended so none of these block for long
fn join_all(workers: Vec<Worker>, validators: Vec<Validator>) -> Result<Vec<WorkerReport>> {
    for validator in validators {
        if let Err(e) = validator.join() {
            warn!(error = %e, "Validator failed to join cleanly");
        }
    }

    workers
        .into_iter()
        .map(|worker| worker.join()?.map_err(LoadError::from))
        .collect()
}
