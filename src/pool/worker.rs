//! Worker thread logic for the CPU-bound pool
//!
//! Each worker:
//! - Owns its state by value (seeded from its id) and its channel ends
//! - Waits for exactly one Start token on its control channel
//! - Runs its iteration budget, reporting progress every `B / 4` iterations
//! - Sends a single Stop sentinel and exits

use crate::error::{ProtocolError, ProtocolResult, WorkerError};
use crate::pool::channel::WorkerEnd;
use crate::pool::message::{Control, Data, WorkerId};
use crate::pool::workload::Workload;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Outcome of a completed worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    /// Worker ID
    pub worker: WorkerId,

    /// Iterations executed
    pub iterations: u64,

    /// Progress messages sent
    pub progress_sent: u64,

    /// State after the last iteration
    pub final_state: f64,
}

/// A worker thread running one unit of computation
pub struct Worker {
    /// Worker ID
    id: WorkerId,

    /// Thread handle
    handle: Option<JoinHandle<ProtocolResult<WorkerReport>>>,
}

impl Worker {
    /// Spawn a new worker thread
    ///
    /// The thread blocks on its control channel until the coordinator
    /// releases it with `Control::Start`.
    pub fn spawn<W: Workload>(
        end: WorkerEnd,
        iterations: u64,
        interval: u64,
        workload: Arc<W>,
    ) -> Result<Self, WorkerError> {
        let id = end.worker();
        // Worker i starts at i; the value is moved into the thread
        let seed = id as f64;

        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || run_worker(&end, iterations, interval, &*workload, seed))
            .map_err(|e| WorkerError::SpawnFailed {
                role: "worker",
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Check whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Poll until the thread has exited or `timeout` passes
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Wait for the worker to finish
    ///
    /// The outer error is a thread failure; the inner one is the worker's
    /// own protocol violation.
    pub fn join(mut self) -> Result<ProtocolResult<WorkerReport>, WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                role: "worker",
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Err(WorkerError::Panicked {
                role: "worker",
                id: self.id,
                message: "Worker already joined".into(),
            }),
        }
    }
}

/// Main worker routine: wait for Start, compute, report, Stop
///
/// `interval` must be non-zero; `RunConfig` guarantees this.
pub fn run_worker<W: Workload + ?Sized>(
    end: &WorkerEnd,
    iterations: u64,
    interval: u64,
    workload: &W,
    seed: f64,
) -> ProtocolResult<WorkerReport> {
    let id = end.worker();

    await_start(end)?;
    info!(worker = id, "Worker starting");

    let mut state = seed;
    let mut progress_sent = 0u64;

    for n in 0..iterations {
        let next = workload.step(id, state);

        if n % interval == 0 {
            end.emit(Data::Progress {
                worker: id,
                iteration: n,
            })?;
            progress_sent += 1;
            info!(worker = id, iteration = n, "InProgress");
        }

        state = next;
    }

    info!(worker = id, final_state = state, "Worker ended");
    end.emit(Data::Stop)?;

    Ok(WorkerReport {
        worker: id,
        iterations,
        progress_sent,
        final_state: state,
    })
}

/// Block for the single control token and require it to be Start
fn await_start(end: &WorkerEnd) -> ProtocolResult<()> {
    let id = end.worker();

    match end.recv_control() {
        Ok(Control::Start) => {
            debug!(worker = id, "Start token received");
            Ok(())
        }
        Ok(received) => {
            error!(worker = id, token = ?received, "Unexpected start message");
            Err(ProtocolError::UnexpectedControl {
                worker: id,
                received,
            })
        }
        Err(e) => {
            error!(worker = id, error = %e, "Control channel closed before Start");
            Err(e)
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
