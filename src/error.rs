//! Error types for cpu-load
//!
//! This module defines the error hierarchy for a pool run:
//! - Configuration errors, raised before any thread is started
//! - Protocol violations on the control, data and completion channels
//! - Worker thread errors (spawn failure, panics)
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Protocol violations are fatal: nothing here is retried
//! - Every protocol error names the worker and the offending token

use crate::pool::message::{Control, Data, WorkerId};
use thiserror::Error;

/// Top-level error type for a pool run
#[derive(Error, Debug)]
pub enum LoadError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Protocol violations
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Every completion handle was dropped before all workers finished
    #[error("Completion channel closed after {received} of {expected} signals")]
    BarrierClosed { received: usize, expected: usize },
}

/// Configuration and CLI errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: at least one worker is required")]
    InvalidWorkerCount { count: usize },

    /// Iteration budget too small to derive a progress interval
    #[error("Invalid iteration budget {iterations}: must be at least {min} (progress interval would be zero)")]
    InvalidIterationBudget { iterations: u64, min: u64 },

    /// Invalid data channel capacity
    #[error("Invalid channel capacity {capacity}: must be at least {min}")]
    InvalidChannelCapacity { capacity: usize, min: usize },
}

/// Violations of the start/progress/stop protocol
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A worker received something other than Start on its control channel
    #[error("Worker {worker} expected Start, received {received:?}")]
    UnexpectedControl { worker: WorkerId, received: Control },

    /// The control channel closed before Start was delivered
    #[error("Control channel for worker {worker} closed before Start")]
    ControlChannelClosed { worker: WorkerId },

    /// A progress message carried another worker's id
    #[error("Data channel of worker {worker} carried foreign message {received:?}")]
    ForeignProgress { worker: WorkerId, received: Data },

    /// Progress iterations did not strictly increase
    #[error("Worker {worker} reported iteration {iteration} after iteration {previous}")]
    OutOfOrderProgress {
        worker: WorkerId,
        previous: u64,
        iteration: u64,
    },

    /// The data channel closed before the Stop sentinel
    #[error("Data channel of worker {worker} closed before Stop")]
    DataChannelClosed { worker: WorkerId },

    /// The validator side of a data channel went away
    #[error("Worker {worker} could not send {message:?}: validator is gone")]
    DataReceiverGone { worker: WorkerId, message: Data },

    /// A second completion signal arrived for the same worker
    #[error("Duplicate completion signal for worker {worker}")]
    DuplicateCompletion { worker: WorkerId },

    /// A completion signal named a worker outside the pool
    #[error("Completion signal for unknown worker {worker} (pool size {pool_size})")]
    UnknownWorker { worker: WorkerId, pool_size: usize },
}

impl ProtocolError {
    /// The worker this violation is attributed to
    pub fn worker(&self) -> WorkerId {
        match self {
            ProtocolError::UnexpectedControl { worker, .. }
            | ProtocolError::ControlChannelClosed { worker }
            | ProtocolError::ForeignProgress { worker, .. }
            | ProtocolError::OutOfOrderProgress { worker, .. }
            | ProtocolError::DataChannelClosed { worker }
            | ProtocolError::DataReceiverGone { worker, .. }
            | ProtocolError::DuplicateCompletion { worker }
            | ProtocolError::UnknownWorker { worker, .. } => *worker,
        }
    }
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Thread could not be spawned
    #[error("Failed to spawn {role} {id}: {reason}")]
    SpawnFailed {
        role: &'static str,
        id: WorkerId,
        reason: String,
    },

    /// Thread panicked
    #[error("{role} {id} panicked: {message}")]
    Panicked {
        role: &'static str,
        id: WorkerId,
        message: String,
    },
}

/// Result type alias for LoadError
pub type Result<T> = std::result::Result<T, LoadError>;

/// Result type alias for ProtocolError
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
