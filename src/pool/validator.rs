//! Stream validation for worker data channels
//!
//! One validator thread per worker reads that worker's data channel until the
//! Stop sentinel, enforcing the message contract:
//!
//! ```text
//! Progress(id, i0) Progress(id, i1) ... Progress(id, ik) Stop
//!                  with i0 < i1 < ... < ik
//! ```
//!
//! Anything else is a protocol violation, reported on the completion channel
//! as a fault so the coordinator can abort the run.

use crate::error::{ProtocolError, ProtocolResult, WorkerError};
use crate::pool::barrier::CompletionHandle;
use crate::pool::channel::ValidatorEnd;
use crate::pool::message::{Data, WorkerId};
use crate::pool::worker::panic_message;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Summary of a validated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Worker whose stream was validated
    pub worker: WorkerId,

    /// Progress messages accepted before Stop
    pub progress_messages: u64,

    /// Highest iteration index reported
    pub last_iteration: Option<u64>,
}

/// A validator thread bound to one worker's data channel
pub struct Validator {
    id: WorkerId,
    handle: Option<JoinHandle<()>>,
}

impl Validator {
    /// Spawn a validator that reports its outcome on `completion`
    pub fn spawn(end: ValidatorEnd, completion: CompletionHandle) -> Result<Self, WorkerError> {
        let id = end.worker();

        let handle = thread::Builder::new()
            .name(format!("validator-{}", id))
            .spawn(move || match validate_stream(&end) {
                Ok(summary) => completion.done(summary),
                Err(e) => {
                    error!(worker = id, error = %e, "Invalid data stream");
                    completion.fault(e);
                }
            })
            .map_err(|e| WorkerError::SpawnFailed {
                role: "validator",
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Worker this validator watches
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Wait for the validator thread to exit
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                role: "validator",
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

/// Read one worker's data channel until Stop, checking every message
pub fn validate_stream(end: &ValidatorEnd) -> ProtocolResult<StreamSummary> {
    let worker = end.worker();
    let mut progress_messages = 0u64;
    let mut last_iteration: Option<u64> = None;

    loop {
        let received = end.recv()?;
        match received {
            Data::Stop => break,
            Data::Progress {
                worker: reported,
                iteration,
            } if reported == worker => {
                if let Some(previous) = last_iteration {
                    if iteration <= previous {
                        return Err(ProtocolError::OutOfOrderProgress {
                            worker,
                            previous,
                            iteration,
                        });
                    }
                }

                debug!(worker, "{}", received);
                end.record_accepted();
                progress_messages += 1;
                last_iteration = Some(iteration);
            }
            Data::Progress { .. } => {
                return Err(ProtocolError::ForeignProgress { worker, received });
            }
        }
    }

    Ok(StreamSummary {
        worker,
        progress_messages,
        last_iteration,
    })
}
