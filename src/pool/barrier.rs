//! Completion barrier built on a fan-in channel
//!
//! Validators hold cloned [`CompletionHandle`]s and send exactly one signal
//! each. The coordinator owns the single receiver and waits until every
//! worker has reported `Done`. A `Fault` short-circuits the wait.

use crate::error::{LoadError, ProtocolError, Result};
use crate::pool::validator::StreamSummary;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, warn};

/// Default interval between progress ticks while waiting
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Signal sent by a validator when its stream ends
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionSignal {
    /// Stream ended with Stop after valid progress
    Done(StreamSummary),

    /// Stream violated the protocol
    Fault(ProtocolError),
}

/// Sending side of the completion channel (clone one per validator)
#[derive(Clone)]
pub struct CompletionHandle {
    sender: Sender<CompletionSignal>,
}

impl CompletionHandle {
    /// Report a successfully validated stream
    pub fn done(&self, summary: StreamSummary) {
        if self.sender.send(CompletionSignal::Done(summary)).is_err() {
            debug!(worker = summary.worker, "Completion barrier already released");
        }
    }

    /// Report a protocol violation
    pub fn fault(&self, error: ProtocolError) {
        if let Err(e) = self.sender.send(CompletionSignal::Fault(error)) {
            warn!(signal = ?e.into_inner(), "Completion barrier already released");
        }
    }
}

/// Waits for one completion signal per worker
pub struct CompletionBarrier {
    expected: usize,
    sender: Sender<CompletionSignal>,
    receiver: Receiver<CompletionSignal>,
}

impl CompletionBarrier {
    /// Create a barrier expecting `expected` completions
    pub fn new(expected: usize) -> Self {
        let (sender, receiver) = unbounded();

        Self {
            expected,
            sender,
            receiver,
        }
    }

    /// Number of completions this barrier waits for
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Get a handle for a validator
    pub fn handle(&self) -> CompletionHandle {
        CompletionHandle {
            sender: self.sender.clone(),
        }
    }

    /// Block until every worker has completed
    pub fn wait(self) -> Result<Vec<StreamSummary>> {
        self.wait_with(DEFAULT_TICK, |_| {})
    }

    /// Block until every worker has completed, calling `on_tick` with the
    /// completed count whenever `tick` passes without a signal
    ///
    /// Returns the summaries indexed by worker id.
    pub fn wait_with<F>(self, tick: Duration, mut on_tick: F) -> Result<Vec<StreamSummary>>
    where
        F: FnMut(usize),
    {
        let Self {
            expected,
            sender,
            receiver,
        } = self;
        // Only validators may keep the channel open
        drop(sender);

        let mut slots: Vec<Option<StreamSummary>> = vec![None; expected];
        let mut received = 0;

        while received < expected {
            match receiver.recv_timeout(tick) {
                Ok(CompletionSignal::Done(summary)) => {
                    let slot = slots.get_mut(summary.worker).ok_or(
                        ProtocolError::UnknownWorker {
                            worker: summary.worker,
                            pool_size: expected,
                        },
                    )?;
                    if slot.is_some() {
                        return Err(ProtocolError::DuplicateCompletion {
                            worker: summary.worker,
                        }
                        .into());
                    }
                    *slot = Some(summary);
                    received += 1;
                    debug!(worker = summary.worker, received, "Worker completed");
                }
                Ok(CompletionSignal::Fault(error)) => return Err(error.into()),
                Err(RecvTimeoutError::Timeout) => on_tick(received),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(LoadError::BarrierClosed {
                        received,
                        expected,
                    });
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::message::WorkerId;
    use std::thread;

    fn summary(worker: WorkerId) -> StreamSummary {
        StreamSummary {
            worker,
            progress_messages: 4,
            last_iteration: Some(6),
        }
    }

    #[test]
    fn test_barrier_fan_in() {
        let barrier = CompletionBarrier::new(8);
        assert_eq!(barrier.expected(), 8);
        let handles: Vec<_> = (0..8)
            .rev()
            .map(|id| {
                let handle = barrier.handle();
                thread::spawn(move || handle.done(summary(id)))
            })
            .collect();

        let summaries = barrier.wait().unwrap();
        for h in handles {
            h.join().unwrap();
        }

        let ids: Vec<_> = summaries.iter().map(|s| s.worker).collect();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_barrier_fault_short_circuits() {
        let barrier = CompletionBarrier::new(3);
        let ok = barrier.handle();
        let bad = barrier.handle();
        // Third handle stays alive and never signals
        let _silent = barrier.handle();

        ok.done(summary(0));
        bad.fault(ProtocolError::DataChannelClosed { worker: 1 });

        let err = barrier.wait().unwrap_err();
        assert!(matches!(
            err,
            LoadError::Protocol(ProtocolError::DataChannelClosed { worker: 1 })
        ));
    }

    #[test]
    fn test_barrier_duplicate_completion() {
        let barrier = CompletionBarrier::new(2);
        let handle = barrier.handle();
        handle.done(summary(1));
        handle.done(summary(1));

        assert!(matches!(
            barrier.wait(),
            Err(LoadError::Protocol(ProtocolError::DuplicateCompletion { worker: 1 }))
        ));
    }

    #[test]
    fn test_barrier_unknown_worker() {
        let barrier = CompletionBarrier::new(2);
        barrier.handle().done(summary(9));

        assert!(matches!(
            barrier.wait(),
            Err(LoadError::Protocol(ProtocolError::UnknownWorker {
                worker: 9,
                pool_size: 2
            }))
        ));
    }

    #[test]
    fn test_barrier_closed_without_signals() {
        let barrier = CompletionBarrier::new(2);
        let handle = barrier.handle();
        handle.done(summary(0));
        drop(handle);

        assert!(matches!(
            barrier.wait(),
            Err(LoadError::BarrierClosed {
                received: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn test_barrier_ticks_while_waiting() {
        let barrier = CompletionBarrier::new(1);
        let handle = barrier.handle();
        let late = thread::spawn(move || {
            thread::sleep(Duration::from_millis(60));
            handle.done(summary(0));
        });

        let mut ticks = 0;
        barrier
            .wait_with(Duration::from_millis(5), |completed| {
                assert_eq!(completed, 0);
                ticks += 1;
            })
            .unwrap();
        late.join().unwrap();
        assert!(ticks > 0);
    }
}
