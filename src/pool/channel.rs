//! Per-worker channel pairs with backpressure accounting
//!
//! Each worker gets one control channel (coordinator -> worker, a single
//! Start token) and one bounded data channel (worker -> validator). A pair is
//! split by value into its three ends, so the worker/channel mapping is fixed
//! by ownership and a validator can never read another worker's stream.
//!
//! When a data channel is full the worker blocks until its validator drains
//! it. Each such stall is counted as a backpressure event.

use crate::error::{ProtocolError, ProtocolResult};
use crate::pool::message::{Control, Data, WorkerId};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for one channel pair
#[derive(Debug, Default)]
pub struct ChannelStats {
    /// Progress messages sent by the worker
    pub progress_sent: AtomicU64,

    /// Progress messages accepted by the validator
    pub progress_accepted: AtomicU64,

    /// Number of sends that found the data channel full
    pub backpressure_events: AtomicU64,
}

impl ChannelStats {
    /// Progress messages sent so far
    pub fn sent(&self) -> u64 {
        self.progress_sent.load(Ordering::Relaxed)
    }

    /// Progress messages accepted so far
    pub fn accepted(&self) -> u64 {
        self.progress_accepted.load(Ordering::Relaxed)
    }

    /// Backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Control and data channels for a single worker
pub struct ChannelPair {
    worker: WorkerId,
    control_tx: Sender<Control>,
    control_rx: Receiver<Control>,
    data_tx: Sender<Data>,
    data_rx: Receiver<Data>,
    stats: Arc<ChannelStats>,
}

impl ChannelPair {
    /// Create the channel pair for `worker` with a data buffer of `capacity`
    pub fn new(worker: WorkerId, capacity: usize) -> Self {
        // One Start token, never more
        let (control_tx, control_rx) = bounded(1);
        let (data_tx, data_rx) = bounded(capacity);

        Self {
            worker,
            control_tx,
            control_rx,
            data_tx,
            data_rx,
            stats: Arc::new(ChannelStats::default()),
        }
    }

    /// Worker this pair belongs to
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Get the pair statistics
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }

    /// Split into the coordinator, worker and validator ends
    pub fn into_ends(self) -> (ControlSender, WorkerEnd, ValidatorEnd) {
        let control = ControlSender {
            worker: self.worker,
            sender: self.control_tx,
        };
        let worker = WorkerEnd {
            worker: self.worker,
            control: self.control_rx,
            data: self.data_tx,
            stats: Arc::clone(&self.stats),
        };
        let validator = ValidatorEnd {
            worker: self.worker,
            data: self.data_rx,
            stats: self.stats,
        };
        (control, worker, validator)
    }
}

/// Coordinator end of a control channel
pub struct ControlSender {
    worker: WorkerId,
    sender: Sender<Control>,
}

impl ControlSender {
    /// Worker this channel drives
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Send a control token
    ///
    /// Fails if the worker has already dropped its end.
    pub fn send(&self, token: Control) -> ProtocolResult<()> {
        self.sender
            .send(token)
            .map_err(|_| ProtocolError::ControlChannelClosed {
                worker: self.worker,
            })
    }
}

/// Worker end: control receiver plus data sender
pub struct WorkerEnd {
    worker: WorkerId,
    control: Receiver<Control>,
    data: Sender<Data>,
    stats: Arc<ChannelStats>,
}

impl WorkerEnd {
    /// Worker this end belongs to
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Block until the next control token arrives
    pub fn recv_control(&self) -> ProtocolResult<Control> {
        self.control
            .recv()
            .map_err(|_| ProtocolError::ControlChannelClosed {
                worker: self.worker,
            })
    }

    /// Send a data message, blocking if the channel is full
    pub fn emit(&self, message: Data) -> ProtocolResult<()> {
        let message = match self.data.try_send(message) {
            Ok(()) => {
                self.record_sent(&message);
                return Ok(());
            }
            Err(TrySendError::Full(message)) => {
                self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                message
            }
            Err(TrySendError::Disconnected(message)) => {
                return Err(ProtocolError::DataReceiverGone {
                    worker: self.worker,
                    message,
                });
            }
        };

        self.data
            .send(message)
            .map_err(|e| ProtocolError::DataReceiverGone {
                worker: self.worker,
                message: e.into_inner(),
            })?;
        self.record_sent(&message);
        Ok(())
    }

    fn record_sent(&self, message: &Data) {
        if !message.is_stop() {
            self.stats.progress_sent.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Validator end: data receiver
pub struct ValidatorEnd {
    worker: WorkerId,
    data: Receiver<Data>,
    stats: Arc<ChannelStats>,
}

impl ValidatorEnd {
    /// Worker whose stream this end reads
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Block until the next data message arrives
    ///
    /// A disconnected channel means the worker went away before Stop.
    pub fn recv(&self) -> ProtocolResult<Data> {
        self.data
            .recv()
            .map_err(|_| ProtocolError::DataChannelClosed {
                worker: self.worker,
            })
    }

    /// Try to receive without blocking
    pub fn try_recv(&self) -> Option<Data> {
        match self.data.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Record an accepted progress message
    pub fn record_accepted(&self) {
        self.stats.progress_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the pair statistics
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Current number of buffered messages
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no messages are buffered
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
