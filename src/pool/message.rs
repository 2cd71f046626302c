//! Protocol tokens exchanged between the coordinator, workers and validators

use std::fmt;

/// Worker identity: index in `0..N`, fixed at construction
pub type WorkerId = usize;

/// Tokens on a worker's control channel (coordinator -> worker)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Release the worker into its compute loop
    Start,

    /// Reserved. Never sent by the coordinator; a violation if seen before Start.
    Stop,
}

/// Messages on a worker's data channel (worker -> validator)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Data {
    /// Periodic progress report
    Progress { worker: WorkerId, iteration: u64 },

    /// Final sentinel; nothing follows it
    Stop,
}

impl Data {
    /// Returns true for the Stop sentinel
    pub fn is_stop(&self) -> bool {
        matches!(self, Data::Stop)
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Progress { worker, iteration } => write!(f, "InProgress {} {}", worker, iteration),
            Data::Stop => f.write_str("Stop"),
        }
    }
}
