//! Bounded CPU worker pool
//!
//! This module implements the start/progress/stop protocol between a
//! coordinator, N workers and N stream validators.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────────────┐
//!                     │     PoolCoordinator      │
//!                     │  - one pair per worker   │
//!                     │  - sends Start tokens    │
//!                     └────────────┬─────────────┘
//!              control (Start)     │
//!       ┌──────────────────────────┼──────────────────────────┐
//!       │                          │                          │
//! ┌─────▼─────┐              ┌─────▼─────┐              ┌─────▼─────┐
//! │ Worker 0  │              │ Worker 1  │     ...      │ Worker N  │
//! └─────┬─────┘              └─────┬─────┘              └─────┬─────┘
//!       │ data (Progress*, Stop)   │                          │
//! ┌─────▼─────┐              ┌─────▼─────┐              ┌─────▼─────┐
//! │Validator 0│              │Validator 1│     ...      │Validator N│
//! └─────┬─────┘              └─────┬─────┘              └─────┬─────┘
//!       └──────────────────────────┼──────────────────────────┘
//!                                  │ Done / Fault
//!                     ┌────────────▼─────────────┐
//!                     │    CompletionBarrier     │
//!                     │  (fan-in channel)        │
//!                     └──────────────────────────┘
//! ```

pub mod barrier;
pub mod channel;
pub mod coordinator;
pub mod message;
pub mod validator;
pub mod worker;
pub mod workload;

pub use barrier::{CompletionBarrier, CompletionHandle, CompletionSignal};
pub use channel::{ChannelPair, ChannelStats, ControlSender, ValidatorEnd, WorkerEnd};
pub use coordinator::{PoolCoordinator, RunPhase, RunProgress, RunResult};
pub use message::{Control, Data, WorkerId};
pub use validator::{validate_stream, StreamSummary, Validator};
pub use worker::{run_worker, Worker, WorkerReport};
pub use workload::{SqrtDrift, Workload};
