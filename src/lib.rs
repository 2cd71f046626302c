//! cpu-load - Bounded Worker-Pool Demonstrator
//!
//! Starts a fixed number of CPU-bound workers in parallel and drives each one
//! through a two-phase handshake over its own pair of channels, making it
//! obvious from a system monitor whether real parallelism is achieved.
//!
//! # Protocol
//!
//! - **Start barrier**: every worker blocks on its control channel until the
//!   coordinator sends `Control::Start`.
//! - **Progress**: a running worker reports `Data::Progress` every `B / 4`
//!   iterations on its bounded data channel, blocking when the buffer is full.
//! - **Termination**: a worker ends its stream with exactly one `Data::Stop`.
//! - **Validation**: one validator thread per worker checks the stream and
//!   signals on a shared completion channel.
//! - **Fail fast**: any protocol violation aborts the whole run.
//!
//! # Example
//!
//! ```bash
//! # 24 workers, one billion iterations each
//! cpu-load
//!
//! # Smaller run with debug logging
//! cpu-load -n 8 -b 100000000 -v
//! ```
//!
//! ```no_run
//! use cpu_load::{PoolCoordinator, RunConfig};
//!
//! let config = RunConfig::new(4, 1_000_000)?;
//! let result = PoolCoordinator::new(config).run(None)?;
//! assert_eq!(result.workers.len(), 4);
//! # Ok::<(), cpu_load::LoadError>(())
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod progress;

pub use config::{CliArgs, RunConfig};
pub use error::{ConfigError, LoadError, ProtocolError, Result, WorkerError};
pub use pool::{PoolCoordinator, RunPhase, RunResult};
