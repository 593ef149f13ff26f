//! # Ring Latency Benchmark Library
//!
//! Measures point-to-point message latency over a logical ring of cooperating
//! processes. Rank 0 launches a message that every other rank receives from
//! its predecessor and forwards to its successor until it returns to rank 0.
//! Each send, receive and probe call is timed individually, repeated for a
//! sweep of message sizes, reduced to summary statistics on every rank and
//! aggregated at rank 0.
//!
//! ## Architecture Overview
//!
//! - `substrate`: The message-passing seam (`Substrate` trait) with an
//!   in-process thread ring and an optional MPI adapter
//! - `ring`: Envelope layout and ring topology
//! - `modes`: The five trial strategies
//! - `sizes`: The message size sweep
//! - `metrics`: Per-rank sample collection and local reduction
//! - `aggregate`: Gathers and cross-rank combination at the coordinator
//! - `benchmark`: The per-rank sweep driver
//! - `results`: Result lines and the JSON report
//! - `cli`, `logging`, `utils`: Configuration, diagnostics and helpers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ring_latency::{BenchmarkRunner, LocalUniverse, Settings};
//! use ring_latency::timing::Elapsed;
//!
//! fn main() -> anyhow::Result<()> {
//!     let runner = BenchmarkRunner::new(Settings { ranks: 4, ..Settings::default() });
//!     LocalUniverse::new(4)?.launch(false, |mut comm| {
//!         runner.run(&mut comm, Elapsed::ZERO, None)
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;

/// Per-rank sweep driver
///
/// Runs every trial of every message size on one rank and feeds the
/// coordinator's `ResultsManager`.
pub mod benchmark;

/// Command-line interface and validated settings
pub mod cli;

pub mod error;
pub mod logging;

/// Sample collection and local reduction to summary statistics
pub mod metrics;

pub mod modes;

/// Result lines and the optional JSON report
pub mod results;

pub mod ring;
pub mod sizes;

/// Message-passing substrates
///
/// The `Substrate` trait is the only way the engine talks to other ranks.
pub mod substrate;

pub mod timing;
pub mod utils;

pub use benchmark::BenchmarkRunner;
pub use cli::{Args, Settings};
pub use error::{FailureAction, RingError, RingResult};
pub use modes::RoundTripMode;
pub use results::ResultsManager;
pub use substrate::{LocalComm, LocalUniverse, Substrate, SubstrateKind};

/// The current version of the ring latency benchmark
///
/// Populated from Cargo.toml and recorded in the JSON report.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Trials per message size
    pub const TRIALS: usize = 10;

    /// Seed of the random payload generator
    pub const SEED: u64 = 42;

    /// Delay before every trial in `round_trip_wait`, in milliseconds
    pub const WAIT_MS: u64 = 0;

    /// Smallest message size is 2^4 = 16 elements
    pub const MIN_EXPONENT: u32 = 4;

    /// Largest message size is 2^14 = 16384 elements
    pub const MAX_EXPONENT: u32 = 14;
}
