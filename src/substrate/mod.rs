//! # Message-Passing Substrate
//!
//! The benchmark measures the substrate; it does not implement a transport.
//! `Substrate` is the seam every run mode talks through: reliable, ordered,
//! blocking point-to-point messaging with tag matching, a non-consuming
//! probe, a barrier and a fixed-size gather to a root process.
//!
//! Two implementations exist:
//! - `local::LocalComm`: every rank is an OS thread in this process, wired
//!   together with crossbeam channels
//! - `mpi::MpiComm` (feature `mpi`): a thin adapter over an MPI library

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;

pub use local::{LocalComm, LocalUniverse};
#[cfg(feature = "mpi")]
pub use self::mpi::MpiComm;

/// Substrate tag carried by every ring message
pub const MESSAGE_TAG: i32 = 123_123;

/// Fixed width of a processor name record in the environment gather
pub const MAX_PROCESSOR_NAME: usize = 256;

/// Rank that receives every gather and prints the results
pub const COORDINATOR: usize = 0;

#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("peer rank {peer} is no longer reachable")]
    Disconnected { peer: usize },

    #[error("message from rank {source_rank} has {received} elements, receive buffer holds {capacity}")]
    Truncated {
        source_rank: usize,
        received: usize,
        capacity: usize,
    },

    #[error("gather contribution from rank {rank} has {actual} elements, expected {expected}")]
    GatherLength {
        rank: usize,
        expected: usize,
        actual: usize,
    },

    #[error("rank {rank} is outside a job of {size} processes")]
    InvalidRank { rank: usize, size: usize },

    #[error("substrate initialization failed: {0}")]
    Init(String),
}

/// Blocking message-passing service shared by all processes of a job
pub trait Substrate {
    /// Rank of the calling process
    fn rank(&self) -> usize;

    /// Number of processes in the job
    fn size(&self) -> usize;

    /// Name of the host or processor this rank runs on
    fn processor_name(&self) -> String;

    /// Human-readable identification of the substrate implementation
    fn library_version(&self) -> String;

    fn send(&mut self, dest: usize, tag: i32, buf: &[i32]) -> Result<(), SubstrateError>;

    /// Receive the next message from `source` carrying `tag` into `buf`.
    ///
    /// A message longer than `buf` is an error; a shorter one fills a prefix.
    fn recv(&mut self, source: usize, tag: i32, buf: &mut [i32]) -> Result<(), SubstrateError>;

    /// Element count of the next message from `source` with `tag`, without
    /// consuming it.
    fn probe(&mut self, source: usize, tag: i32) -> Result<usize, SubstrateError>;

    fn barrier(&mut self) -> Result<(), SubstrateError>;

    /// Fixed-size gather: every rank contributes `send.len()` values, the root
    /// gets the concatenation ordered by rank and every other rank `None`.
    fn gather_f64(&mut self, send: &[f64], root: usize)
        -> Result<Option<Vec<f64>>, SubstrateError>;

    /// Same contract as `gather_f64` for raw bytes
    fn gather_bytes(&mut self, send: &[u8], root: usize)
        -> Result<Option<Vec<u8>>, SubstrateError>;

    /// Terminate every process of the job with `code`
    fn abort(&self, code: i32) -> !;
}

/// Available substrate implementations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SubstrateKind {
    /// Threads of this process, one per rank
    #[clap(name = "local")]
    Local,

    /// An MPI library (requires the `mpi` cargo feature)
    #[clap(name = "mpi")]
    Mpi,
}

impl std::fmt::Display for SubstrateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubstrateKind::Local => write!(f, "Local Thread Ring"),
            SubstrateKind::Mpi => write!(f, "MPI"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substrate_kind_display() {
        assert_eq!(SubstrateKind::Local.to_string(), "Local Thread Ring");
        assert_eq!(SubstrateKind::Mpi.to_string(), "MPI");
    }
}
