//! Error types for the ring benchmark engine.
//!
//! Nothing in the engine is retried: the ring has a hard sequential dependency
//! between neighbours, so a desynchronised rank would deadlock the others.
//! Every error carries enough context to print a diagnostic naming the rank,
//! and `failure_action` tells the driver how far the termination must reach.

use crate::substrate::SubstrateError;
use thiserror::Error;

/// How the driver must terminate after an engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Exit the local process with a failure status
    ExitProcess,
    /// Tear down every process of the distributed job
    AbortJob,
}

/// Failure of a trial, a sweep step or a collective reduction
#[derive(Debug, Error)]
pub enum RingError {
    /// The envelope cannot hold both markers, the tag and a payload slot
    #[error("message size {size} is too small, at least 3 elements are required")]
    MessageTooSmall { size: usize },

    #[error("mode {mode} requires at least {required} processes, got {actual}")]
    NotEnoughProcesses {
        mode: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("message sizes differ on rank {rank}: {probed} <-> {expected}")]
    SizeMismatch {
        rank: usize,
        expected: usize,
        probed: usize,
    },

    #[error("barrier was not successful on rank {rank}")]
    BarrierFailed {
        rank: usize,
        #[source]
        source: SubstrateError,
    },

    #[error("substrate failure on rank {rank}")]
    Substrate {
        rank: usize,
        #[source]
        source: SubstrateError,
    },

    #[error("monotonic clock unavailable: {0}")]
    Clock(#[from] nix::errno::Errno),
}

impl RingError {
    /// Map the error to the termination scope it demands.
    ///
    /// Precondition and protocol violations stop the offending process;
    /// substrate failures take the whole job down.
    pub fn failure_action(&self) -> FailureAction {
        match self {
            RingError::MessageTooSmall { .. }
            | RingError::NotEnoughProcesses { .. }
            | RingError::SizeMismatch { .. }
            | RingError::Clock(_) => FailureAction::ExitProcess,
            RingError::BarrierFailed { .. } | RingError::Substrate { .. } => {
                FailureAction::AbortJob
            }
        }
    }
}

pub type RingResult<T> = std::result::Result<T, RingError>;
