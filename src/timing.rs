//! # Monotonic Timing
//!
//! Every latency sample in the benchmark is the elapsed monotonic time of one
//! substrate call. This module provides the timestamp source and the interval
//! arithmetic used to turn a pair of readings into a sample.
//!
//! - `Timestamp`: a raw `CLOCK_MONOTONIC` reading (seconds + nanoseconds)
//! - `Elapsed`: a non-negative interval between two readings
//! - `Clock`: the timestamp source seam, so the engine can be driven by a
//!   frozen clock in tests

use nix::time::{clock_gettime, ClockId};
use serde::{Deserialize, Serialize};
use std::fmt;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A single reading of a monotonic clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: i64,
}

impl Timestamp {
    pub const fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }

    /// Interval from `start` to `self`.
    ///
    /// When the nanosecond difference is negative one second is borrowed.
    /// Readings taken out of order saturate to a zero interval.
    pub fn elapsed_since(&self, start: Timestamp) -> Elapsed {
        let (mut secs, mut nanos) = (self.secs - start.secs, self.nanos - start.nanos);
        if nanos < 0 {
            secs -= 1;
            nanos += NANOS_PER_SEC;
        }

        if secs < 0 {
            return Elapsed::ZERO;
        }

        Elapsed {
            secs: secs as u64,
            nanos: nanos as u32,
        }
    }
}

/// Non-negative time interval produced by subtracting two timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Elapsed {
    pub secs: u64,
    pub nanos: u32,
}

impl Elapsed {
    pub const ZERO: Elapsed = Elapsed { secs: 0, nanos: 0 };

    /// Interval in floating-point seconds, the unit of every sample
    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.nanos as f64 / NANOS_PER_SEC as f64
    }

    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.nanos == 0
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}

impl From<Elapsed> for std::time::Duration {
    fn from(elapsed: Elapsed) -> Self {
        std::time::Duration::new(elapsed.secs, elapsed.nanos)
    }
}

/// Source of monotonic timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> nix::Result<Timestamp>;
}

/// `CLOCK_MONOTONIC` as exposed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> nix::Result<Timestamp> {
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
        Ok(Timestamp::new(ts.tv_sec() as i64, ts.tv_nsec() as i64))
    }
}

/// A clock that never advances.
///
/// Every interval measured against it is exactly zero, which models a
/// zero-latency substrate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrozenClock(pub Timestamp);

impl Clock for FrozenClock {
    fn now(&self) -> nix::Result<Timestamp> {
        Ok(self.0)
    }
}
