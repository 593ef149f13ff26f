//! # Ring Envelope and Topology
//!
//! A ring message is a flat array of `i32`:
//!
//! ```text
//! [ START_MARKER | tag | payload ... | END_MARKER ]
//! ```
//!
//! The markers are written on every envelope but never checked on receipt.
//! Rank 0 originates every trial and receives the message back from the last
//! rank; every other rank receives from its predecessor and forwards to its
//! successor.

use crate::error::{RingError, RingResult};
use crate::substrate::Substrate;
use rand::{Rng, RngCore};

/// First element of every envelope
pub const START_MARKER: i32 = 232_323;

/// Last element of every envelope
pub const END_MARKER: i32 = 424_242;

/// Tag value asking the originator to fill the payload with random values
pub const RANDOM_FILL_TAG: i32 = -1;

/// Smallest envelope that holds both markers and the tag
pub const MIN_MESSAGE_SIZE: usize = 3;

/// Fail unless an envelope of `size` elements can be built
pub fn check_message_size(size: usize) -> RingResult<()> {
    if size < MIN_MESSAGE_SIZE {
        return Err(RingError::MessageTooSmall { size });
    }
    Ok(())
}

/// Fixed-layout message buffer sent around the ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    data: Vec<i32>,
}

impl Envelope {
    /// Build an envelope of `size` elements with markers and `tag` set.
    ///
    /// The payload is zero unless `tag` is `RANDOM_FILL_TAG` and a generator
    /// is supplied, in which case it is filled with non-negative random values.
    pub fn new(size: usize, tag: i32, rng: Option<&mut dyn RngCore>) -> RingResult<Self> {
        check_message_size(size)?;

        let mut data = vec![0; size];
        data[0] = START_MARKER;
        data[1] = tag;
        data[size - 1] = END_MARKER;

        if let (RANDOM_FILL_TAG, Some(rng)) = (tag, rng) {
            for slot in &mut data[2..size - 1] {
                *slot = rng.gen_range(0..=i32::MAX);
            }
        }

        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tag(&self) -> i32 {
        self.data[1]
    }

    pub fn payload(&self) -> &[i32] {
        &self.data[2..self.data.len() - 1]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }
}

/// Immutable identity of the calling process within the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankContext {
    pub rank: usize,
    pub size: usize,
}

impl RankContext {
    pub fn new(rank: usize, size: usize) -> Self {
        debug_assert!(size >= 1 && rank < size);
        Self { rank, size }
    }

    pub fn of(comm: &dyn Substrate) -> Self {
        Self::new(comm.rank(), comm.size())
    }

    /// Rank 0 launches every trial and closes the ring
    pub fn is_initiator(&self) -> bool {
        self.rank == 0
    }

    pub fn successor(&self) -> usize {
        (self.rank + 1) % self.size
    }

    /// Rank this process receives from; `None` on the initiator
    pub fn predecessor(&self) -> Option<usize> {
        self.rank.checked_sub(1)
    }

    /// Rank the initiator receives the message back from
    pub fn closing_source(&self) -> usize {
        self.size - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_envelope_layout() {
        let env = Envelope::new(8, 5, None).unwrap();
        assert_eq!(env.len(), 8);
        assert_eq!(env.as_slice()[0], START_MARKER);
        assert_eq!(env.tag(), 5);
        assert_eq!(env.as_slice()[7], END_MARKER);
        assert_eq!(env.payload(), &[0; 5]);
    }

    /// The smallest legal envelope has no payload at all
    #[test]
    fn test_minimum_envelope() {
        let env = Envelope::new(3, 0, None).unwrap();
        assert_eq!(env.as_slice(), &[START_MARKER, 0, END_MARKER]);
        assert!(env.payload().is_empty());
    }

    #[test]
    fn test_envelope_too_small() {
        for size in 0..3 {
            assert!(matches!(
                Envelope::new(size, 0, None),
                Err(RingError::MessageTooSmall { size: s }) if s == size
            ));
        }
    }

    /// Random fill only happens for the reserved tag and is reproducible by seed
    #[test]
    fn test_random_fill_is_seeded() {
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = Envelope::new(64, RANDOM_FILL_TAG, Some(&mut rng_a)).unwrap();
        let b = Envelope::new(64, RANDOM_FILL_TAG, Some(&mut rng_b)).unwrap();
        assert_eq!(a, b);
        assert!(a.payload().iter().any(|&v| v != 0));
        assert!(a.payload().iter().all(|&v| v >= 0));
        assert_eq!(a.as_slice()[0], START_MARKER);
        assert_eq!(a.as_slice()[63], END_MARKER);

        let mut rng = StdRng::seed_from_u64(42);
        let plain = Envelope::new(64, 3, Some(&mut rng)).unwrap();
        assert!(plain.payload().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_successor_wraps_around() {
        for size in 1..=8 {
            for rank in 0..size {
                let ctx = RankContext::new(rank, size);
                assert_eq!(ctx.successor(), (rank + 1) % size);
            }
        }
    }

    #[test]
    fn test_initiator_closes_ring_from_last_rank() {
        for size in 1..=8 {
            let ctx = RankContext::new(0, size);
            assert!(ctx.is_initiator());
            assert_eq!(ctx.predecessor(), None);
            assert_eq!(ctx.closing_source(), size - 1);
        }
    }

    #[test]
    fn test_predecessor_of_inner_ranks() {
        let ctx = RankContext::new(3, 5);
        assert_eq!(ctx.predecessor(), Some(2));
        assert!(!ctx.is_initiator());
    }
}
