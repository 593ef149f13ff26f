//! Message size sweep.
//!
//! Sizes alternate between a power of two and the point half-way to the next
//! power of two: 16, 24, 32, 48, 64, 96, ... The sequence depends only on the
//! exponent range, so every rank iterates the same sizes in the same order.

use anyhow::{bail, Result};

/// Smallest exponent whose sizes still fit an envelope
pub const MIN_EXPONENT: u32 = 2;

/// Largest exponent accepted for a sweep
pub const MAX_EXPONENT: u32 = 24;

/// Iterator over the sizes of one sweep
#[derive(Debug, Clone)]
pub struct SizeSequence {
    exponent: u32,
    max_exponent: u32,
    size: usize,
}

impl SizeSequence {
    /// Sweep from `2^min_exponent` up to `2^max_exponent`
    pub fn new(min_exponent: u32, max_exponent: u32) -> Self {
        Self {
            exponent: min_exponent,
            max_exponent,
            size: 2,
        }
    }
}

impl Default for SizeSequence {
    fn default() -> Self {
        Self::new(crate::defaults::MIN_EXPONENT, crate::defaults::MAX_EXPONENT)
    }
}

impl Iterator for SizeSequence {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.exponent > self.max_exponent {
            return None;
        }

        let power = 1usize << self.exponent;
        if self.size < power {
            self.size = power;
        } else {
            // Half-way toward the next power of two
            self.exponent += 1;
            if self.exponent > self.max_exponent {
                return None;
            }
            self.size = (self.size + (1usize << self.exponent)) / 2;
        }
        Some(self.size)
    }
}

/// The full list of sizes for an exponent range
pub fn size_sequence(min_exponent: u32, max_exponent: u32) -> Vec<usize> {
    SizeSequence::new(min_exponent, max_exponent).collect()
}

/// Reject exponent ranges that would produce unusable sizes
pub fn validate_exponent_range(min_exponent: u32, max_exponent: u32) -> Result<()> {
    if min_exponent < MIN_EXPONENT {
        bail!(
            "Minimum exponent {} is too small (must be at least {})",
            min_exponent,
            MIN_EXPONENT
        );
    }
    if max_exponent > MAX_EXPONENT {
        bail!(
            "Maximum exponent {} is too large (must be at most {})",
            max_exponent,
            MAX_EXPONENT
        );
    }
    if min_exponent > max_exponent {
        bail!(
            "Minimum exponent {} exceeds maximum exponent {}",
            min_exponent,
            max_exponent
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sweep_prefix() {
        let sizes = size_sequence(4, 14);
        assert_eq!(
            &sizes[..10],
            &[16, 24, 32, 48, 64, 96, 128, 192, 256, 384]
        );
    }

    /// The default sweep ends on the power of two of the last exponent
    #[test]
    fn test_default_sweep_ends_at_max_power() {
        let sizes = size_sequence(4, 14);
        assert_eq!(sizes.len(), 21);
        assert_eq!(sizes.last(), Some(&16384));
        assert_eq!(sizes[sizes.len() - 2], 12288);
    }

    #[test]
    fn test_sweep_is_deterministic() {
        assert_eq!(size_sequence(4, 14), size_sequence(4, 14));
        assert_eq!(
            SizeSequence::default().collect::<Vec<_>>(),
            size_sequence(4, 14)
        );
    }

    #[test]
    fn test_sweep_strictly_increasing() {
        let sizes = size_sequence(2, 20);
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
        assert!(sizes.iter().all(|&s| s >= 3));
    }

    #[test]
    fn test_single_exponent_sweep() {
        assert_eq!(size_sequence(5, 5), vec![32]);
    }

    #[test]
    fn test_validate_exponent_range() {
        assert!(validate_exponent_range(4, 14).is_ok());
        assert!(validate_exponent_range(2, 2).is_ok());
        assert!(validate_exponent_range(1, 14).is_err());
        assert!(validate_exponent_range(4, 25).is_err());
        assert!(validate_exponent_range(9, 8).is_err());
    }
}
