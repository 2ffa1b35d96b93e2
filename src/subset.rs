//! Percentage-based subset selection
//!
//! Decides, per file, whether it should be processed in this invocation so
//! that large trees can be spot-checked incrementally. One uniform draw in
//! `[0, 100)` is compared against the target percentage; 0% and 100% are
//! fast-pathed without consuming randomness so those runs are reproducible
//! regardless of seed.

use crate::error::ConfigError;
use rand::Rng;
use rand_pcg::Pcg64;

/// Pseudorandom inclusion decision at a target percentage.
///
/// Not safe for concurrent use; consulted only from the single-threaded
/// walker.
#[derive(Debug, Clone)]
pub struct Subset {
    /// Percentage of files to process (0 = none, 100 = all)
    percent: u32,

    /// PRNG for subset selection
    rng: Pcg64,
}

impl Subset {
    /// Create a selector. A `seed` of 0 draws a random seed pair from OS
    /// entropy; any other value gives a reproducible `(0, seed)` pair,
    /// useful for testing.
    pub fn new(percent: u32, seed: u64) -> Result<Self, ConfigError> {
        if percent > 100 {
            return Err(ConfigError::InvalidSubsetPercent { percent });
        }

        let (seed1, seed2) = if seed == 0 {
            let mut entropy = rand::rng();
            (entropy.random::<u64>(), entropy.random::<u64>())
        } else {
            (0, seed)
        };

        Ok(Self {
            percent,
            rng: Pcg64::new(seed1 as u128, seed2 as u128),
        })
    }

    /// Decide whether the next file should be processed.
    pub fn should_process(&mut self) -> bool {
        // Special-case 0% and 100% to avoid drawing a random number
        // unnecessarily.
        if self.percent == 100 {
            return true;
        } else if self.percent == 0 {
            return false;
        }

        self.rng.random_range(0..100u32) < self.percent
    }
}
