//! Action-space-size stratification via adaptive quantile binning.
//!
//! Bucket boundaries depend on the full population of action-space sizes in a
//! run, so binning is a two-pass affair: collect every size first, build the
//! bins once, then assign turns against the fixed bucket set during scoring.
//!
//! The algorithm has three explicit branches:
//! 1. uniform population: one bucket covering exactly that value;
//! 2. normal population: `k+1` quantile boundaries at evenly spaced fractions,
//!    deduplicated, with the final boundary pushed up one unit so the maximum
//!    sits strictly inside the last bucket;
//! 3. collapsed-range repair: a boundary pair whose integer range comes out
//!    empty or inverted becomes a single-value bucket.

use thiserror::Error;

/// Errors from bucket assignment
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StratifyError {
    /// A size fell outside every bucket. The construction is supposed to make
    /// this impossible, so hitting it means the binning itself is broken.
    #[error("Action-space size {0} is not covered by any bucket")]
    Uncovered(usize),
}

/// Inclusive integer range of one action-space bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRange {
    pub lo: usize,
    pub hi: usize,
}

impl BinRange {
    /// Report key, e.g. `"10-24"`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}-{}", self.lo, self.hi)
    }

    #[must_use]
    pub const fn contains(&self, size: usize) -> bool {
        self.lo <= size && size <= self.hi
    }
}

/// Fixed bucket set for one run, built once from the full population
#[derive(Debug, Clone)]
pub struct ActionSpaceBins {
    ranges: Vec<BinRange>,
}

impl ActionSpaceBins {
    /// Build buckets from the population of action-space sizes.
    ///
    /// `target` is the desired bucket count; ties in the population can leave
    /// fewer after deduplication. Boundaries are lower-nearest-rank population
    /// values, so an integer population always yields contiguous, gap-free
    /// integer ranges covering `[min, max]`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn from_population(sizes: &[usize], target: usize) -> Self {
        let mut sorted = sizes.to_vec();
        sorted.sort_unstable();

        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self { ranges: Vec::new() };
        };

        // Degenerate branch: every turn has the same action-space size.
        if min == max {
            return Self {
                ranges: vec![BinRange { lo: min, hi: min }],
            };
        }

        let k = target.max(1);
        let n = sorted.len();
        let mut bounds: Vec<f64> = (0..=k)
            .map(|i| {
                let fraction = i as f64 / k as f64;
                let idx = (fraction * (n - 1) as f64).floor() as usize;
                sorted[idx] as f64
            })
            .collect();

        // Ties at extreme quantiles would otherwise produce zero-width buckets.
        bounds.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);

        // Keep the maximum strictly inside the last bucket.
        if let Some(last) = bounds.last_mut() {
            *last += 1.0;
        }

        let ranges = bounds
            .windows(2)
            .map(|pair| {
                let lo = pair[0].ceil() as usize;
                let hi = (pair[1].floor() - 1.0).max(0.0) as usize;
                if hi < lo {
                    // Collapsed-range repair
                    BinRange { lo, hi: lo }
                } else {
                    BinRange { lo, hi }
                }
            })
            .collect();

        Self { ranges }
    }

    /// Index of the bucket containing `size`.
    ///
    /// # Errors
    ///
    /// Returns [`StratifyError::Uncovered`] if no bucket contains the size,
    /// which indicates a binning bug rather than a data problem.
    pub fn assign(&self, size: usize) -> Result<usize, StratifyError> {
        self.ranges
            .iter()
            .position(|range| range.contains(size))
            .ok_or(StratifyError::Uncovered(size))
    }

    #[must_use]
    pub fn ranges(&self) -> &[BinRange] {
        &self.ranges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
