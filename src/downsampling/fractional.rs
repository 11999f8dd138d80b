//! Independent per-item retention at a fixed probability.

use rand::rngs::StdRng;
use rand::Rng;

use super::sampling::create_rng;
use super::{Downsampler, DownsamplingError, ReadsDownsampler};
use crate::genomics::Locatable;

/// Granularity of the retention draw.
pub const RANDOM_POOL_SIZE: u32 = 10_000;

pub(crate) fn check_fraction(fraction: f64) -> Result<(), DownsamplingError> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(DownsamplingError::InvalidConfiguration(format!(
            "retention fraction must be within [0.0, 1.0], got {fraction}"
        )))
    }
}

/// Keeps each submitted item independently with probability `p`.
///
/// `p` is quantized to `1 / RANDOM_POOL_SIZE`: an item survives when an
/// integer draw from `0..RANDOM_POOL_SIZE` falls below
/// `floor(p * RANDOM_POOL_SIZE)`. Survivors are finalized immediately.
#[derive(Debug)]
pub struct FractionalDownsampler<T, R = StdRng> {
    selected: Vec<T>,
    cutoff_for_inclusion: u32,
    rng: R,
    discarded: usize,
}

impl<T> FractionalDownsampler<T, StdRng> {
    /// Create a downsampler with a seeded generator.
    pub fn with_seed(fraction: f64, seed: u64) -> Result<Self, DownsamplingError> {
        Self::new(fraction, create_rng(Some(seed)))
    }
}

impl<T, R: Rng> FractionalDownsampler<T, R> {
    /// Create a downsampler retaining `fraction` of its input.
    pub fn new(fraction: f64, rng: R) -> Result<Self, DownsamplingError> {
        check_fraction(fraction)?;
        Ok(Self {
            selected: Vec::new(),
            cutoff_for_inclusion: (fraction * f64::from(RANDOM_POOL_SIZE)) as u32,
            rng,
            discarded: 0,
        })
    }

    /// Effective (quantized) retention probability.
    pub fn fraction(&self) -> f64 {
        f64::from(self.cutoff_for_inclusion) / f64::from(RANDOM_POOL_SIZE)
    }
}

impl<T, R: Rng> Downsampler<T> for FractionalDownsampler<T, R> {
    fn submit(&mut self, item: T) -> Result<(), DownsamplingError> {
        if self.rng.random_range(0..RANDOM_POOL_SIZE) < self.cutoff_for_inclusion {
            self.selected.push(item);
        } else {
            self.discarded += 1;
        }
        Ok(())
    }

    fn has_finalized_items(&self) -> bool {
        !self.selected.is_empty()
    }

    fn consume_finalized_items(&mut self) -> Vec<T> {
        std::mem::take(&mut self.selected)
    }

    fn has_pending_items(&self) -> bool {
        false
    }

    fn peek_finalized(&self) -> Option<&T> {
        self.selected.first()
    }

    fn peek_pending(&self) -> Option<&T> {
        None
    }

    fn number_of_discarded_items(&self) -> usize {
        self.discarded
    }

    fn signal_end_of_input(&mut self) {}

    fn clear(&mut self) {
        self.selected.clear();
        self.discarded = 0;
    }

    fn reset(&mut self) {
        self.discarded = 0;
    }
}

impl<T: Locatable, R: Rng> ReadsDownsampler<T> for FractionalDownsampler<T, R> {
    fn requires_coordinate_sort_order(&self) -> bool {
        false
    }

    fn signal_no_more_reads_before(&mut self, _read: &T) -> Result<(), DownsamplingError> {
        Ok(())
    }
}
