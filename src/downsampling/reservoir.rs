//! Uniform fixed-size sampling of an unbounded stream.

use rand::rngs::StdRng;
use rand::Rng;

use super::sampling::{create_rng, Reservoir};
use super::{Downsampler, DownsamplingError, ReadsDownsampler};
use crate::genomics::Locatable;

/// Keeps a uniform random sample of `k` items from everything submitted.
///
/// Uses Algorithm R: the first `k` items fill the reservoir; the `i`-th item
/// after that replaces a random slot with probability `k / i`. Memory is
/// O(k) regardless of stream length.
///
/// Sampled items are finalized as soon as they enter the reservoir (there is
/// no pending state), but an item already finalized can still be evicted by
/// a later submission until it is drained. Draining restarts the stream:
/// the next `k` submissions are kept unconditionally.
///
/// # Example
///
/// ```
/// use readcap::downsampling::{Downsampler, ReservoirDownsampler};
///
/// let mut downsampler = ReservoirDownsampler::with_seed(10, 42).unwrap();
/// for i in 0..1_000 {
///     downsampler.submit(i).unwrap();
/// }
/// assert_eq!(downsampler.consume_finalized_items().len(), 10);
/// assert_eq!(downsampler.number_of_discarded_items(), 990);
/// ```
#[derive(Debug)]
pub struct ReservoirDownsampler<T, R = StdRng> {
    reservoir: Reservoir<T>,
    rng: R,
    discarded: usize,
}

impl<T> ReservoirDownsampler<T, StdRng> {
    /// Create a downsampler with a seeded generator.
    pub fn with_seed(target_sample_size: usize, seed: u64) -> Result<Self, DownsamplingError> {
        Self::new(target_sample_size, create_rng(Some(seed)))
    }
}

impl<T, R: Rng> ReservoirDownsampler<T, R> {
    /// Create a downsampler keeping at most `target_sample_size` items.
    pub fn new(target_sample_size: usize, rng: R) -> Result<Self, DownsamplingError> {
        if target_sample_size == 0 {
            return Err(DownsamplingError::InvalidConfiguration(
                "reservoir target sample size must be positive".to_string(),
            ));
        }
        Ok(Self {
            reservoir: Reservoir::new(target_sample_size),
            rng,
            discarded: 0,
        })
    }

    /// Maximum number of items retained.
    pub fn target_sample_size(&self) -> usize {
        self.reservoir.capacity()
    }

    /// Number of items currently held.
    pub fn size_of_current_reservoir(&self) -> usize {
        self.reservoir.len()
    }

    /// Items submitted since construction or the last drain.
    pub fn items_seen(&self) -> usize {
        self.reservoir.seen()
    }
}

impl<T, R: Rng> Downsampler<T> for ReservoirDownsampler<T, R> {
    fn submit(&mut self, item: T) -> Result<(), DownsamplingError> {
        if self.reservoir.offer(item, &mut self.rng) {
            self.discarded += 1;
        }
        Ok(())
    }

    fn has_finalized_items(&self) -> bool {
        !self.reservoir.is_empty()
    }

    fn consume_finalized_items(&mut self) -> Vec<T> {
        self.reservoir.drain()
    }

    fn has_pending_items(&self) -> bool {
        false
    }

    fn peek_finalized(&self) -> Option<&T> {
        self.reservoir.first()
    }

    fn peek_pending(&self) -> Option<&T> {
        None
    }

    fn number_of_discarded_items(&self) -> usize {
        self.discarded
    }

    fn signal_end_of_input(&mut self) {}

    fn clear(&mut self) {
        self.reservoir.clear();
        self.discarded = 0;
    }

    fn reset(&mut self) {
        self.discarded = 0;
    }
}

impl<T: Locatable, R: Rng> ReadsDownsampler<T> for ReservoirDownsampler<T, R> {
    fn requires_coordinate_sort_order(&self) -> bool {
        false
    }

    fn signal_no_more_reads_before(&mut self, _read: &T) -> Result<(), DownsamplingError> {
        Ok(())
    }
}
