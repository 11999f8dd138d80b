//! Per-alignment-start reservoirs over a coordinate-sorted read stream.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::trace;

use super::sampling::{create_rng, Reservoir};
use super::{check_coordinate_order, Downsampler, DownsamplingError, ReadsDownsampler};
use crate::genomics::{Locatable, StreamPosition};

/// Caps the number of reads sharing each alignment start.
///
/// Reads at the current `(contig, start)` go through a reservoir of size
/// `target_coverage`; when the stream moves past that position the
/// reservoir's sample is finalized as a whole. Stacks at different starts
/// are downsampled independently. Unplaced reads at the end of the stream
/// are never downsampled.
#[derive(Debug)]
pub struct SimplePositionalDownsampler<T, R = StdRng> {
    reservoir: Reservoir<T>,
    current_position: Option<StreamPosition>,
    finalized: Vec<T>,
    rng: R,
    discarded: usize,
}

impl<T: Locatable> SimplePositionalDownsampler<T, StdRng> {
    /// Create a downsampler with a seeded generator.
    pub fn with_seed(target_coverage: usize, seed: u64) -> Result<Self, DownsamplingError> {
        Self::new(target_coverage, create_rng(Some(seed)))
    }
}

impl<T: Locatable, R: Rng> SimplePositionalDownsampler<T, R> {
    /// Create a downsampler keeping at most `target_coverage` reads per start.
    pub fn new(target_coverage: usize, rng: R) -> Result<Self, DownsamplingError> {
        if target_coverage == 0 {
            return Err(DownsamplingError::InvalidConfiguration(
                "target coverage must be positive".to_string(),
            ));
        }
        Ok(Self::from_validated(target_coverage, rng))
    }

    pub(crate) fn from_validated(target_coverage: usize, rng: R) -> Self {
        Self {
            reservoir: Reservoir::new(target_coverage),
            current_position: None,
            finalized: Vec::new(),
            rng,
            discarded: 0,
        }
    }

    /// Maximum reads retained per alignment start.
    pub fn target_coverage(&self) -> usize {
        self.reservoir.capacity()
    }

    fn update_positional_state(&mut self, position: StreamPosition) -> Result<(), DownsamplingError> {
        check_coordinate_order(self.current_position, position)?;
        if self.current_position.map_or(true, |current| position > current) {
            self.finalize_reservoir();
            self.current_position = Some(position);
        }
        Ok(())
    }

    fn finalize_reservoir(&mut self) {
        if self.reservoir.is_empty() {
            return;
        }
        let stack = self.reservoir.drain();
        trace!(
            position = ?self.current_position,
            kept = stack.len(),
            "finalized stack"
        );
        self.finalized.extend(stack);
    }
}

impl<T: Locatable, R: Rng> Downsampler<T> for SimplePositionalDownsampler<T, R> {
    fn submit(&mut self, read: T) -> Result<(), DownsamplingError> {
        let position = StreamPosition::of(&read);
        self.update_positional_state(position)?;

        if position == StreamPosition::Unplaced {
            self.finalized.push(read);
        } else if self.reservoir.offer(read, &mut self.rng) {
            self.discarded += 1;
        }
        Ok(())
    }

    fn has_finalized_items(&self) -> bool {
        !self.finalized.is_empty()
    }

    fn consume_finalized_items(&mut self) -> Vec<T> {
        std::mem::take(&mut self.finalized)
    }

    fn has_pending_items(&self) -> bool {
        !self.reservoir.is_empty()
    }

    fn peek_finalized(&self) -> Option<&T> {
        self.finalized.first()
    }

    fn peek_pending(&self) -> Option<&T> {
        self.reservoir.first()
    }

    fn number_of_discarded_items(&self) -> usize {
        self.discarded
    }

    fn signal_end_of_input(&mut self) {
        self.finalize_reservoir();
    }

    fn clear(&mut self) {
        self.reservoir.clear();
        self.finalized.clear();
        self.current_position = None;
        self.discarded = 0;
    }

    fn reset(&mut self) {
        self.discarded = 0;
    }
}

impl<T: Locatable, R: Rng> ReadsDownsampler<T> for SimplePositionalDownsampler<T, R> {
    fn requires_coordinate_sort_order(&self) -> bool {
        true
    }

    fn signal_no_more_reads_before(&mut self, read: &T) -> Result<(), DownsamplingError> {
        self.update_positional_state(StreamPosition::of(read))
    }
}
