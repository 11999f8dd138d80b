//! Fair shrinking of a fixed set of groups toward an aggregate size.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use super::sampling::{create_rng, level_counts, retain_uniform_sample};
use super::{Downsampler, DownsamplingError};

/// Levels whole groups of elements down to an aggregate target size.
///
/// Items submitted to this downsampler are groups (`Vec<E>`). Nothing is
/// decided until [`signal_end_of_input`](Downsampler::signal_end_of_input):
/// at that point, if the groups together hold more than the target, the
/// excess is removed one element at a time in round-robin order across
/// groups, skipping groups already down to a single element. Each group
/// then keeps a uniform random subset of the size it was leveled to, in its
/// original order.
///
/// Reductions are spread evenly rather than draining some groups to protect
/// others; a non-empty group is never emptied. When the target is smaller
/// than the number of non-empty groups the result overshoots the target.
///
/// The discard count tallies removed elements, not groups.
#[derive(Debug)]
pub struct LevelingDownsampler<E, R = StdRng> {
    target_size: usize,
    groups: Vec<Vec<E>>,
    groups_are_finalized: bool,
    rng: R,
    discarded: usize,
}

impl<E> LevelingDownsampler<E, StdRng> {
    /// Create a downsampler with a seeded generator.
    pub fn with_seed(target_size: usize, seed: u64) -> Result<Self, DownsamplingError> {
        Self::new(target_size, create_rng(Some(seed)))
    }
}

impl<E, R: Rng> LevelingDownsampler<E, R> {
    /// Create a downsampler leveling to `target_size` elements in total.
    pub fn new(target_size: usize, rng: R) -> Result<Self, DownsamplingError> {
        if target_size == 0 {
            return Err(DownsamplingError::InvalidConfiguration(
                "leveling target size must be positive".to_string(),
            ));
        }
        Ok(Self {
            target_size,
            groups: Vec::new(),
            groups_are_finalized: false,
            rng,
            discarded: 0,
        })
    }

    /// Aggregate element target.
    pub fn target_size(&self) -> usize {
        self.target_size
    }

    fn level_groups(&mut self) {
        let mut targets: Vec<usize> = self.groups.iter().map(Vec::len).collect();
        let removed = level_counts(&mut targets, self.target_size);
        if removed == 0 {
            return;
        }

        debug!(
            groups = self.groups.len(),
            target = self.target_size,
            removed,
            "leveling groups"
        );

        for (group, target) in self.groups.iter_mut().zip(targets) {
            if target < group.len() {
                let (kept, dropped) =
                    retain_uniform_sample(std::mem::take(group), target, &mut self.rng);
                *group = kept;
                self.discarded += dropped;
            }
        }
    }
}

impl<E, R: Rng> Downsampler<Vec<E>> for LevelingDownsampler<E, R> {
    fn submit(&mut self, group: Vec<E>) -> Result<(), DownsamplingError> {
        self.groups.push(group);
        Ok(())
    }

    fn has_finalized_items(&self) -> bool {
        self.groups_are_finalized && !self.groups.is_empty()
    }

    fn consume_finalized_items(&mut self) -> Vec<Vec<E>> {
        if !self.groups_are_finalized {
            return Vec::new();
        }
        self.groups_are_finalized = false;
        std::mem::take(&mut self.groups)
    }

    fn has_pending_items(&self) -> bool {
        !self.groups_are_finalized && !self.groups.is_empty()
    }

    fn peek_finalized(&self) -> Option<&Vec<E>> {
        if self.groups_are_finalized {
            self.groups.first()
        } else {
            None
        }
    }

    fn peek_pending(&self) -> Option<&Vec<E>> {
        if self.groups_are_finalized {
            None
        } else {
            self.groups.first()
        }
    }

    fn number_of_discarded_items(&self) -> usize {
        self.discarded
    }

    fn signal_end_of_input(&mut self) {
        self.level_groups();
        self.groups_are_finalized = true;
    }

    fn clear(&mut self) {
        self.groups.clear();
        self.groups_are_finalized = false;
        self.discarded = 0;
    }

    fn reset(&mut self) {
        self.discarded = 0;
    }
}
