//! Coverage-targeted downsampling with leveling across overlapping stacks.

use std::collections::VecDeque;

use bitvec::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, trace};

use super::sampling::{create_rng, level_counts, sample_indices_without_replacement, Reservoir};
use super::{check_coordinate_order, Downsampler, DownsamplingError, ReadsDownsampler};
use crate::genomics::{Locatable, StreamPosition};

/// Reads that share one alignment start, sealed once the stream moved on.
///
/// A read stays *active* while it still overlaps the stream's current
/// position. The group is finalized once no read is active.
#[derive(Debug)]
struct PositionalReadGroup<T> {
    position: StreamPosition,
    reads: Vec<T>,
    active: BitVec,
}

impl<T: Locatable> PositionalReadGroup<T> {
    fn new(position: StreamPosition, reads: Vec<T>) -> Self {
        let active = bitvec![1; reads.len()];
        Self {
            position,
            reads,
            active,
        }
    }

    fn num_active(&self) -> usize {
        self.active.count_ones()
    }

    fn is_finalized(&self) -> bool {
        self.active.not_any()
    }

    /// Deactivate reads that end before `position`.
    fn update_active_reads(&mut self, position: StreamPosition) {
        for (idx, read) in self.reads.iter().enumerate() {
            if self.active[idx]
                && !position.is_overlapped_by(read.contig_index(), read.alignment_end())
            {
                self.active.set(idx, false);
            }
        }
    }

    /// Shrink the active reads to a uniform subset of `keep`, dropping the
    /// rest from the group entirely. Returns the number dropped.
    fn downsample_active_reads<R: Rng + ?Sized>(
        &mut self,
        keep: usize,
        rng: &mut R,
    ) -> Result<usize, DownsamplingError> {
        let active_indices: Vec<usize> = self.active.iter_ones().collect();
        if keep > active_indices.len() {
            return Err(DownsamplingError::GroupTooSmall {
                requested: keep,
                available: active_indices.len(),
            });
        }

        let num_to_remove = active_indices.len() - keep;
        if num_to_remove == 0 {
            return Ok(0);
        }

        let mut remove = bitvec![0; self.reads.len()];
        for pick in sample_indices_without_replacement(active_indices.len(), num_to_remove, rng) {
            remove.set(active_indices[pick], true);
        }

        let mut reads = Vec::with_capacity(self.reads.len() - num_to_remove);
        let mut active = BitVec::with_capacity(self.reads.len() - num_to_remove);
        for (idx, read) in std::mem::take(&mut self.reads).into_iter().enumerate() {
            if !remove[idx] {
                active.push(self.active[idx]);
                reads.push(read);
            }
        }
        self.reads = reads;
        self.active = active;
        Ok(num_to_remove)
    }
}

/// Caps per-locus coverage over a coordinate-sorted read stream.
///
/// Reads sharing the current alignment start pass through a reservoir of
/// size `target_coverage`. When the stream advances, that reservoir is
/// sealed into a pending group and the active reads of all pending groups
/// (reads overlapping the locus just left) are leveled so that their
/// combined coverage does not exceed the target. Leveling never drops a
/// group's last active read while another group still has more than one,
/// which keeps long reads from earlier starts from being starved by later
/// stacks.
///
/// Groups are released in stream order once none of their reads reaches the
/// current position. Memory is bounded by the target times the number of
/// simultaneously open starts, not by stream length. Unplaced reads at the
/// end of the stream are passed through untouched.
#[derive(Debug)]
pub struct PositionalDownsampler<T, R = StdRng> {
    target_coverage: usize,
    reservoir: Reservoir<T>,
    current_position: Option<StreamPosition>,
    pending: VecDeque<PositionalReadGroup<T>>,
    finalized: Vec<T>,
    rng: R,
    discarded: usize,
}

impl<T: Locatable> PositionalDownsampler<T, StdRng> {
    /// Create a downsampler with a seeded generator.
    pub fn with_seed(target_coverage: usize, seed: u64) -> Result<Self, DownsamplingError> {
        Self::new(target_coverage, create_rng(Some(seed)))
    }
}

impl<T: Locatable, R: Rng> PositionalDownsampler<T, R> {
    /// Create a downsampler targeting `target_coverage` reads per locus.
    pub fn new(target_coverage: usize, rng: R) -> Result<Self, DownsamplingError> {
        if target_coverage == 0 {
            return Err(DownsamplingError::InvalidConfiguration(
                "target coverage must be positive".to_string(),
            ));
        }
        Ok(Self {
            target_coverage,
            reservoir: Reservoir::new(target_coverage),
            current_position: None,
            pending: VecDeque::new(),
            finalized: Vec::new(),
            rng,
            discarded: 0,
        })
    }

    /// Per-locus coverage target.
    pub fn target_coverage(&self) -> usize {
        self.target_coverage
    }

    /// Number of sealed groups still awaiting finalization.
    pub fn num_open_groups(&self) -> usize {
        self.pending.len()
    }

    fn advance_to(&mut self, position: StreamPosition) -> Result<(), DownsamplingError> {
        check_coordinate_order(self.current_position, position)?;
        if self.current_position.is_some_and(|current| position <= current) {
            return Ok(());
        }

        self.seal_reservoir();
        self.level_overlapping_groups()?;

        self.current_position = Some(position);
        for group in self.pending.iter_mut() {
            group.update_active_reads(position);
        }
        self.release_finalized_groups();
        Ok(())
    }

    fn seal_reservoir(&mut self) {
        if self.reservoir.is_empty() {
            return;
        }
        if let Some(position) = self.current_position {
            let reads = self.reservoir.drain();
            trace!(%position, reads = reads.len(), "sealed stack");
            self.pending.push_back(PositionalReadGroup::new(position, reads));
        }
    }

    fn level_overlapping_groups(&mut self) -> Result<(), DownsamplingError> {
        let mut targets: Vec<usize> = self.pending.iter().map(|g| g.num_active()).collect();
        let removed = level_counts(&mut targets, self.target_coverage);
        if removed == 0 {
            return Ok(());
        }

        debug!(
            groups = self.pending.len(),
            target = self.target_coverage,
            removed,
            "leveling overlapping stacks"
        );

        for (group, target) in self.pending.iter_mut().zip(targets) {
            if target < group.num_active() {
                self.discarded += group.downsample_active_reads(target, &mut self.rng)?;
            }
        }
        Ok(())
    }

    fn release_finalized_groups(&mut self) {
        while self.pending.front().is_some_and(PositionalReadGroup::is_finalized) {
            if let Some(group) = self.pending.pop_front() {
                trace!(position = %group.position, kept = group.reads.len(), "finalized stack");
                self.finalized.extend(group.reads);
            }
        }
    }
}

impl<T: Locatable, R: Rng> Downsampler<T> for PositionalDownsampler<T, R> {
    fn submit(&mut self, read: T) -> Result<(), DownsamplingError> {
        let position = StreamPosition::of(&read);
        self.advance_to(position)?;

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
        !self.reservoir.is_empty() || !self.pending.is_empty()
    }

    fn peek_finalized(&self) -> Option<&T> {
        self.finalized.first()
    }

    fn peek_pending(&self) -> Option<&T> {
        self.pending
            .iter()
            .find_map(|group| group.reads.first())
            .or_else(|| self.reservoir.first())
    }

    fn number_of_discarded_items(&self) -> usize {
        self.discarded
    }

    fn signal_end_of_input(&mut self) {
        self.seal_reservoir();
        // Leveling only ever asks a group for fewer active reads than it has.
        if let Err(err) = self.level_overlapping_groups() {
            debug!(%err, "leveling skipped at end of input");
        }
        for group in self.pending.drain(..) {
            self.finalized.extend(group.reads);
        }
    }

    fn clear(&mut self) {
        self.reservoir.clear();
        self.pending.clear();
        self.finalized.clear();
        self.current_position = None;
        self.discarded = 0;
    }

    fn reset(&mut self) {
        self.discarded = 0;
    }
}

impl<T: Locatable, R: Rng> ReadsDownsampler<T> for PositionalDownsampler<T, R> {
    fn requires_coordinate_sort_order(&self) -> bool {
        true
    }

    fn signal_no_more_reads_before(&mut self, read: &T) -> Result<(), DownsamplingError> {
        self.advance_to(StreamPosition::of(read))
    }
}
