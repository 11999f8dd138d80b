//! Downsampling strategies.
//!
//! Every strategy implements the [`Downsampler`] protocol: items are
//! submitted one at a time, the downsampler decides which survive, and the
//! caller drains decided survivors with
//! [`consume_finalized_items`](Downsampler::consume_finalized_items). Items
//! that do not survive are only ever visible through
//! [`number_of_discarded_items`](Downsampler::number_of_discarded_items).
//!
//! At all times each submitted item is in exactly one of three places:
//! pending (not yet decided), finalized (decided survivor, waiting to be
//! drained), or discarded.

mod allele_biased;
mod contamination;
mod fractional;
mod iterator;
mod leveling;
mod method;
mod passthrough;
mod positional;
mod reservoir;
mod sampling;
mod simple_positional;

pub use allele_biased::{
    create_allele_biased_pileup, partition_removals, run_smart_downsampling,
    score_allele_counts, select_allele_biased_reads,
};
pub use contamination::{ContaminationError, ContaminationTable};
pub use fractional::{FractionalDownsampler, RANDOM_POOL_SIZE};
pub use iterator::{DownsamplingReadsIterator, PerSampleDownsamplingReadsIterator};
pub use leveling::LevelingDownsampler;
pub use method::{
    DownsampleType, DownsamplerFactory, DownsamplingMethod, FractionalDownsamplerFactory,
    MethodError, PassThroughDownsamplerFactory, PositionalDownsamplerFactory,
    SimplePositionalDownsamplerFactory, TraversalKind, DEFAULT_LOCUS_BASED_TRAVERSAL_COVERAGE,
    MINIMUM_SAFE_COVERAGE_TARGET_FOR_LOCUS_BASED_TRAVERSALS,
};
pub use passthrough::PassThroughDownsampler;
pub use positional::PositionalDownsampler;
pub use reservoir::ReservoirDownsampler;
pub use sampling::{create_rng, downsample_to, level_counts, sample_indices_without_replacement};
pub use simple_positional::SimplePositionalDownsampler;

use thiserror::Error;

use crate::genomics::{Locatable, StreamPosition};

/// Errors raised by downsamplers.
///
/// Discarding an item is never an error; these variants cover bad
/// construction parameters and broken caller contracts. After a contract
/// violation the downsampler state is unspecified and it must be rebuilt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DownsamplingError {
    /// Construction parameters are out of range.
    #[error("invalid downsampling configuration: {0}")]
    InvalidConfiguration(String),

    /// A positional downsampler received an item behind its current position.
    #[error("item at {found} submitted after {current}; input must be coordinate-sorted")]
    OutOfOrderSubmission {
        /// Position the downsampler had already reached.
        current: StreamPosition,
        /// Position of the offending item.
        found: StreamPosition,
    },

    /// More elements were requested from a group than it holds.
    #[error("cannot keep {requested} elements from a group of {available}")]
    GroupTooSmall {
        /// Number of elements requested.
        requested: usize,
        /// Number of elements available.
        available: usize,
    },
}

/// Submit/consume protocol shared by every downsampling strategy.
pub trait Downsampler<T> {
    /// Submit one item.
    fn submit(&mut self, item: T) -> Result<(), DownsamplingError>;

    /// Submit a batch of items, in order.
    fn submit_all(&mut self, items: Vec<T>) -> Result<(), DownsamplingError> {
        for item in items {
            self.submit(item)?;
        }
        Ok(())
    }

    /// Whether decided survivors are waiting to be drained.
    fn has_finalized_items(&self) -> bool;

    /// Drain all decided survivors (empty when there are none).
    fn consume_finalized_items(&mut self) -> Vec<T>;

    /// Whether any submitted item is still undecided.
    fn has_pending_items(&self) -> bool;

    /// First finalized item, without draining.
    fn peek_finalized(&self) -> Option<&T>;

    /// Earliest pending item, without draining.
    fn peek_pending(&self) -> Option<&T>;

    /// Items discarded since construction or the last [`reset`](Self::reset).
    fn number_of_discarded_items(&self) -> usize;

    /// Decide every pending item. Afterwards `has_pending_items()` is false.
    fn signal_end_of_input(&mut self);

    /// Drop all state, including counters.
    fn clear(&mut self);

    /// Zero the discard counter, leaving buffered items untouched.
    fn reset(&mut self);
}

/// Downsampler over a coordinate-sorted read stream.
pub trait ReadsDownsampler<T: Locatable>: Downsampler<T> {
    /// Whether input must arrive in `(contig, start)` order.
    fn requires_coordinate_sort_order(&self) -> bool;

    /// Tell the downsampler no read before `read`'s position will follow,
    /// letting it finalize anything behind that position.
    fn signal_no_more_reads_before(&mut self, read: &T) -> Result<(), DownsamplingError>;
}

impl<T, D: Downsampler<T> + ?Sized> Downsampler<T> for Box<D> {
    fn submit(&mut self, item: T) -> Result<(), DownsamplingError> {
        (**self).submit(item)
    }

    fn submit_all(&mut self, items: Vec<T>) -> Result<(), DownsamplingError> {
        (**self).submit_all(items)
    }

    fn has_finalized_items(&self) -> bool {
        (**self).has_finalized_items()
    }

    fn consume_finalized_items(&mut self) -> Vec<T> {
        (**self).consume_finalized_items()
    }

    fn has_pending_items(&self) -> bool {
        (**self).has_pending_items()
    }

    fn peek_finalized(&self) -> Option<&T> {
        (**self).peek_finalized()
    }

    fn peek_pending(&self) -> Option<&T> {
        (**self).peek_pending()
    }

    fn number_of_discarded_items(&self) -> usize {
        (**self).number_of_discarded_items()
    }

    fn signal_end_of_input(&mut self) {
        (**self).signal_end_of_input()
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

impl<T: Locatable, D: ReadsDownsampler<T> + ?Sized> ReadsDownsampler<T> for Box<D> {
    fn requires_coordinate_sort_order(&self) -> bool {
        (**self).requires_coordinate_sort_order()
    }

    fn signal_no_more_reads_before(&mut self, read: &T) -> Result<(), DownsamplingError> {
        (**self).signal_no_more_reads_before(read)
    }
}

/// Reject `found` if it lies behind `current`.
pub(crate) fn check_coordinate_order(
    current: Option<StreamPosition>,
    found: StreamPosition,
) -> Result<(), DownsamplingError> {
    match current {
        Some(current) if found < current => {
            Err(DownsamplingError::OutOfOrderSubmission { current, found })
        }
        _ => Ok(()),
    }
}
