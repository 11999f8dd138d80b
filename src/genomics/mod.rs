//! Genomic item model consumed by the downsamplers.
//!
//! Downsampling only needs to know where an item sits in a coordinate-sorted
//! stream, so the model here is deliberately thin: a [`Locatable`] trait, the
//! [`StreamPosition`] sort key, and small concrete read and pileup types.

mod pileup;
mod types;

pub use pileup::{base_index, PileupElement, ReadBackedPileup, NUM_BASES};
pub use types::{AlignedRead, Locatable, StreamPosition};
