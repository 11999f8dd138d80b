//! # Bounded-coverage read downsampling
//!
//! This library thins coordinate-sorted read streams so downstream
//! per-locus analyses see bounded, unbiased coverage.
//!
//! ## Strategies
//!
//! 1. **Reservoir**: fixed-size uniform sample of a whole stream (Algorithm R)
//! 2. **Fractional**: keep each read independently with probability `p`
//! 3. **Leveling**: shrink a set of groups toward an aggregate size, round-robin
//! 4. **Positional**: cap coverage per locus, leveling overlapping stacks
//! 5. **Allele-biased**: remove a contamination fraction, preferring to
//!    restore a clean genotype profile
//!
//! Memory is bounded by the coverage target times the number of open
//! stacks, never by the length of the stream.
//!
//! ## Usage Example
//!
//! ```
//! use readcap::downsampling::{Downsampler, PositionalDownsampler};
//! use readcap::genomics::AlignedRead;
//!
//! let mut downsampler = PositionalDownsampler::with_seed(10, 42).unwrap();
//! for i in 0..1000 {
//!     downsampler.submit(AlignedRead::new(format!("r{i}"), 0, 0, 1000)).unwrap();
//! }
//! downsampler.signal_end_of_input();
//!
//! assert_eq!(downsampler.consume_finalized_items().len(), 10);
//! assert_eq!(downsampler.number_of_discarded_items(), 990);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod downsampling; // Strategies, configuration and stream adapters
pub mod genomics; // Read and pileup types

pub use downsampling::{
    Downsampler, DownsamplingError, DownsamplingMethod, ReadsDownsampler,
};
pub use genomics::{AlignedRead, Locatable, ReadBackedPileup, StreamPosition};
