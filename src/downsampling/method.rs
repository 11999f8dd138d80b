//! Downsampling configuration and strategy dispatch.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use super::fractional::check_fraction;
use super::iterator::{DownsamplingReadsIterator, PerSampleDownsamplingReadsIterator};
use super::sampling::create_rng;
use super::{
    DownsamplingError, FractionalDownsampler, PassThroughDownsampler, PositionalDownsampler,
    ReadsDownsampler, SimplePositionalDownsampler,
};
use crate::genomics::Locatable;

/// Coverage target applied to locus traversals when none is configured.
pub const DEFAULT_LOCUS_BASED_TRAVERSAL_COVERAGE: usize = 1000;

/// Lowest coverage target accepted for locus traversals.
pub const MINIMUM_SAFE_COVERAGE_TARGET_FOR_LOCUS_BASED_TRAVERSALS: usize = 200;

/// Errors raised while validating a [`DownsamplingMethod`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MethodError {
    /// A downsampling type other than `NONE` was given without a target.
    #[error("downsampling type {0} requires either a coverage or a fraction target")]
    MissingTarget(DownsampleType),

    /// Coverage and fraction were both given.
    #[error("downsampling coverage and fraction are mutually exclusive")]
    ConflictingTargets,

    /// Coverage target of zero.
    #[error("downsampling coverage must be positive")]
    NonPositiveCoverage,

    /// Fraction outside `[0, 1]`.
    #[error("downsampling fraction {0} must be within [0.0, 1.0]")]
    FractionOutOfRange(f64),

    /// Locus traversals only support per-sample coverage downsampling.
    #[error("locus traversals cannot downsample ALL_READS to a coverage target; use BY_SAMPLE")]
    AllReadsCoverageForLocusTraversal,

    /// Coverage target below the locus-traversal floor.
    #[error(
        "coverage target {requested} is below the minimum of {minimum} for locus traversals"
    )]
    CoverageBelowLocusMinimum {
        /// Requested coverage.
        requested: usize,
        /// Accepted floor.
        minimum: usize,
    },

    /// Unrecognized downsampling type name.
    #[error("unknown downsampling type {0:?}; expected NONE, BY_SAMPLE or ALL_READS")]
    UnknownType(String),
}

/// How reads are grouped before downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DownsampleType {
    /// No downsampling.
    None,
    /// Downsample each sample independently.
    BySample,
    /// Downsample the stream as a whole.
    AllReads,
}

impl fmt::Display for DownsampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownsampleType::None => "NONE",
            DownsampleType::BySample => "BY_SAMPLE",
            DownsampleType::AllReads => "ALL_READS",
        };
        f.write_str(name)
    }
}

impl FromStr for DownsampleType {
    type Err = MethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "NONE" => Ok(DownsampleType::None),
            "BY_SAMPLE" => Ok(DownsampleType::BySample),
            "ALL_READS" => Ok(DownsampleType::AllReads),
            _ => Err(MethodError::UnknownType(s.to_string())),
        }
    }
}

/// Kind of traversal consuming the downsampled stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TraversalKind {
    /// Walks reference loci; needs bounded per-locus coverage.
    Locus,
    /// Walks reads one at a time.
    Reads,
}

/// Validated downsampling configuration.
///
/// Exactly one of `to_coverage` and `to_fraction` is set unless the type is
/// [`DownsampleType::None`], in which case neither is.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DownsamplingMethod {
    kind: DownsampleType,
    to_coverage: Option<usize>,
    to_fraction: Option<f64>,
}

impl DownsamplingMethod {
    /// Build and validate a method. A missing type defaults to `BY_SAMPLE`;
    /// targets given with type `NONE` are ignored.
    pub fn new(
        kind: Option<DownsampleType>,
        to_coverage: Option<usize>,
        to_fraction: Option<f64>,
    ) -> Result<Self, MethodError> {
        let kind = kind.unwrap_or(DownsampleType::BySample);
        let method = if kind == DownsampleType::None {
            Self::none()
        } else {
            Self {
                kind,
                to_coverage,
                to_fraction,
            }
        };
        method.validate()?;
        debug!(%method, "downsampling method configured");
        Ok(method)
    }

    /// A method that keeps everything.
    pub fn none() -> Self {
        Self {
            kind: DownsampleType::None,
            to_coverage: None,
            to_fraction: None,
        }
    }

    /// Default method for a traversal kind.
    pub fn default_for(traversal: TraversalKind) -> Self {
        match traversal {
            TraversalKind::Locus => Self {
                kind: DownsampleType::BySample,
                to_coverage: Some(DEFAULT_LOCUS_BASED_TRAVERSAL_COVERAGE),
                to_fraction: None,
            },
            TraversalKind::Reads => Self::none(),
        }
    }

    /// Grouping applied before downsampling.
    pub fn kind(&self) -> DownsampleType {
        self.kind
    }

    /// Per-locus coverage target, if any.
    pub fn to_coverage(&self) -> Option<usize> {
        self.to_coverage
    }

    /// Retention fraction, if any.
    pub fn to_fraction(&self) -> Option<f64> {
        self.to_fraction
    }

    fn validate(&self) -> Result<(), MethodError> {
        if self.kind == DownsampleType::None {
            return Ok(());
        }
        match (self.to_coverage, self.to_fraction) {
            (None, None) => Err(MethodError::MissingTarget(self.kind)),
            (Some(_), Some(_)) => Err(MethodError::ConflictingTargets),
            (Some(0), None) => Err(MethodError::NonPositiveCoverage),
            (None, Some(f)) if !(0.0..=1.0).contains(&f) => Err(MethodError::FractionOutOfRange(f)),
            _ => Ok(()),
        }
    }

    /// Reject configurations unsafe for the given traversal.
    pub fn check_compatibility(&self, traversal: TraversalKind) -> Result<(), MethodError> {
        if traversal != TraversalKind::Locus {
            return Ok(());
        }
        if let Some(coverage) = self.to_coverage {
            if self.kind == DownsampleType::AllReads {
                return Err(MethodError::AllReadsCoverageForLocusTraversal);
            }
            if coverage < MINIMUM_SAFE_COVERAGE_TARGET_FOR_LOCUS_BASED_TRAVERSALS {
                return Err(MethodError::CoverageBelowLocusMinimum {
                    requested: coverage,
                    minimum: MINIMUM_SAFE_COVERAGE_TARGET_FOR_LOCUS_BASED_TRAVERSALS,
                });
            }
        }
        Ok(())
    }

    /// A fresh downsampler implementing this method for one read stream.
    ///
    /// Fractions select [`FractionalDownsampler`]; coverage targets select
    /// [`SimplePositionalDownsampler`]; `NONE` keeps everything.
    pub fn create_reads_downsampler<T: Locatable + 'static>(
        &self,
        rng: StdRng,
    ) -> Result<Box<dyn ReadsDownsampler<T>>, DownsamplingError> {
        Ok(match (self.kind, self.to_coverage, self.to_fraction) {
            (DownsampleType::None, _, _) | (_, None, None) => Box::new(PassThroughDownsampler::new()),
            (_, _, Some(fraction)) => Box::new(FractionalDownsampler::new(fraction, rng)?),
            (_, Some(coverage), None) => Box::new(SimplePositionalDownsampler::new(coverage, rng)?),
        })
    }

    /// A factory producing one downsampler per sample, each with its own
    /// generator drawn from `seed`.
    pub fn factory<T: Locatable + 'static>(
        &self,
        seed: Option<u64>,
    ) -> Result<Box<dyn DownsamplerFactory<T>>, DownsamplingError> {
        Ok(match (self.kind, self.to_coverage, self.to_fraction) {
            (DownsampleType::None, _, _) | (_, None, None) => {
                Box::new(PassThroughDownsamplerFactory)
            }
            (_, _, Some(fraction)) => Box::new(FractionalDownsamplerFactory::new(fraction, seed)?),
            (_, Some(coverage), None) => {
                Box::new(SimplePositionalDownsamplerFactory::new(coverage, seed)?)
            }
        })
    }

    /// Apply this method to a coordinate-sorted read stream.
    ///
    /// `BY_SAMPLE` runs one downsampler per key returned by `sample_of` and
    /// merges the survivors back into coordinate order; every other type runs
    /// a single downsampler over the whole stream.
    pub fn apply<T, I, K, F>(
        &self,
        reads: I,
        sample_of: F,
        seed: Option<u64>,
    ) -> Result<Box<dyn Iterator<Item = Result<T, DownsamplingError>>>, DownsamplingError>
    where
        T: Locatable + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
        K: Eq + std::hash::Hash + Clone + 'static,
        F: FnMut(&T) -> K + 'static,
    {
        let reads = reads.into_iter();
        if self.kind == DownsampleType::BySample {
            let factory = self.factory(seed)?;
            Ok(Box::new(PerSampleDownsamplingReadsIterator::new(
                reads, sample_of, factory,
            )))
        } else {
            let downsampler = self.create_reads_downsampler(create_rng(seed))?;
            Ok(Box::new(DownsamplingReadsIterator::new(reads, downsampler)))
        }
    }
}

impl Default for DownsamplingMethod {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for DownsamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(coverage) = self.to_coverage {
            write!(f, " to coverage {coverage}")?;
        }
        if let Some(fraction) = self.to_fraction {
            write!(f, " to fraction {fraction}")?;
        }
        Ok(())
    }
}

/// Creates independent downsamplers of one configuration.
pub trait DownsamplerFactory<T: Locatable> {
    /// A fresh downsampler with no state.
    fn new_instance(&mut self) -> Result<Box<dyn ReadsDownsampler<T>>, DownsamplingError>;
}

impl<T: Locatable, F: DownsamplerFactory<T> + ?Sized> DownsamplerFactory<T> for Box<F> {
    fn new_instance(&mut self) -> Result<Box<dyn ReadsDownsampler<T>>, DownsamplingError> {
        (**self).new_instance()
    }
}

/// Factory for [`PassThroughDownsampler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughDownsamplerFactory;

impl<T: Locatable + 'static> DownsamplerFactory<T> for PassThroughDownsamplerFactory {
    fn new_instance(&mut self) -> Result<Box<dyn ReadsDownsampler<T>>, DownsamplingError> {
        Ok(Box::new(PassThroughDownsampler::new()))
    }
}

/// Factory for [`FractionalDownsampler`].
#[derive(Debug)]
pub struct FractionalDownsamplerFactory {
    fraction: f64,
    seeds: StdRng,
}

impl FractionalDownsamplerFactory {
    /// Validate `fraction` and seed the per-instance generators from `seed`.
    pub fn new(fraction: f64, seed: Option<u64>) -> Result<Self, DownsamplingError> {
        check_fraction(fraction)?;
        Ok(Self {
            fraction,
            seeds: create_rng(seed),
        })
    }
}

impl<T: Locatable + 'static> DownsamplerFactory<T> for FractionalDownsamplerFactory {
    fn new_instance(&mut self) -> Result<Box<dyn ReadsDownsampler<T>>, DownsamplingError> {
        let rng = create_rng(Some(self.seeds.random()));
        Ok(Box::new(FractionalDownsampler::new(self.fraction, rng)?))
    }
}

/// Factory for [`SimplePositionalDownsampler`].
#[derive(Debug)]
pub struct SimplePositionalDownsamplerFactory {
    target_coverage: usize,
    seeds: StdRng,
}

impl SimplePositionalDownsamplerFactory {
    /// Validate `target_coverage` and seed the per-instance generators.
    pub fn new(target_coverage: usize, seed: Option<u64>) -> Result<Self, DownsamplingError> {
        if target_coverage == 0 {
            return Err(DownsamplingError::InvalidConfiguration(
                "target coverage must be positive".to_string(),
            ));
        }
        Ok(Self {
            target_coverage,
            seeds: create_rng(seed),
        })
    }
}

impl<T: Locatable + 'static> DownsamplerFactory<T> for SimplePositionalDownsamplerFactory {
    fn new_instance(&mut self) -> Result<Box<dyn ReadsDownsampler<T>>, DownsamplingError> {
        let rng = create_rng(Some(self.seeds.random()));
        Ok(Box::new(SimplePositionalDownsampler::from_validated(
            self.target_coverage,
            rng,
        )))
    }
}

/// Factory for [`PositionalDownsampler`], which also levels overlapping stacks.
#[derive(Debug)]
pub struct PositionalDownsamplerFactory {
    target_coverage: usize,
    seeds: StdRng,
}

impl PositionalDownsamplerFactory {
    /// Validate `target_coverage` and seed the per-instance generators.
    pub fn new(target_coverage: usize, seed: Option<u64>) -> Result<Self, DownsamplingError> {
        if target_coverage == 0 {
            return Err(DownsamplingError::InvalidConfiguration(
                "target coverage must be positive".to_string(),
            ));
        }
        Ok(Self {
            target_coverage,
            seeds: create_rng(seed),
        })
    }
}

impl<T: Locatable + 'static> DownsamplerFactory<T> for PositionalDownsamplerFactory {
    fn new_instance(&mut self) -> Result<Box<dyn ReadsDownsampler<T>>, DownsamplingError> {
        let rng = create_rng(Some(self.seeds.random()));
        Ok(Box::new(PositionalDownsampler::new(self.target_coverage, rng)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downsampling::Downsampler;
    use crate::genomics::AlignedRead;

    #[test]
    fn type_names_round_trip() {
        for kind in [DownsampleType::None, DownsampleType::BySample, DownsampleType::AllReads] {
            assert_eq!(kind.to_string().parse::<DownsampleType>().unwrap(), kind);
        }
        assert_eq!("by-sample".parse::<DownsampleType>().unwrap(), DownsampleType::BySample);
        assert!("EVERYTHING".parse::<DownsampleType>().is_err());
    }

    #[test]
    fn none_ignores_targets() {
        let method = DownsamplingMethod::new(Some(DownsampleType::None), Some(5), None).unwrap();
        assert_eq!(method, DownsamplingMethod::none());
    }

    #[test]
    fn missing_type_defaults_to_by_sample() {
        let method = DownsamplingMethod::new(None, Some(250), None).unwrap();
        assert_eq!(method.kind(), DownsampleType::BySample);
        assert_eq!(method.to_string(), "BY_SAMPLE to coverage 250");
    }

    #[test]
    fn locus_default_is_safe() {
        let method = DownsamplingMethod::default_for(TraversalKind::Locus);
        assert_eq!(method.to_coverage(), Some(DEFAULT_LOCUS_BASED_TRAVERSAL_COVERAGE));
        assert!(method.check_compatibility(TraversalKind::Locus).is_ok());
        assert_eq!(DownsamplingMethod::default_for(TraversalKind::Reads), DownsamplingMethod::none());
    }

    #[test]
    fn dispatch_matches_target() {
        let fractional = DownsamplingMethod::new(Some(DownsampleType::AllReads), None, Some(0.5))
            .unwrap()
            .create_reads_downsampler::<AlignedRead>(create_rng(Some(1)))
            .unwrap();
        assert!(!fractional.requires_coordinate_sort_order());

        let positional = DownsamplingMethod::new(Some(DownsampleType::AllReads), Some(3), None)
            .unwrap()
            .create_reads_downsampler::<AlignedRead>(create_rng(Some(1)))
            .unwrap();
        assert!(positional.requires_coordinate_sort_order());

        let mut none = DownsamplingMethod::none()
            .create_reads_downsampler::<AlignedRead>(create_rng(Some(1)))
            .unwrap();
        none.submit(AlignedRead::new("r", 0, 1, 10)).unwrap();
        assert_eq!(none.consume_finalized_items().len(), 1);
    }

    #[test]
    fn factories_produce_independent_instances() {
        let mut factory = SimplePositionalDownsamplerFactory::new(2, Some(9)).unwrap();
        let mut first: Box<dyn ReadsDownsampler<AlignedRead>> = factory.new_instance().unwrap();
        let second: Box<dyn ReadsDownsampler<AlignedRead>> = factory.new_instance().unwrap();
        first.submit(AlignedRead::new("r", 0, 1, 10)).unwrap();
        assert!(first.has_pending_items());
        assert!(!second.has_pending_items());

        assert!(FractionalDownsamplerFactory::new(1.5, None).is_err());
        assert!(PositionalDownsamplerFactory::new(0, None).is_err());
    }
}
