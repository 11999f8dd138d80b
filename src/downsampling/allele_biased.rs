//! Contamination-aware removal that pushes allele counts toward a clean
//! homozygous or balanced heterozygous profile.
//!
//! Given a contamination fraction `f`, `floor(total * f)` observations are
//! removed. Which bins lose them is chosen by a small exhaustive search over
//! single bins and pairs of bins, scored by [`score_allele_counts`]; within a
//! bin the removed observations are a uniform random subset.

use bitvec::prelude::*;
use rand::Rng;
use tracing::trace;

use super::sampling::sample_indices_without_replacement;
use crate::genomics::{ReadBackedPileup, NUM_BASES};

/// Distance of `counts` from an ideal genotype profile; lower is better.
///
/// With the counts sorted ascending, `max` and `second` are the two largest
/// and `rest` the sum of the others. A homozygous profile has
/// `second + rest == 0`; a balanced heterozygous one has
/// `max - second + rest == 0`. The score is the smaller of the two. Fewer
/// than two bins always score 0.
pub fn score_allele_counts(counts: &[usize]) -> usize {
    if counts.len() < 2 {
        return 0;
    }

    let mut sorted = counts.to_vec();
    sorted.sort_unstable();

    let max = sorted[sorted.len() - 1];
    let second = sorted[sorted.len() - 2];
    let rest: usize = sorted[..sorted.len() - 2].iter().sum();

    (max - second + rest).min(second + rest)
}

/// Target counts after removing `num_to_remove` observations.
///
/// Candidates are: every bin losing all `num_to_remove`, and every pair of
/// distinct bins each losing `num_to_remove / 2`. Counts saturate at zero.
/// The original counts are the starting candidate and are only replaced by
/// a strictly lower score; the first candidate found wins ties.
pub fn run_smart_downsampling(counts: &[usize], num_to_remove: usize) -> Vec<usize> {
    let mut best_score = score_allele_counts(counts);
    let mut best = counts.to_vec();
    let per_allele = num_to_remove / 2;

    for i in 0..counts.len() {
        for j in i..counts.len() {
            let mut candidate = counts.to_vec();
            if i == j {
                candidate[i] = candidate[i].saturating_sub(num_to_remove);
            } else {
                candidate[i] = candidate[i].saturating_sub(per_allele);
                candidate[j] = candidate[j].saturating_sub(per_allele);
            }

            let score = score_allele_counts(&candidate);
            if score < best_score {
                best_score = score;
                best = candidate;
            }
        }
    }
    best
}

/// Split `items` into `(kept, removed)`, removing a uniform random subset of
/// `num_to_remove`. Both halves keep their original relative order.
///
/// Removing at least as many as there are items removes everything.
pub fn partition_removals<T, R: Rng + ?Sized>(
    items: Vec<T>,
    num_to_remove: usize,
    rng: &mut R,
) -> (Vec<T>, Vec<T>) {
    if num_to_remove == 0 {
        return (items, Vec::new());
    }
    if num_to_remove >= items.len() {
        return (Vec::new(), items);
    }

    let mut remove = bitvec![0; items.len()];
    for idx in sample_indices_without_replacement(items.len(), num_to_remove, rng) {
        remove.set(idx, true);
    }

    let mut kept = Vec::with_capacity(items.len() - num_to_remove);
    let mut removed = Vec::with_capacity(num_to_remove);
    for (idx, item) in items.into_iter().enumerate() {
        if remove[idx] {
            removed.push(item);
        } else {
            kept.push(item);
        }
    }
    (kept, removed)
}

/// Downsample a pileup to remove an estimated contamination `fraction`.
///
/// Elements are binned by base (A, C, G, T); elements with any other base
/// are never removed but do not count toward the total either. Survivors
/// keep their original pileup order.
///
/// `fraction <= 0` returns the pileup unchanged; `fraction >= 1` returns an
/// empty pileup at the same locus.
pub fn create_allele_biased_pileup<R: Rng + ?Sized>(
    pileup: ReadBackedPileup,
    fraction: f64,
    rng: &mut R,
) -> ReadBackedPileup {
    if fraction <= 0.0 {
        return pileup;
    }
    if fraction >= 1.0 {
        return pileup.empty_at();
    }

    let mut strata: [Vec<usize>; NUM_BASES] = Default::default();
    for (idx, element) in pileup.iter().enumerate() {
        if let Some(base) = element.base_index() {
            strata[base].push(idx);
        }
    }

    let counts: Vec<usize> = strata.iter().map(Vec::len).collect();
    let total: usize = counts.iter().sum();
    let num_to_remove = (total as f64 * fraction) as usize;
    let targets = run_smart_downsampling(&counts, num_to_remove);

    let mut remove = bitvec![0; pileup.len()];
    for (stratum, (&count, &target)) in strata.iter().zip(counts.iter().zip(&targets)) {
        if count > target {
            let (_, removed) = partition_removals(stratum.clone(), count - target, rng);
            for idx in removed {
                remove.set(idx, true);
            }
        }
    }

    trace!(
        contig = pileup.contig,
        position = pileup.position,
        ?counts,
        ?targets,
        "allele-biased pileup downsampling"
    );

    let (contig, position) = (pileup.contig, pileup.position);
    let kept = pileup
        .into_elements()
        .into_iter()
        .enumerate()
        .filter_map(|(idx, element)| (!remove[idx]).then_some(element))
        .collect();
    ReadBackedPileup::new(contig, position, kept)
}

/// Choose reads to remove from allele-keyed bins for a contamination
/// `fraction`.
///
/// A bin keyed `None` is the no-call bin: its reads count toward the total
/// that `fraction` is applied to, but are never selected for removal.
/// Returns the reads to remove, grouped by bin in input order.
pub fn select_allele_biased_reads<A, T: Clone, R: Rng + ?Sized>(
    bins: &[(Option<A>, Vec<T>)],
    fraction: f64,
    rng: &mut R,
) -> Vec<T> {
    let total: usize = bins.iter().map(|(_, reads)| reads.len()).sum();
    let num_to_remove = (total as f64 * fraction.max(0.0)) as usize;

    let called: Vec<&Vec<T>> = bins
        .iter()
        .filter_map(|(allele, reads)| allele.as_ref().map(|_| reads))
        .collect();
    let counts: Vec<usize> = called.iter().map(|reads| reads.len()).collect();
    let targets = run_smart_downsampling(&counts, num_to_remove);

    let mut to_remove = Vec::new();
    for ((reads, &count), &target) in called.iter().zip(&counts).zip(&targets) {
        if count > target {
            let (_, removed) = partition_removals(reads.to_vec(), count - target, rng);
            to_remove.extend(removed);
        }
    }
    to_remove
}
