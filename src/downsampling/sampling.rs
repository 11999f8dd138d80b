//! Sampling primitives shared by the downsamplers.
//!
//! - [`Reservoir`]: Algorithm R over a stream, O(k) memory.
//! - [`sample_indices_without_replacement`] / [`downsample_to`]: uniform
//!   subset selection over a collection already in hand.
//! - [`level_counts`]: the round-robin fairness pass behind leveling.

use bitvec::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::DownsamplingError;

/// Create a random number generator, optionally seeded for reproducibility.
///
/// With `None` the generator is seeded from OS entropy.
#[must_use]
pub fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

/// Fixed-capacity uniform sample of a stream (Algorithm R).
///
/// After `n` offers every offered item is present with probability
/// `min(1, k / n)`.
#[derive(Debug, Clone)]
pub(crate) struct Reservoir<T> {
    capacity: usize,
    items: Vec<T>,
    seen: usize,
}

impl<T> Reservoir<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "reservoir capacity must be positive");
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(1024)),
            seen: 0,
        }
    }

    /// Offer one item. Returns `true` when an item (the new one or an
    /// evicted occupant) was discarded.
    pub(crate) fn offer<R: Rng + ?Sized>(&mut self, item: T, rng: &mut R) -> bool {
        self.seen += 1;
        if self.items.len() < self.capacity {
            self.items.push(item);
            return false;
        }

        let slot = rng.random_range(0..self.seen);
        if slot < self.capacity {
            self.items[slot] = item;
        }
        true
    }

    /// Take the current sample and restart the stream count.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        self.seen = 0;
        std::mem::take(&mut self.items)
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.seen = 0;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn seen(&self) -> usize {
        self.seen
    }

    pub(crate) fn first(&self) -> Option<&T> {
        self.items.first()
    }
}

/// Draw `amount` distinct indices from `0..length`, returned in ascending order.
///
/// # Panics
///
/// Panics if `amount > length`.
pub fn sample_indices_without_replacement<R: Rng + ?Sized>(
    length: usize,
    amount: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut indices = index::sample(rng, length, amount).into_vec();
    indices.sort_unstable();
    indices
}

/// Keep a uniform random subset of `keep` items, preserving their order.
///
/// Returns the survivors and the number of items dropped.
pub fn downsample_to<T, R: Rng + ?Sized>(
    items: Vec<T>,
    keep: usize,
    rng: &mut R,
) -> Result<(Vec<T>, usize), DownsamplingError> {
    if keep > items.len() {
        return Err(DownsamplingError::GroupTooSmall {
            requested: keep,
            available: items.len(),
        });
    }
    Ok(retain_uniform_sample(items, keep, rng))
}

/// Infallible core of [`downsample_to`]; `keep` is clamped to the item count.
pub(crate) fn retain_uniform_sample<T, R: Rng + ?Sized>(
    items: Vec<T>,
    keep: usize,
    rng: &mut R,
) -> (Vec<T>, usize) {
    let total = items.len();
    if keep >= total {
        return (items, 0);
    }

    let mut kept_mask = bitvec![0; total];
    for idx in index::sample(rng, total, keep) {
        kept_mask.set(idx, true);
    }

    let kept: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| kept_mask[idx].then_some(item))
        .collect();
    (kept, total - keep)
}

/// Shrink `counts` toward an aggregate `target` without driving any
/// non-empty count below one.
///
/// Removes one unit at a time, round-robin from the first count, skipping
/// counts already at one or zero. Stops when the sum reaches `target` or a
/// full pass removes nothing. Returns the number of units removed.
pub fn level_counts(counts: &mut [usize], target: usize) -> usize {
    let total: usize = counts.iter().sum();
    if total <= target {
        return 0;
    }

    let mut to_remove = total - target;
    let mut removed = 0;
    while to_remove > 0 {
        let mut removed_this_pass = false;
        for count in counts.iter_mut() {
            if to_remove == 0 {
                break;
            }
            if *count > 1 {
                *count -= 1;
                to_remove -= 1;
                removed += 1;
                removed_this_pass = true;
            }
        }
        if !removed_this_pass {
            break;
        }
    }
    removed
}
