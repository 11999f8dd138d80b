//! Lazy downsampling over read iterators.

use std::cmp::{Ordering, Reverse};
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

use tracing::debug;

use super::method::DownsamplerFactory;
use super::{check_coordinate_order, DownsamplingError, ReadsDownsampler};
use crate::genomics::{Locatable, StreamPosition};

/// Runs one downsampler over a read stream, yielding survivors as they are
/// finalized.
///
/// The inner iterator is drained lazily: reads are pulled only until the
/// downsampler finalizes something. At exhaustion the downsampler is
/// signalled end of input and its remaining survivors are yielded. The first
/// error ends the iteration.
pub struct DownsamplingReadsIterator<I: Iterator, D> {
    inner: I,
    downsampler: D,
    ready: VecDeque<I::Item>,
    done: bool,
}

impl<I, D> DownsamplingReadsIterator<I, D>
where
    I: Iterator,
    I::Item: Locatable,
    D: ReadsDownsampler<I::Item>,
{
    /// Wrap `inner` with `downsampler`.
    pub fn new(inner: I, downsampler: D) -> Self {
        Self {
            inner,
            downsampler,
            ready: VecDeque::new(),
            done: false,
        }
    }

    /// Reads discarded so far.
    pub fn number_of_discarded_items(&self) -> usize {
        self.downsampler.number_of_discarded_items()
    }

    fn collect_finalized(&mut self) {
        if self.downsampler.has_finalized_items() {
            self.ready.extend(self.downsampler.consume_finalized_items());
        }
    }
}

impl<I, D> Iterator for DownsamplingReadsIterator<I, D>
where
    I: Iterator,
    I::Item: Locatable,
    D: ReadsDownsampler<I::Item>,
{
    type Item = Result<I::Item, DownsamplingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(read) = self.ready.pop_front() {
                return Some(Ok(read));
            }
            if self.done {
                return None;
            }

            match self.inner.next() {
                Some(read) => {
                    if let Err(err) = self.downsampler.submit(read) {
                        self.done = true;
                        return Some(Err(err));
                    }
                    self.collect_finalized();
                }
                None => {
                    self.downsampler.signal_end_of_input();
                    self.collect_finalized();
                    self.done = true;
                    debug!(
                        discarded = self.downsampler.number_of_discarded_items(),
                        "read stream exhausted"
                    );
                }
            }
        }
    }
}

impl<I: Iterator, D> fmt::Debug for DownsamplingReadsIterator<I, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownsamplingReadsIterator")
            .field("ready", &self.ready.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Finalized read waiting for the merge; ordered by position, then by the
/// order in which it was finalized.
struct OrderedRead<T> {
    position: StreamPosition,
    sequence: u64,
    read: T,
}

impl<T> PartialEq for OrderedRead<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for OrderedRead<T> {}

impl<T> PartialOrd for OrderedRead<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for OrderedRead<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.position, self.sequence).cmp(&(other.position, other.sequence))
    }
}

/// Downsamples each sample of a coordinate-sorted stream independently and
/// merges the survivors back into coordinate order.
///
/// `sample_of` keys each read; the first read of a new key gets a fresh
/// downsampler from the factory. Samples are visited in order of first
/// appearance, so a seeded factory gives reproducible output.
///
/// Whenever the stream advances, every sample's downsampler is told no
/// earlier read will follow, so samples that went quiet still finalize their
/// stacks. A survivor is released only once no sample holds a pending read
/// at an earlier position.
pub struct PerSampleDownsamplingReadsIterator<I: Iterator, K, F, Fa> {
    inner: I,
    sample_of: F,
    factory: Fa,
    sample_index: HashMap<K, usize>,
    downsamplers: Vec<Box<dyn ReadsDownsampler<I::Item>>>,
    merged: BinaryHeap<Reverse<OrderedRead<I::Item>>>,
    current_position: Option<StreamPosition>,
    sequence: u64,
    done: bool,
}

impl<I, K, F, Fa> PerSampleDownsamplingReadsIterator<I, K, F, Fa>
where
    I: Iterator,
    I::Item: Locatable,
    K: Eq + Hash,
    F: FnMut(&I::Item) -> K,
    Fa: DownsamplerFactory<I::Item>,
{
    /// Split `inner` by `sample_of`, downsampling each sample with an
    /// instance from `factory`.
    pub fn new(inner: I, sample_of: F, factory: Fa) -> Self {
        Self {
            inner,
            sample_of,
            factory,
            sample_index: HashMap::new(),
            downsamplers: Vec::new(),
            merged: BinaryHeap::new(),
            current_position: None,
            sequence: 0,
            done: false,
        }
    }

    /// Number of distinct samples seen so far.
    pub fn num_samples(&self) -> usize {
        self.downsamplers.len()
    }

    /// Reads discarded so far, across all samples.
    pub fn number_of_discarded_items(&self) -> usize {
        self.downsamplers
            .iter()
            .map(|d| d.number_of_discarded_items())
            .sum()
    }

    fn submit(&mut self, read: I::Item) -> Result<(), DownsamplingError> {
        let position = StreamPosition::of(&read);
        check_coordinate_order(self.current_position, position)?;
        if self.current_position.is_some_and(|current| position > current) {
            for downsampler in &mut self.downsamplers {
                downsampler.signal_no_more_reads_before(&read)?;
            }
            self.collect_all_finalized();
        }
        self.current_position = Some(position);

        let key = (self.sample_of)(&read);
        let idx = match self.sample_index.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                self.downsamplers.push(self.factory.new_instance()?);
                *entry.insert(self.downsamplers.len() - 1)
            }
        };
        let downsampler = &mut self.downsamplers[idx];
        downsampler.submit(read)?;
        let finalized = downsampler.consume_finalized_items();
        self.push_finalized(finalized);
        Ok(())
    }

    fn collect_all_finalized(&mut self) {
        let mut finalized = Vec::new();
        for downsampler in &mut self.downsamplers {
            if downsampler.has_finalized_items() {
                finalized.extend(downsampler.consume_finalized_items());
            }
        }
        self.push_finalized(finalized);
    }

    fn push_finalized(&mut self, reads: Vec<I::Item>) {
        for read in reads {
            let position = StreamPosition::of(&read);
            self.merged.push(Reverse(OrderedRead {
                position,
                sequence: self.sequence,
                read,
            }));
            self.sequence += 1;
        }
    }

    fn earliest_pending(&self) -> Option<StreamPosition> {
        self.downsamplers
            .iter()
            .filter_map(|d| d.peek_pending().map(StreamPosition::of))
            .min()
    }

    fn pop_releasable(&mut self) -> Option<I::Item> {
        let top = self.merged.peek()?.0.position;
        if !self.done {
            if let Some(pending) = self.earliest_pending() {
                if top > pending {
                    return None;
                }
            }
        }
        self.merged.pop().map(|Reverse(entry)| entry.read)
    }

    fn finish(&mut self) {
        for downsampler in &mut self.downsamplers {
            downsampler.signal_end_of_input();
        }
        self.collect_all_finalized();
        self.done = true;
        debug!(
            samples = self.downsamplers.len(),
            discarded = self.number_of_discarded_items(),
            "per-sample read stream exhausted"
        );
    }
}

impl<I, K, F, Fa> Iterator for PerSampleDownsamplingReadsIterator<I, K, F, Fa>
where
    I: Iterator,
    I::Item: Locatable,
    K: Eq + Hash,
    F: FnMut(&I::Item) -> K,
    Fa: DownsamplerFactory<I::Item>,
{
    type Item = Result<I::Item, DownsamplingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(read) = self.pop_releasable() {
                return Some(Ok(read));
            }
            if self.done {
                return None;
            }

            match self.inner.next() {
                Some(read) => {
                    if let Err(err) = self.submit(read) {
                        self.merged.clear();
                        self.done = true;
                        return Some(Err(err));
                    }
                }
                None => self.finish(),
            }
        }
    }
}

impl<I: Iterator, K, F, Fa> fmt::Debug for PerSampleDownsamplingReadsIterator<I, K, F, Fa> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerSampleDownsamplingReadsIterator")
            .field("samples", &self.downsamplers.len())
            .field("merged", &self.merged.len())
            .field("current_position", &self.current_position)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::downsampling::{
        PassThroughDownsampler, SimplePositionalDownsampler, SimplePositionalDownsamplerFactory,
    };
    use crate::genomics::AlignedRead;

    fn read(name: &str, sample: &str, start: u32) -> AlignedRead {
        AlignedRead::new(name, 0, start, start + 49).with_sample(sample)
    }

    #[test]
    fn single_downsampler_yields_survivors_in_order() {
        let reads: Vec<AlignedRead> = (0..30).map(|i| read(&format!("r{i}"), "s", i / 10)).collect();
        let downsampler = SimplePositionalDownsampler::with_seed(4, 3).unwrap();
        let mut iter = DownsamplingReadsIterator::new(reads.into_iter(), downsampler);

        let kept: Vec<AlignedRead> = iter.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(kept.len(), 12);
        assert!(kept.windows(2).all(|w| w[0].start <= w[1].start));
        assert_eq!(iter.number_of_discarded_items(), 18);
    }

    #[test]
    fn errors_end_iteration() {
        let reads = vec![read("a", "s", 10), read("b", "s", 5), read("c", "s", 20)];
        let downsampler = SimplePositionalDownsampler::with_seed(4, 3).unwrap();
        let results: Vec<_> = DownsamplingReadsIterator::new(reads.into_iter(), downsampler).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn pass_through_is_lazy() {
        let reads = (0..5).map(|i| read(&format!("r{i}"), "s", i));
        let mut iter = DownsamplingReadsIterator::new(reads, PassThroughDownsampler::new());
        assert_eq!(iter.next().unwrap().unwrap().start, 0);
        assert_eq!(iter.count(), 4);
    }

    #[test]
    fn samples_are_capped_separately_and_merged() {
        let mut reads = Vec::new();
        for start in 0..4u32 {
            for i in 0..6 {
                reads.push(read(&format!("a{start}_{i}"), "A", start * 100));
            }
            for i in 0..3 {
                reads.push(read(&format!("b{start}_{i}"), "B", start * 100));
            }
        }
        let factory = SimplePositionalDownsamplerFactory::new(2, Some(17)).unwrap();
        let mut iter = PerSampleDownsamplingReadsIterator::new(
            reads.into_iter(),
            |r: &AlignedRead| Arc::clone(&r.sample),
            factory,
        );

        let kept: Vec<AlignedRead> = iter.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(kept.len(), 16);
        assert!(kept.windows(2).all(|w| w[0].start <= w[1].start));
        for start in 0..4u32 {
            for sample in ["A", "B"] {
                let n = kept
                    .iter()
                    .filter(|r| r.start == start * 100 && &*r.sample == sample)
                    .count();
                assert_eq!(n, 2, "sample {sample} at {start}");
            }
        }
        assert_eq!(iter.num_samples(), 2);
        assert_eq!(iter.number_of_discarded_items(), 4 * 4 + 4);
    }

    #[test]
    fn per_sample_rejects_unsorted_input() {
        let reads = vec![read("a", "A", 10), read("b", "B", 5)];
        let factory = SimplePositionalDownsamplerFactory::new(2, Some(1)).unwrap();
        let results: Vec<_> = PerSampleDownsamplingReadsIterator::new(
            reads.into_iter(),
            |r: &AlignedRead| Arc::clone(&r.sample),
            factory,
        )
        .collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(DownsamplingError::OutOfOrderSubmission { .. })
        ));
    }
}
