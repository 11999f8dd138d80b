use super::{Downsampler, DownsamplingError, ReadsDownsampler};
use crate::genomics::Locatable;

/// Keeps every item; each submission is finalized immediately.
#[derive(Debug, Clone)]
pub struct PassThroughDownsampler<T> {
    selected: Vec<T>,
}

impl<T> PassThroughDownsampler<T> {
    /// Create an empty pass-through downsampler.
    pub fn new() -> Self {
        Self {
            selected: Vec::new(),
        }
    }
}

impl<T> Default for PassThroughDownsampler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Downsampler<T> for PassThroughDownsampler<T> {
    fn submit(&mut self, item: T) -> Result<(), DownsamplingError> {
        self.selected.push(item);
        Ok(())
    }

    fn has_finalized_items(&self) -> bool {
        !self.selected.is_empty()
    }

    fn consume_finalized_items(&mut self) -> Vec<T> {
        std::mem::take(&mut self.selected)
    }

    fn has_pending_items(&self) -> bool {
        false
    }

    fn peek_finalized(&self) -> Option<&T> {
        self.selected.first()
    }

    fn peek_pending(&self) -> Option<&T> {
        None
    }

    fn number_of_discarded_items(&self) -> usize {
        0
    }

    fn signal_end_of_input(&mut self) {}

    fn clear(&mut self) {
        self.selected.clear();
    }

    fn reset(&mut self) {}
}

impl<T: Locatable> ReadsDownsampler<T> for PassThroughDownsampler<T> {
    fn requires_coordinate_sort_order(&self) -> bool {
        false
    }

    fn signal_no_more_reads_before(&mut self, _read: &T) -> Result<(), DownsamplingError> {
        Ok(())
    }
}
