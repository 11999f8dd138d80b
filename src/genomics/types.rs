use std::fmt;
use std::sync::Arc;

/// Genomic coordinates a downsampler needs from a stream item.
///
/// Coordinates are 0-based and the alignment end is inclusive, so a read
/// with `alignment_end() == alignment_start()` covers exactly one locus.
pub trait Locatable {
    /// Index of the reference contig, or `None` for reads with no placement.
    fn contig_index(&self) -> Option<u32>;

    /// Leftmost reference coordinate covered by the alignment.
    fn alignment_start(&self) -> u32;

    /// Rightmost reference coordinate covered by the alignment (inclusive).
    fn alignment_end(&self) -> u32;

    /// Whether the item carries no reference placement at all.
    fn is_unmapped(&self) -> bool {
        self.contig_index().is_none()
    }
}

/// Sort key of an item within a coordinate-sorted stream.
///
/// Mapped items order by `(contig, start)`; unplaced items sort after every
/// mapped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamPosition {
    /// Item aligned to a contig.
    Mapped {
        /// Contig index.
        contig: u32,
        /// Alignment start on the contig.
        start: u32,
    },
    /// Item with no reference placement.
    Unplaced,
}

impl StreamPosition {
    /// Stream position of a locatable item.
    pub fn of<L: Locatable + ?Sized>(item: &L) -> Self {
        match item.contig_index() {
            Some(contig) => StreamPosition::Mapped {
                contig,
                start: item.alignment_start(),
            },
            None => StreamPosition::Unplaced,
        }
    }

    /// Whether an item on `contig` ending at `end` still overlaps this position.
    pub fn is_overlapped_by(&self, contig: Option<u32>, end: u32) -> bool {
        match (*self, contig) {
            (StreamPosition::Mapped { contig: here, start }, Some(there)) => {
                here == there && end >= start
            }
            _ => false,
        }
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamPosition::Mapped { contig, start } => write!(f, "contig {contig}:{start}"),
            StreamPosition::Unplaced => write!(f, "unplaced"),
        }
    }
}

/// Minimal aligned read carrying the fields downsampling inspects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlignedRead {
    /// Read name.
    pub name: Arc<str>,
    /// Sample the read belongs to.
    pub sample: Arc<str>,
    /// Reference contig index (`None` when unplaced).
    pub contig: Option<u32>,
    /// 0-based leftmost reference coordinate.
    pub start: u32,
    /// 0-based rightmost reference coordinate (inclusive).
    pub end: u32,
}

impl AlignedRead {
    /// Construct a mapped read spanning `start..=end` on `contig`.
    pub fn new(name: impl Into<Arc<str>>, contig: u32, start: u32, end: u32) -> Self {
        debug_assert!(end >= start, "alignment end precedes start");
        Self {
            name: name.into(),
            sample: Arc::from(""),
            contig: Some(contig),
            start,
            end,
        }
    }

    /// Construct a read with no reference placement.
    pub fn unmapped(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            sample: Arc::from(""),
            contig: None,
            start: 0,
            end: 0,
        }
    }

    /// Attach a sample name.
    pub fn with_sample(mut self, sample: impl Into<Arc<str>>) -> Self {
        self.sample = sample.into();
        self
    }

    /// Number of reference bases covered by the alignment.
    pub fn reference_length(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl Locatable for AlignedRead {
    fn contig_index(&self) -> Option<u32> {
        self.contig
    }

    fn alignment_start(&self) -> u32 {
        self.start
    }

    fn alignment_end(&self) -> u32 {
        self.end
    }
}

impl<L: Locatable + ?Sized> Locatable for Arc<L> {
    fn contig_index(&self) -> Option<u32> {
        (**self).contig_index()
    }

    fn alignment_start(&self) -> u32 {
        (**self).alignment_start()
    }

    fn alignment_end(&self) -> u32 {
        (**self).alignment_end()
    }

    fn is_unmapped(&self) -> bool {
        (**self).is_unmapped()
    }
}
