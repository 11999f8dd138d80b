use crate::genomics::AlignedRead;

/// Number of called bases (A, C, G, T).
pub const NUM_BASES: usize = 4;

/// Index of a called base in `[A, C, G, T]`, or `None` for anything else.
pub fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' | b'U' | b'u' => Some(3),
        _ => None,
    }
}

/// One read's contribution to a pileup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PileupElement {
    /// Read covering the pileup locus.
    pub read: AlignedRead,
    /// Offset into the read sequence.
    pub offset: usize,
    /// Base observed at the locus (`b'D'` for deletions).
    pub base: u8,
    /// Phred-scaled base quality.
    pub quality: u8,
}

impl PileupElement {
    /// Construct a new pileup element.
    pub fn new(read: AlignedRead, offset: usize, base: u8, quality: u8) -> Self {
        Self {
            read,
            offset,
            base,
            quality,
        }
    }

    /// Allele bin of the observed base, if it is a called base.
    pub fn base_index(&self) -> Option<usize> {
        base_index(self.base)
    }
}

/// All elements stacked over a single reference locus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBackedPileup {
    /// Contig of the locus.
    pub contig: u32,
    /// 0-based coordinate of the locus.
    pub position: u32,
    elements: Vec<PileupElement>,
}

impl ReadBackedPileup {
    /// Construct a pileup from its elements.
    pub fn new(contig: u32, position: u32, elements: Vec<PileupElement>) -> Self {
        Self {
            contig,
            position,
            elements,
        }
    }

    /// An empty pileup at the same locus.
    pub fn empty_at(&self) -> Self {
        Self::new(self.contig, self.position, Vec::new())
    }

    /// Number of elements (depth of coverage).
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the pileup holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in pileup order.
    pub fn elements(&self) -> &[PileupElement] {
        &self.elements
    }

    /// Consume the pileup, returning its elements.
    pub fn into_elements(self) -> Vec<PileupElement> {
        self.elements
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, PileupElement> {
        self.elements.iter()
    }

    /// Per-base observation counts `[A, C, G, T]`.
    pub fn base_counts(&self) -> [usize; NUM_BASES] {
        let mut counts = [0; NUM_BASES];
        for idx in self.elements.iter().filter_map(PileupElement::base_index) {
            counts[idx] += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a ReadBackedPileup {
    type Item = &'a PileupElement;
    type IntoIter = std::slice::Iter<'a, PileupElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
