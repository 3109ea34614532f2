//! Segments: runs of quantized points confined to one bin

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Most points a segment header can declare (its count is a `u16`)
pub const MAX_SEGMENT_POINTS: usize = u16::MAX as usize;

/// A point relative to its bin's south-west corner, in `1/65535` of a bin width
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuantizedPoint {
    pub dx: u16,
    pub dy: u16,
}

impl QuantizedPoint {
    pub const fn new(dx: u16, dy: u16) -> Self {
        Self { dx, dy }
    }
}

/// A run of points from one feature lying inside a single bin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Feature the run was cut from, kept for diagnostics
    pub feature_id: usize,
    /// Hierarchical level inherited from the feature
    pub level: u16,
    pub points: Vec<QuantizedPoint>,
}

impl Segment {
    pub fn new(feature_id: usize, level: u16, points: Vec<QuantizedPoint>) -> Self {
        Self {
            feature_id,
            level,
            points,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Split into consecutive pieces of at most `max_points` points
    ///
    /// Neighbouring pieces share their joining point so the line stays
    /// connected. A segment that already fits is returned unchanged.
    pub fn split(self, max_points: usize) -> Vec<Segment> {
        let n = self.points.len();
        if n <= max_points || max_points < 2 {
            return vec![self];
        }

        let mut pieces = Vec::with_capacity(n / (max_points - 1) + 1);
        let mut start = 0;
        while start < n - 1 {
            let end = (start + max_points).min(n);
            pieces.push(Segment::new(
                self.feature_id,
                self.level,
                self.points[start..end].to_vec(),
            ));
            start = end - 1;
        }
        pieces
    }
}

/// One grid cell: the chain of segments appended to it, in arrival order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bin {
    segments: Vec<Segment>,
}

impl Bin {
    #[inline]
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments in the chain
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total points over all segments of the chain
    pub fn n_points(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    /// Hand the chain over, leaving the bin empty
    pub fn take(&mut self) -> Vec<Segment> {
        std::mem::take(&mut self.segments)
    }
}
