//! Interval bookkeeping over byte offsets of a document's text.

use serde::{Deserialize, Serialize};

/// Half-open range `[start, end)` into a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span, swapping the bounds if they are given in reverse.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Zero-width span at a position, used for insertions.
    pub fn empty(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn from_match(m: &regex::Match<'_>) -> Self {
        Self::new(m.start(), m.end())
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when the spans share at least one offset.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True when the spans overlap or touch at a boundary.
    pub fn contains(&self, other: &Span) -> bool {
        self.end >= other.start && self.start <= other.end
    }
}

/// Sorted, non-overlapping set of spans claimed so far in one document.
///
/// Every mutation renormalizes: spans are ordered by start and any spans that
/// overlap or touch are merged into one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanSet {
    spans: Vec<Span>,
}

impl SpanSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_spans(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut set = Self::new();
        for span in spans {
            set.merge(span);
        }
        set
    }

    pub fn start(&self) -> Option<usize> {
        self.spans.first().map(|s| s.start)
    }

    pub fn end(&self) -> Option<usize> {
        self.spans.last().map(|s| s.end)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter()
    }

    /// Insert a span and renormalize.
    pub fn merge(&mut self, span: Span) {
        let idx = self.spans.partition_point(|s| s.start <= span.start);
        self.spans.insert(idx, span);
        self.normalize();
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// True if any member overlaps `span`.
    pub fn overlaps(&self, span: &Span) -> bool {
        // Members are sorted and disjoint, so only the last member starting
        // before `span.end` can overlap it.
        let idx = self.spans.partition_point(|s| s.start < span.end);
        idx > 0 && self.spans[idx - 1].overlaps(span)
    }

    /// True if any member of `self` overlaps any member of `other`.
    pub fn overlaps_set(&self, other: &SpanSet) -> bool {
        let (mut l, mut r) = (0, 0);

        while l < self.spans.len() && r < other.spans.len() {
            let left = &self.spans[l];
            let right = &other.spans[r];

            if left.overlaps(right) {
                return true;
            }

            // Advance whichever ends first
            if left.end < right.end {
                l += 1;
            } else {
                r += 1;
            }
        }

        false
    }

    fn normalize(&mut self) {
        let mut result: Vec<Span> = Vec::with_capacity(self.spans.len());

        for span in self.spans.drain(..) {
            match result.last_mut() {
                Some(last) if last.contains(&span) => {
                    last.end = last.end.max(span.end);
                }
                _ => result.push(span),
            }
        }

        self.spans = result;
    }
}
