//! Sets of integer token positions.
//!
//! A [`Span`] records which token positions a match claims, on the query
//! side and on the rule side. Positions need not be contiguous: a sequence
//! match assembled from several aligned blocks claims several disjoint
//! ranges. Spans are immutable once built; every operation returns a new
//! value.

use std::fmt;
use std::ops::Range;

/// An ordered set of integer positions, stored as sorted, coalesced,
/// non-overlapping half-open ranges.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Span {
    ranges: Vec<Range<usize>>,
}

impl Span {
    /// An empty span.
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// A span covering one half-open range.
    pub fn from_range(range: Range<usize>) -> Self {
        if range.is_empty() {
            return Self::new();
        }
        Self {
            ranges: vec![range],
        }
    }

    /// A span covering `start..=end`.
    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self::from_range(start..end + 1)
    }

    /// Build a span from arbitrary positions, coalescing adjacent ones.
    pub fn from_positions(positions: impl IntoIterator<Item = usize>) -> Self {
        let mut sorted: Vec<usize> = positions.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<Range<usize>> = Vec::new();
        for pos in sorted {
            match ranges.last_mut() {
                Some(last) if last.end == pos => last.end = pos + 1,
                _ => ranges.push(pos..pos + 1),
            }
        }
        Self { ranges }
    }

    /// Number of positions in the span.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.end - r.start).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Lowest position, if any.
    pub fn start(&self) -> Option<usize> {
        self.ranges.first().map(|r| r.start)
    }

    /// Highest position, if any.
    pub fn end(&self) -> Option<usize> {
        self.ranges.last().map(|r| r.end - 1)
    }

    /// True when the span covers a single unbroken run of positions.
    pub fn is_contiguous(&self) -> bool {
        self.ranges.len() <= 1
    }

    pub fn contains_position(&self, pos: usize) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if pos < r.start {
                    std::cmp::Ordering::Greater
                } else if pos >= r.end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// True when every position of `other` is also in `self`.
    pub fn contains(&self, other: &Span) -> bool {
        other.len() == self.overlap(other)
    }

    /// Count of positions shared with `other`.
    pub fn overlap(&self, other: &Span) -> usize {
        let mut count = 0;
        let mut theirs = other.ranges.iter().peekable();
        for ours in &self.ranges {
            while let Some(r) = theirs.peek() {
                let lo = ours.start.max(r.start);
                let hi = ours.end.min(r.end);
                if lo < hi {
                    count += hi - lo;
                }
                // advance whichever range ends first
                if r.end <= ours.end {
                    theirs.next();
                } else {
                    break;
                }
            }
        }
        count
    }

    pub fn intersects(&self, other: &Span) -> bool {
        let mut theirs = other.ranges.iter().peekable();
        for ours in &self.ranges {
            while let Some(r) = theirs.peek() {
                if ours.start.max(r.start) < ours.end.min(r.end) {
                    return true;
                }
                if r.end <= ours.end {
                    theirs.next();
                } else {
                    break;
                }
            }
        }
        false
    }

    /// All positions of both spans.
    pub fn union(&self, other: &Span) -> Span {
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(self.ranges.len() + other.ranges.len());
        let mut a = self.ranges.iter().peekable();
        let mut b = other.ranges.iter().peekable();

        let mut push = |merged: &mut Vec<Range<usize>>, r: Range<usize>| match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        };

        loop {
            let next = match (a.peek(), b.peek()) {
                (Some(x), Some(y)) => {
                    if x.start <= y.start {
                        a.next()
                    } else {
                        b.next()
                    }
                }
                (Some(_), None) => a.next(),
                (None, Some(_)) => b.next(),
                (None, None) => break,
            };
            if let Some(r) = next {
                push(&mut merged, r.clone());
            }
        }
        Span { ranges: merged }
    }

    /// Positions present in both spans.
    pub fn intersection(&self, other: &Span) -> Span {
        let mut out: Vec<Range<usize>> = Vec::new();
        let mut theirs = other.ranges.iter().peekable();
        for ours in &self.ranges {
            while let Some(r) = theirs.peek() {
                let lo = ours.start.max(r.start);
                let hi = ours.end.min(r.end);
                if lo < hi {
                    out.push(lo..hi);
                }
                if r.end <= ours.end {
                    theirs.next();
                } else {
                    break;
                }
            }
        }
        Span { ranges: out }
    }

    /// Positions of `self` absent from `other`.
    pub fn difference(&self, other: &Span) -> Span {
        Span::from_positions(self.positions().filter(|p| !other.contains_position(*p)))
    }

    /// Gap in positions between this span and a later `other`; zero when
    /// they touch or overlap.
    pub fn distance_to(&self, other: &Span) -> usize {
        match (self.end(), other.start()) {
            (Some(e), Some(s)) if s > e + 1 => s - e - 1,
            _ => 0,
        }
    }

    /// Iterate positions in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span(")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if r.end - r.start == 1 {
                write!(f, "{}", r.start)?;
            } else {
                write!(f, "{}-{}", r.start, r.end - 1)?;
            }
        }
        write!(f, ")")
    }
}

impl FromIterator<usize> for Span {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Span::from_positions(iter)
    }
}
