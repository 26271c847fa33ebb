//! Byte ranges into the LaTeX source.
//!
//! Blocks and diagnostics carry a `Span` so warnings can point back at the
//! input, and so wrapped environments can be sliced out exactly.

use std::ops::Range;

/// A byte range `[start, end)` in the source text.
///
/// # Example
///
/// ```rust
/// use l2org_core::span::Span;
///
/// let span = Span::new(5, 10);
/// assert_eq!(span.len(), 5);
/// assert_eq!(&"\\cite{foo}"[span.range()], "{foo}");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Starting byte offset (inclusive).
    pub start: u32,
    /// Ending byte offset (exclusive).
    pub end: u32,
}

impl Span {
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Build a span from `usize` offsets as produced by slice arithmetic.
    #[inline]
    pub const fn from_offsets(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The span as a `usize` range, for slicing the source.
    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Merge two spans into one covering both.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both() {
        let merged = Span::new(10, 12).merge(Span::new(3, 5));
        assert_eq!(merged, Span::new(3, 12));
        assert!(!merged.is_empty());
    }

    #[test]
    fn inverted_span_is_empty() {
        let span = Span::new(8, 2);
        assert!(span.is_empty());
        assert_eq!(span.len(), 0);
    }
}
