// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Half-open byte-range algebra.
//!
//! Every range is `[start, end)` over non-negative byte offsets with
//! `start <= end`; the public constructors reject empty ranges (`start ==
//! end`) since nothing in this crate ever needs to represent one.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("empty range [{start}, {end}) is not allowed")]
    Empty { start: u64, end: u64 },
    #[error("range start {start} is greater than end {end}")]
    Inverted { start: u64, end: u64 },
}

/// A half-open byte interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    pub fn new(start: u64, end: u64) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        if start == end {
            return Err(RangeError::Empty { start, end });
        }
        Ok(Range { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Clip this range to `bound`, returning `None` if the intersection is empty.
    pub fn clip(&self, bound: Range) -> Option<Range> {
        let start = self.start.max(bound.start);
        let end = self.end.min(bound.end);
        Range::new(start, end).ok()
    }
}

/// True if `a` and `b` share at least one byte.
pub fn is_overlapping(a: Range, b: Range) -> bool {
    a.start < b.end && b.start < a.end
}

/// True if every byte in `query` is covered by some range in `ranges`.
///
/// `ranges` is assumed sorted and disjoint, matching every producer in this
/// crate (the virtual buffer's residency list, the cached filelike's
/// downloaded-ranges list).
pub fn is_covered(query: Range, ranges: &[Range]) -> bool {
    missing(query, ranges).is_empty()
}

/// The sub-ranges of `query` not covered by any range in `ranges`, in order.
///
/// `ranges` is clipped to `query` first so a range extending past the query
/// bound does not get treated as covering bytes outside it (and so it
/// cannot corrupt the complement with a spurious zero-length gap at the
/// boundary).
pub fn missing(query: Range, ranges: &[Range]) -> Vec<Range> {
    let mut gaps = Vec::new();
    let mut cursor = query.start;

    for r in ranges {
        let Some(clipped) = r.clip(query) else { continue };
        if clipped.start > cursor {
            if let Ok(gap) = Range::new(cursor, clipped.start) {
                gaps.push(gap);
            }
        }
        cursor = cursor.max(clipped.end);
        if cursor >= query.end {
            break;
        }
    }

    if cursor < query.end {
        if let Ok(gap) = Range::new(cursor, query.end) {
            gaps.push(gap);
        }
    }

    gaps
}

/// The sub-ranges of `query` covered by `ranges`, in order.
pub fn intersect(query: Range, ranges: &[Range]) -> Vec<Range> {
    ranges.iter().filter_map(|r| r.clip(query)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u64, end: u64) -> Range {
        Range::new(start, end).unwrap()
    }

    #[test]
    fn empty_range_rejected() {
        assert!(Range::new(5, 5).is_err());
        assert!(Range::new(5, 4).is_err());
    }

    #[test]
    fn is_covered_true_when_fully_resident() {
        let ranges = vec![r(0, 10), r(10, 20)];
        assert!(is_covered(r(2, 18), &ranges));
    }

    #[test]
    fn is_covered_false_with_gap() {
        let ranges = vec![r(0, 5), r(8, 20)];
        assert!(!is_covered(r(0, 20), &ranges));
    }

    #[test]
    fn missing_finds_single_interior_gap() {
        let ranges = vec![r(0, 5), r(8, 20)];
        assert_eq!(missing(r(0, 20), &ranges), vec![r(5, 8)]);
    }

    #[test]
    fn missing_clips_out_of_bound_ranges_before_complementing() {
        // A resident range extending past the query bound must not be
        // allowed to "cover" bytes outside the query and leave a phantom
        // gap at the boundary.
        let ranges = vec![r(0, 100)];
        assert_eq!(missing(r(10, 30), &ranges), vec![]);

        let ranges = vec![r(50, 200)];
        assert_eq!(missing(r(10, 60), &ranges), vec![r(10, 50)]);
    }

    #[test]
    fn missing_whole_query_when_no_ranges() {
        assert_eq!(missing(r(0, 10), &[]), vec![r(0, 10)]);
    }

    #[test]
    fn missing_union_intersect_reconstructs_query() {
        let ranges = vec![r(0, 5), r(8, 12)];
        let query = r(0, 20);
        let gaps = missing(query, &ranges);
        let covered = intersect(query, &ranges);
        let mut all: Vec<Range> = gaps.into_iter().chain(covered).collect();
        all.sort();
        assert_eq!(all, vec![r(0, 5), r(5, 8), r(8, 12), r(12, 20)]);
    }

    #[test]
    fn is_overlapping_detects_touching_but_disjoint_ranges() {
        assert!(!is_overlapping(r(0, 5), r(5, 10)));
        assert!(is_overlapping(r(0, 6), r(5, 10)));
    }
}
