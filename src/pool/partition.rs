//! Work partitioning.
//!
//! Splits a buffer's pixel index space into one contiguous range per worker.
//! Ranges are in pixels; byte addressing happens only through
//! [`PixelRange::bytes`], so the partitioner knows nothing about channel
//! layout or transforms.

use crate::core::error::WorkerId;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A half-open range of pixel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRange {
    /// First pixel index (inclusive).
    pub start: usize,
    /// One past the last pixel index.
    pub end: usize,
}

impl PixelRange {
    /// Create a range. An `end` before `start` yields an empty range.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of pixels in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// First pixel index, if any.
    pub fn first(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.start)
    }

    /// Last pixel index (inclusive), if any.
    pub fn last(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.end - 1)
    }

    /// Byte range covered by this pixel range at `stride` bytes per pixel.
    pub fn bytes(&self, stride: usize) -> Range<usize> {
        self.start * stride..self.end * stride
    }

    /// Whether two ranges share any pixel.
    pub fn overlaps(&self, other: &PixelRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

/// Split `total_pixels` into one range per worker.
///
/// Each worker gets `ceil(total / workers)` pixels; the final non-empty range
/// is clipped to the end of the buffer and any workers beyond it receive
/// empty ranges. Returns an empty vector when `worker_count` is 0.
pub fn partition(total_pixels: usize, worker_count: usize) -> Vec<PixelRange> {
    if worker_count == 0 {
        return Vec::new();
    }

    let chunk = total_pixels.div_ceil(worker_count);

    (0..worker_count)
        .map(|i| {
            let start = (chunk * i).min(total_pixels);
            let end = (start + chunk).min(total_pixels);
            PixelRange::new(start, end)
        })
        .collect()
}

/// Pair ranges with workers, dropping workers whose range is empty.
///
/// The result is exactly the set of workers a job dispatches to.
pub fn assign(total_pixels: usize, workers: &[WorkerId]) -> Vec<(WorkerId, PixelRange)> {
    workers
        .iter()
        .copied()
        .zip(partition(total_pixels, workers.len()))
        .filter(|(_, range)| !range.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inclusive(ranges: &[PixelRange]) -> Vec<Option<(usize, usize)>> {
        ranges
            .iter()
            .map(|r| r.first().zip(r.last()))
            .collect()
    }

    #[test]
    fn test_uneven_split() {
        assert_eq!(
            inclusive(&partition(10, 3)),
            vec![Some((0, 3)), Some((4, 7)), Some((8, 9))]
        );
    }

    #[test]
    fn test_even_split() {
        assert_eq!(inclusive(&partition(4, 2)), vec![Some((0, 1)), Some((2, 3))]);
        assert_eq!(partition(4, 2)[1].bytes(4), 8..16);
    }

    #[test]
    fn test_more_workers_than_pixels() {
        let ranges = partition(2, 5);
        assert_eq!(inclusive(&ranges), vec![Some((0, 0)), Some((1, 1)), None, None, None]);

        // chunk = 2 leaves the last two workers with nothing.
        let ranges = partition(5, 4);
        assert_eq!(inclusive(&ranges), vec![Some((0, 1)), Some((2, 3)), Some((4, 4)), None]);
    }

    #[test]
    fn test_empty_and_degenerate_inputs() {
        assert!(partition(0, 3).iter().all(PixelRange::is_empty));
        assert!(partition(10, 0).is_empty());
    }

    #[test]
    fn test_assign_skips_empty_ranges() {
        let workers: Vec<_> = (0..4).map(|_| WorkerId::new()).collect();
        let assigned = assign(3, &workers);

        assert_eq!(assigned.len(), 3);
        assert_eq!(assigned[0], (workers[0], PixelRange::new(0, 1)));
        assert!(assigned.iter().all(|(w, _)| *w != workers[3]));
    }

    #[test]
    fn test_overlaps() {
        assert!(PixelRange::new(0, 4).overlaps(&PixelRange::new(3, 5)));
        assert!(!PixelRange::new(0, 4).overlaps(&PixelRange::new(4, 5)));
        assert!(!PixelRange::new(2, 2).overlaps(&PixelRange::new(0, 5)));
    }

    proptest! {
        #[test]
        fn prop_ranges_cover_exactly(total in 0usize..10_000, workers in 1usize..64) {
            let ranges = partition(total, workers);
            prop_assert_eq!(ranges.len(), workers);

            let mut next = 0;
            for range in ranges.iter().filter(|r| !r.is_empty()) {
                prop_assert_eq!(range.start, next);
                next = range.end;
            }
            prop_assert_eq!(next, total);
        }

        #[test]
        fn prop_ranges_are_disjoint(total in 0usize..5_000, workers in 1usize..32) {
            let ranges = partition(total, workers);
            for (i, a) in ranges.iter().enumerate() {
                for b in &ranges[i + 1..] {
                    prop_assert!(!a.overlaps(b));
                    prop_assert!(a.is_empty() || b.is_empty() || a.end <= b.start);
                }
            }
        }

        #[test]
        fn prop_byte_ranges_are_disjoint(total in 0usize..5_000, workers in 1usize..32, stride in 3usize..5) {
            let bytes: Vec<_> = partition(total, workers).iter().map(|r| r.bytes(stride)).collect();
            for pair in bytes.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start || pair[1].is_empty());
            }
        }
    }
}
