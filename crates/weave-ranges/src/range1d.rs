//! A 1-D iteration range that splits into a binary tree of sub-ranges.
//!
//! Derived from the same lineage as TBB's `blocked_range`: an origin, a
//! `[begin, end)` window, a minimum leaf size, and a "split on multiples
//! of" alignment used for SIMD-friendly chunking.

use crate::index::RangeIndex;
use crate::splitters::{Even, Proportional};

#[derive(Debug, Clone, Copy)]
pub struct Range1d<I: RangeIndex> {
    origin: I,
    begin: I,
    end: I,
    initial_size: usize,
    min_size: usize,
    split_multiple: usize,
}

impl<I: RangeIndex> Range1d<I> {
    /// # Panics
    /// If `end < begin`, `min_size == 0`, `min_size < split_multiple`, or
    /// `split_multiple` is not a power of two.
    pub fn new(begin: I, end: I, min_size: usize, split_multiple: usize) -> Self {
        assert!(end >= begin, "Range1d: end must not precede begin");
        assert!(min_size > 0, "Range1d: min_size must be non-zero");
        assert!(
            split_multiple.is_power_of_two(),
            "Range1d: split_multiple must be a power of two"
        );
        assert!(
            min_size >= split_multiple,
            "Range1d: min_size must be >= split_multiple"
        );
        Range1d {
            origin: begin,
            begin,
            end,
            initial_size: I::distance(begin, end),
            min_size,
            split_multiple,
        }
    }

    pub fn unit(begin: I, end: I) -> Self {
        Self::new(begin, end, 1, 1)
    }

    pub fn begin(&self) -> I {
        self.begin
    }

    pub fn end(&self) -> I {
        self.end
    }

    pub fn origin(&self) -> I {
        self.origin
    }

    pub fn size(&self) -> usize {
        I::distance(self.begin, self.end)
    }

    pub fn empty(&self) -> bool {
        self.size() == 0
    }

    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    pub fn reset_initial_size(&mut self, size: usize) {
        self.initial_size = size;
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn split_multiple(&self) -> usize {
        self.split_multiple
    }

    pub fn is_divisible(&self) -> bool {
        self.size() > self.min_size
    }

    fn align_offset(&self, value: usize) -> usize {
        let boundary = self.split_multiple;
        let offset = value & (boundary - 1);
        if offset == 0 {
            0
        } else {
            boundary - offset
        }
    }

    /// Splits at the midpoint, rounded up to the nearest `split_multiple`
    /// measured from `origin`. Mutates `self` to the left half and
    /// returns the right half.
    ///
    /// # Panics
    /// If `!self.is_divisible()`.
    pub fn split_even(&mut self, _splitter: Even) -> Self {
        assert!(self.is_divisible(), "split on a non-divisible Range1d");
        let middle = self.begin.advance(self.size() / 2);
        let middle = middle.advance(self.align_offset(I::distance(self.origin, middle)));
        self.split_at(middle)
    }

    /// Splits so the right sub-range is `right / (left + right)` of the
    /// total, rounded to the nearest `split_multiple` from `origin`.
    ///
    /// # Panics
    /// If `!self.is_divisible()`.
    pub fn split_proportional(&mut self, splitter: Proportional) -> Self {
        assert!(self.is_divisible(), "split on a non-divisible Range1d");
        let total = self.size() as f64;
        let right_size =
            (total * splitter.right as f64 / (splitter.left as f64 + splitter.right as f64) + 0.5) as usize;
        let middle = self.end.retreat(right_size);
        let middle = middle.advance(self.align_offset(I::distance(self.origin, middle)));
        self.split_at(middle)
    }

    fn split_at(&mut self, middle: I) -> Self {
        let right = Range1d {
            origin: self.origin,
            begin: middle,
            end: self.end,
            initial_size: self.initial_size,
            min_size: self.min_size,
            split_multiple: self.split_multiple,
        };
        self.end = middle;
        right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn even_split_conserves_size_and_is_contiguous() {
        let mut r = Range1d::<usize>::new(0, 10, 1, 1);
        let right = r.split_even(Even);
        assert_eq!(r.size() + right.size(), 10);
        assert_eq!(r.end(), right.begin());
    }

    #[test]
    fn proportional_split_matches_ratio() {
        let mut r = Range1d::<usize>::new(0, 10, 1, 1);
        let right = r.split_proportional(Proportional::new(3, 7));
        assert_eq!(r.size(), 3);
        assert_eq!(right.size(), 7);
    }

    #[test]
    fn split_respects_multiple_alignment() {
        let mut r = Range1d::<usize>::new(0, 64, 4, 4);
        let right = r.split_even(Even);
        assert_eq!(r.size() % 4, 0);
        assert_eq!(right.end() - right.begin() == right.size(), true);
        assert_eq!(r.size() + right.size(), 64);
    }

    proptest! {
        #[test]
        fn prop_split_conserves_total(end in 2usize..=4096, min_size in 1usize..64) {
            let min_size = min_size.max(1);
            let mut r = Range1d::<usize>::new(0, end, min_size, 1);
            if r.is_divisible() {
                let right = r.split_even(Even);
                prop_assert_eq!(r.size() + right.size(), end);
                prop_assert_eq!(r.end(), right.begin());
            }
        }

        #[test]
        fn prop_recursive_split_tiles_exactly(end in 1usize..=2048, min_size in 1usize..128) {
            let min_size = min_size.max(1);
            let root = Range1d::<usize>::new(0, end, min_size, 1);
            let mut stack = vec![root];
            let mut leaves = Vec::new();
            while let Some(mut r) = stack.pop() {
                if r.is_divisible() {
                    let right = r.split_even(Even);
                    stack.push(r);
                    stack.push(right);
                } else {
                    leaves.push(r);
                }
            }
            leaves.sort_by_key(|r| r.begin());
            let mut cursor = 0usize;
            for leaf in &leaves {
                prop_assert_eq!(leaf.begin(), cursor);
                cursor = leaf.end();
            }
            prop_assert_eq!(cursor, end);
        }
    }
}
