//! A 2-D iteration range that splits along whichever dimension is
//! relatively largest, producing a Kd-tree of leaf sub-ranges.

use crate::index::RangeIndex;
use crate::range1d::Range1d;
use crate::splitters::{Even, SplitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitAxis {
    None,
    X,
    Y,
}

#[derive(Debug, Clone, Copy)]
pub struct KdRange2d<I: RangeIndex> {
    x: Range1d<I>,
    y: Range1d<I>,
    was_split_on: SplitAxis,
}

impl<I: RangeIndex> KdRange2d<I> {
    pub fn new(
        x_begin: I,
        x_end: I,
        x_min_size: usize,
        y_begin: I,
        y_end: I,
        y_min_size: usize,
    ) -> Self {
        KdRange2d {
            x: Range1d::new(x_begin, x_end, x_min_size, 1),
            y: Range1d::new(y_begin, y_end, y_min_size, 1),
            was_split_on: SplitAxis::None,
        }
    }

    pub fn x_range(&self) -> &Range1d<I> {
        &self.x
    }

    pub fn y_range(&self) -> &Range1d<I> {
        &self.y
    }

    /// Size as the product of dimension sizes, seeded from 1 — the
    /// corrected semantics (the source's multiply-from-zero accumulator
    /// always yields 0, which spec.md's open questions flag as a defect).
    pub fn size(&self) -> usize {
        self.x.size() * self.y.size()
    }

    /// Empty iff any dimension is empty — not "all dimensions empty" as
    /// the buggy source accumulator implies, since a range with a zero
    /// extent in either axis covers no cells at all.
    pub fn empty(&self) -> bool {
        self.x.empty() || self.y.empty()
    }

    pub fn is_divisible(&self) -> bool {
        self.x.is_divisible() || self.y.is_divisible()
    }

    /// Splits along whichever axis is relatively larger (`x.size() *
    /// y.min_size() >= y.size() * x.min_size()` favors X; ties go to X),
    /// returning the right sibling and mutating `self` into the left.
    ///
    /// # Panics
    /// If `!self.is_divisible()`.
    pub fn split(&mut self, _splitter: Even) -> Self {
        assert!(self.is_divisible(), "split on a non-divisible KdRange2d");

        let split_y = self.x.size() * self.y.min_size() < self.y.size() * self.x.min_size();

        let mut right = *self;
        if split_y {
            right.y = self.y.split_even(Even);
            right.was_split_on = SplitAxis::Y;
        } else {
            right.x = self.x.split_even(Even);
            right.was_split_on = SplitAxis::X;
        }
        right
    }

    /// The adjacent tile along X, clamped to the range's original extent.
    /// When the last split was on Y (orthogonal to this query), the
    /// neighbor's Y extent is doubled to represent the merged footprint
    /// of the two siblings produced by that split.
    pub fn x_neighbor(&self) -> Self {
        let mut neighbor = *self;
        let x_size = self.x.size();
        neighbor.x = Range1d::new(
            self.x.end(),
            clamp_end(self.x.end().advance(x_size), self.x.initial_size(), self.x.origin()),
            self.x.min_size(),
            1,
        );
        neighbor.x.reset_initial_size(self.x.initial_size());

        if self.was_split_on == SplitAxis::X {
            let y_size = self.y.size();
            let doubled_end = clamp_end(
                self.y.end().advance(y_size * 2),
                self.y.initial_size(),
                self.y.origin(),
            );
            neighbor.y = Range1d::new(self.y.begin(), doubled_end, self.y.min_size(), 1);
            neighbor.y.reset_initial_size(self.y.initial_size());
        }
        neighbor
    }

    /// The adjacent tile along Y, symmetric to [`Self::x_neighbor`].
    pub fn y_neighbor(&self) -> Self {
        let mut neighbor = *self;
        let y_size = self.y.size();
        neighbor.y = Range1d::new(
            self.y.end(),
            clamp_end(self.y.end().advance(y_size), self.y.initial_size(), self.y.origin()),
            self.y.min_size(),
            1,
        );
        neighbor.y.reset_initial_size(self.y.initial_size());

        if self.was_split_on == SplitAxis::Y {
            let x_size = self.x.size();
            let doubled_end = clamp_end(
                self.x.end().advance(x_size * 2),
                self.x.initial_size(),
                self.x.origin(),
            );
            neighbor.x = Range1d::new(self.x.begin(), doubled_end, self.x.min_size(), 1);
            neighbor.x.reset_initial_size(self.x.initial_size());
        }
        neighbor
    }

    pub const MAX_SPLITS: usize = 1;

    pub fn split_result(&mut self) -> SplitResult<Self, { Self::MAX_SPLITS }> {
        let mut result = SplitResult::new();
        result.push(self.split(Even));
        result
    }
}

fn clamp_end<I: RangeIndex>(candidate: I, initial_size: usize, origin: I) -> I {
    let max_end = origin.advance(initial_size);
    if candidate > max_end {
        max_end
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_larger_dimension_first() {
        let mut r = KdRange2d::<usize>::new(0, 100, 1, 0, 10, 1);
        let right = r.split(Even);
        // x was much larger relative to its min size, so X should split.
        assert_eq!(r.x_range().size() + right.x_range().size(), 100);
        assert_eq!(r.y_range().size(), 10);
        assert_eq!(right.y_range().size(), 10);
    }

    #[test]
    fn tiles_exactly_with_no_gaps_or_overlaps() {
        let root = KdRange2d::<usize>::new(0, 37, 1, 0, 29, 1);
        let mut stack = vec![root];
        let mut leaves = Vec::new();
        while let Some(mut r) = stack.pop() {
            if r.is_divisible() {
                let right = r.split(Even);
                stack.push(r);
                stack.push(right);
            } else {
                leaves.push(r);
            }
        }
        let total: usize = leaves.iter().map(|r| r.size()).sum();
        assert_eq!(total, 37 * 29);
    }

    #[test]
    fn corrected_size_and_empty_semantics() {
        let r = KdRange2d::<usize>::new(0, 4, 1, 0, 0, 1);
        assert!(r.empty());
        assert_eq!(r.size(), 0);

        let r2 = KdRange2d::<usize>::new(0, 4, 1, 0, 5, 1);
        assert!(!r2.empty());
        assert_eq!(r2.size(), 20);
    }
}
