//! Bridges the five range shapes in `weave-ranges` to one trait the
//! patterns can recurse over. Each range's native split method differs in
//! shape (one sibling for `Range1d`/Kd ranges, up to three or seven for
//! Quad/Oct), so this just normalizes all of them to "the siblings
//! produced by one split, as a `Vec`".

use weave_ranges::{Even, KdRange2d, KdRange3d, OctRange, QuadRange, Range1d, RangeIndex};

/// A range a pattern can recursively divide into leaf-sized pieces.
pub trait SplittableRange: Copy + Send + 'static {
    fn is_divisible(&self) -> bool;

    /// Splits `self` in place (mutating it into one of the resulting
    /// pieces) and returns its siblings.
    fn split_siblings(&mut self) -> Vec<Self>
    where
        Self: Sized;

    /// The branching factor of one split of this range shape (2 for
    /// `Range1d`/`KdRange2d`/`KdRange3d`, which always produce a single
    /// sibling; 4 for `QuadRange`; 8 for `OctRange`), i.e. `k` in spec.md
    /// §4.6's `ceil(log_k(worker_count))` depth for `Partitioner::Static`.
    fn split_factor() -> usize
    where
        Self: Sized;
}

impl<I: RangeIndex + Send + 'static> SplittableRange for Range1d<I> {
    fn is_divisible(&self) -> bool {
        Range1d::is_divisible(self)
    }

    fn split_siblings(&mut self) -> Vec<Self> {
        vec![self.split_even(Even)]
    }

    fn split_factor() -> usize {
        2
    }
}

impl<I: RangeIndex + Send + 'static> SplittableRange for KdRange2d<I> {
    fn is_divisible(&self) -> bool {
        KdRange2d::is_divisible(self)
    }

    fn split_siblings(&mut self) -> Vec<Self> {
        self.split_result().iter().collect()
    }

    fn split_factor() -> usize {
        2
    }
}

impl<I: RangeIndex + Send + 'static> SplittableRange for KdRange3d<I> {
    fn is_divisible(&self) -> bool {
        KdRange3d::is_divisible(self)
    }

    fn split_siblings(&mut self) -> Vec<Self> {
        self.split_result().iter().collect()
    }

    fn split_factor() -> usize {
        2
    }
}

impl<I: RangeIndex + Send + 'static> SplittableRange for QuadRange<I> {
    fn is_divisible(&self) -> bool {
        QuadRange::is_divisible(self)
    }

    fn split_siblings(&mut self) -> Vec<Self> {
        self.split(Even).iter().collect()
    }

    fn split_factor() -> usize {
        4
    }
}

impl<I: RangeIndex + Send + 'static> SplittableRange for OctRange<I> {
    fn is_divisible(&self) -> bool {
        OctRange::is_divisible(self)
    }

    fn split_siblings(&mut self) -> Vec<Self> {
        self.split(Even).iter().collect()
    }

    fn split_factor() -> usize {
        8
    }
}
