//! A 3-D iteration range that splits along whichever dimension is
//! relatively largest, producing a Kd-tree of leaf sub-ranges. Generalizes
//! [`crate::KdRange2d`] to three axes, including the wavefront neighbor
//! queries along Z (the source stubs 3-D wavefront; this spec implements
//! the full three-neighbor protocol).

use crate::index::RangeIndex;
use crate::range1d::Range1d;
use crate::splitters::{Even, SplitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitAxis {
    None,
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy)]
pub struct KdRange3d<I: RangeIndex> {
    x: Range1d<I>,
    y: Range1d<I>,
    z: Range1d<I>,
    was_split_on: SplitAxis,
}

impl<I: RangeIndex> KdRange3d<I> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x_begin: I,
        x_end: I,
        x_min_size: usize,
        y_begin: I,
        y_end: I,
        y_min_size: usize,
        z_begin: I,
        z_end: I,
        z_min_size: usize,
    ) -> Self {
        KdRange3d {
            x: Range1d::new(x_begin, x_end, x_min_size, 1),
            y: Range1d::new(y_begin, y_end, y_min_size, 1),
            z: Range1d::new(z_begin, z_end, z_min_size, 1),
            was_split_on: SplitAxis::None,
        }
    }

    pub fn x_range(&self) -> &Range1d<I> {
        &self.x
    }
    pub fn y_range(&self) -> &Range1d<I> {
        &self.y
    }
    pub fn z_range(&self) -> &Range1d<I> {
        &self.z
    }

    pub fn size(&self) -> usize {
        self.x.size() * self.y.size() * self.z.size()
    }

    pub fn empty(&self) -> bool {
        self.x.empty() || self.y.empty() || self.z.empty()
    }

    pub fn is_divisible(&self) -> bool {
        self.x.is_divisible() || self.y.is_divisible() || self.z.is_divisible()
    }

    /// Picks the axis with the largest size-to-min_size ratio, ties
    /// broken toward X, then Y, then Z, by only ever replacing the
    /// current winner on a strict improvement.
    fn best_split_axis(&self) -> SplitAxis {
        let mut best = SplitAxis::X;
        let mut best_size = self.x.size();
        let mut best_min = self.x.min_size();

        if self.y.size() * best_min > best_size * self.y.min_size() {
            best = SplitAxis::Y;
            best_size = self.y.size();
            best_min = self.y.min_size();
        }
        if self.z.size() * best_min > best_size * self.z.min_size() {
            best = SplitAxis::Z;
        }
        best
    }

    /// Splits along the winning axis (only it need be divisible; ties and
    /// non-divisible candidates are skipped by falling back to the next
    /// divisible axis in X, Y, Z order).
    ///
    /// # Panics
    /// If `!self.is_divisible()`.
    pub fn split(&mut self, _splitter: Even) -> Self {
        assert!(self.is_divisible(), "split on a non-divisible KdRange3d");

        let mut axis = self.best_split_axis();
        // The chosen axis may itself have bottomed out even though the
        // range overall is still divisible; fall back in ratio order.
        let divisible = |a: SplitAxis, s: &Self| match a {
            SplitAxis::X => s.x.is_divisible(),
            SplitAxis::Y => s.y.is_divisible(),
            SplitAxis::Z => s.z.is_divisible(),
            SplitAxis::None => false,
        };
        if !divisible(axis, self) {
            axis = [SplitAxis::X, SplitAxis::Y, SplitAxis::Z]
                .into_iter()
                .find(|a| divisible(*a, self))
                .expect("is_divisible() implies some axis is divisible");
        }

        let mut right = *self;
        match axis {
            SplitAxis::X => {
                right.x = self.x.split_even(Even);
                right.was_split_on = SplitAxis::X;
            }
            SplitAxis::Y => {
                right.y = self.y.split_even(Even);
                right.was_split_on = SplitAxis::Y;
            }
            SplitAxis::Z => {
                right.z = self.z.split_even(Even);
                right.was_split_on = SplitAxis::Z;
            }
            SplitAxis::None => unreachable!(),
        }
        right
    }

    pub fn x_neighbor(&self) -> Self {
        self.neighbor_along(SplitAxis::X)
    }
    pub fn y_neighbor(&self) -> Self {
        self.neighbor_along(SplitAxis::Y)
    }
    pub fn z_neighbor(&self) -> Self {
        self.neighbor_along(SplitAxis::Z)
    }

    fn neighbor_along(&self, dir: SplitAxis) -> Self {
        let mut neighbor = *self;

        let advance_axis = |r: &Range1d<I>| -> Range1d<I> {
            let size = r.size();
            let mut out = Range1d::new(
                r.end(),
                clamp_end(r.end().advance(size), r.initial_size(), r.origin()),
                r.min_size(),
                1,
            );
            out.reset_initial_size(r.initial_size());
            out
        };
        let double_axis = |r: &Range1d<I>| -> Range1d<I> {
            let size = r.size();
            let doubled_end = clamp_end(r.end().advance(size * 2), r.initial_size(), r.origin());
            let mut out = Range1d::new(r.begin(), doubled_end, r.min_size(), 1);
            out.reset_initial_size(r.initial_size());
            out
        };

        match dir {
            SplitAxis::X => {
                neighbor.x = advance_axis(&self.x);
                if self.was_split_on == SplitAxis::Y {
                    neighbor.y = double_axis(&self.y);
                } else if self.was_split_on == SplitAxis::Z {
                    neighbor.z = double_axis(&self.z);
                }
            }
            SplitAxis::Y => {
                neighbor.y = advance_axis(&self.y);
                if self.was_split_on == SplitAxis::X {
                    neighbor.x = double_axis(&self.x);
                } else if self.was_split_on == SplitAxis::Z {
                    neighbor.z = double_axis(&self.z);
                }
            }
            SplitAxis::Z => {
                neighbor.z = advance_axis(&self.z);
                if self.was_split_on == SplitAxis::X {
                    neighbor.x = double_axis(&self.x);
                } else if self.was_split_on == SplitAxis::Y {
                    neighbor.y = double_axis(&self.y);
                }
            }
            SplitAxis::None => unreachable!(),
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
    fn tiles_exactly_with_no_gaps_or_overlaps() {
        let root = KdRange3d::<usize>::new(0, 12, 1, 0, 9, 1, 0, 7, 1);
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
        assert_eq!(total, 12 * 9 * 7);
    }

    #[test]
    fn corrected_size_and_empty_semantics() {
        let r = KdRange3d::<usize>::new(0, 4, 1, 0, 0, 1, 0, 3, 1);
        assert!(r.empty());
        assert_eq!(r.size(), 0);

        let r2 = KdRange3d::<usize>::new(0, 4, 1, 0, 5, 1, 0, 2, 1);
        assert!(!r2.empty());
        assert_eq!(r2.size(), 40);
    }
}
