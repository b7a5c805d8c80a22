//! Iteration ranges and splitting policies for the parallel patterns:
//! 1-D ranges that bisect or split proportionally, 2-D/3-D Kd-tree
//! ranges that always split the relatively largest dimension, and
//! quad/oct ranges that bisect every divisible dimension at once.

mod index;
mod kd_range2d;
mod kd_range3d;
mod oct_range;
mod quad_range;
mod range1d;
mod splitters;

pub use index::RangeIndex;
pub use kd_range2d::KdRange2d;
pub use kd_range3d::KdRange3d;
pub use oct_range::OctRange;
pub use quad_range::QuadRange;
pub use range1d::Range1d;
pub use splitters::{Even, Proportional, SplitResult};
