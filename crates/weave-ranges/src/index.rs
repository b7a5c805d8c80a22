//! The integer family usable as a range bound.
//!
//! Ranges are generic over this trait rather than hard-coded to `usize`
//! so callers can iterate pointer offsets, signed grid coordinates, or
//! plain indices with the same splitting machinery, the way the source's
//! templated ranges are generic over an iterator type.

use std::fmt::Debug;

pub trait RangeIndex: Copy + Ord + Debug + Send + Sync + 'static {
    fn distance(begin: Self, end: Self) -> usize;
    fn advance(self, delta: usize) -> Self;
    fn retreat(self, delta: usize) -> Self;
    fn as_usize(self) -> usize;
    fn from_usize(v: usize) -> Self;
}

macro_rules! impl_range_index {
    ($($t:ty),*) => {
        $(
            impl RangeIndex for $t {
                fn distance(begin: Self, end: Self) -> usize {
                    (end - begin) as usize
                }
                fn advance(self, delta: usize) -> Self {
                    self + delta as $t
                }
                fn retreat(self, delta: usize) -> Self {
                    self - delta as $t
                }
                fn as_usize(self) -> usize {
                    self as usize
                }
                fn from_usize(v: usize) -> Self {
                    v as $t
                }
            }
        )*
    };
}

impl_range_index!(usize, u32, u64, i32, i64, isize);
