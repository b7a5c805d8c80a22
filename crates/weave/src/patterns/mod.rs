//! The three parallel patterns built on top of [`crate::splittable::SplittableRange`]
//! and [`crate::pool::Scheduler`]: `parallel_for` and `parallel_reduce`
//! share the recursive split core in [`fork`], while `parallel_wavefront`
//! has its own dependency-grid driver in [`wavefront`].

mod fork;
mod parallel_for;
mod parallel_reduce;
mod wavefront;

pub use parallel_for::parallel_for;
pub use parallel_reduce::parallel_reduce;
pub use wavefront::{parallel_wavefront, parallel_wavefront3d};
