//!
//! weave - Task-parallel micro-scheduler for shared-memory multicore machines
//!
//! A small fork-join scheduler in the TBB/GTS family: OS worker threads
//! each own a Chase-Lev work-stealing deque, ranges over 1-, 2-, 3-
//! dimensional index spaces recursively split themselves into leaf-sized
//! pieces, and three patterns (`parallel_for`, `parallel_reduce`,
//! `parallel_wavefront`) drive that split against a worker-pool-sized
//! partitioning budget. `weave-core` supplies the hot-path primitives
//! (deque, task header, allocator); `weave-ranges` supplies the range and
//! splitter types; this crate wires both into a runnable pool.
//!

pub mod config;
pub mod error;
pub mod partitioner;
pub mod patterns;
pub mod pool;
mod self_ref;
pub mod splittable;
pub mod trace;

pub use config::Config;
pub use error::SchedulerError;
pub use partitioner::Partitioner;
pub use patterns::{parallel_for, parallel_reduce, parallel_wavefront, parallel_wavefront3d};
pub use pool::Scheduler;
pub use splittable::SplittableRange;
pub use trace::Observer;

pub use weave_core::{Bypass, StateFlags, Task, TaskContext, TaskKind, TaskRef};
pub use weave_ranges::{
    Even, KdRange2d, KdRange3d, OctRange, Proportional, QuadRange, Range1d, RangeIndex,
};
