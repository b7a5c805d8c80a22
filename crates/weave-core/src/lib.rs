//!
//! weave-core - Task objects, allocator, and work-stealing deque
//!
//! The hot-path primitives of the weave micro-scheduler: the Chase-Lev
//! per-worker deque, the reference-counted task header with its
//! inline-or-heap payload, and the per-worker task allocator. Everything
//! here is built to be called from a worker loop that lives in the
//! `weave` facade crate; this crate knows nothing about threads, parking,
//! or the scheduler itself.
//!

pub mod allocator;
pub mod context;
pub mod deque;
pub mod payload;
mod pause;
mod sync;
pub mod task;

pub use allocator::TaskAllocator;
pub use context::{SchedulerHandle, TaskContext};
pub use deque::{Deque, Empty};
pub use pause::Backoff;
pub use payload::{Bypass, INLINE_CAPACITY};
pub use task::{StateFlags, Task, TaskKind, TaskRef};
