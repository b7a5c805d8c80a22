//! Atomic-type compatibility shim.
//!
//! When built with the `loom` feature, re-exports loom's deterministic
//! atomics so the deque and ref-count logic can be model-checked under
//! loom's scheduler. Otherwise re-exports `std::sync::atomic` directly.
//! This lets every other module in the crate write `use crate::sync::*`
//! once and never special-case `cfg(loom)` again.

#[cfg(feature = "loom")]
pub use loom::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicU8, Ordering};
#[cfg(feature = "loom")]
pub use loom::sync::Arc;

#[cfg(not(feature = "loom"))]
pub use std::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicU8, Ordering};
#[cfg(not(feature = "loom"))]
pub use std::sync::Arc;
