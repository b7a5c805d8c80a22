//! A task's reference to itself, for bodies that need to know their own
//! `TaskRef` — to recycle themselves via [`weave_core::Task::recycle`] plus
//! `Bypass::Task`, or to read their own `parent` once the scheduler has
//! filled it in (true of every root task handed to
//! [`crate::Scheduler::spawn_and_wait`], whose `parent` is only set after
//! the body closure has already been built).
//!
//! A task body only ever receives a `&mut TaskContext`, not its own
//! `TaskRef`, so the handle must be threaded in by the caller: allocate
//! it empty, capture a clone in the closure, then fill it in immediately
//! after the allocating call returns the real `TaskRef` — always before
//! the task can possibly run.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use weave_core::{Task, TaskRef};

#[derive(Clone)]
pub struct SelfRef(Arc<AtomicPtr<Task>>);

impl SelfRef {
    pub fn empty() -> Self {
        SelfRef(Arc::new(AtomicPtr::new(std::ptr::null_mut())))
    }

    /// Must be called exactly once, before the referenced task can run.
    pub fn set(&self, task: TaskRef) {
        self.0.store(task.as_ptr(), Ordering::Release);
    }

    /// # Panics
    /// If called before [`Self::set`].
    pub fn get(&self) -> TaskRef {
        let ptr = self.0.load(Ordering::Acquire);
        assert!(!ptr.is_null(), "SelfRef read before it was set");
        unsafe { TaskRef::from_raw(ptr) }
    }
}
