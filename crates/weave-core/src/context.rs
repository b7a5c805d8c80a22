//! The handle passed to every task body.
//!
//! `weave-core` does not know about `Scheduler` or `WorkerPool` — those
//! live in the facade crate, which depends on this one. To let a task
//! body spawn children and read its own worker id without a dependency
//! cycle, the facade implements [`SchedulerHandle`] and hands a
//! `TaskContext` wrapping it down into `Task::execute`.

use crate::payload::Bypass;
use crate::task::TaskKind;
use crate::TaskRef;

/// The seam between `weave-core`'s task execution and the facade's
/// scheduler. A task body only ever needs to spawn a task and learn which
/// worker it is running on; everything else (stealing, parking, the
/// allocator) is internal to the worker loop.
pub trait SchedulerHandle {
    /// Enqueues `task` onto the calling worker's own deque.
    fn spawn(&self, task: TaskRef);

    /// Allocates a new task owned by the calling worker's slot, for a
    /// pattern body that needs to fork children from inside its own
    /// execution (it only has a `TaskContext`, not the facade's
    /// `Scheduler`, to allocate from).
    fn allocate(&self, kind: TaskKind, body: Box<dyn FnMut(&mut crate::TaskContext) -> Bypass + Send>) -> TaskRef;

    /// The id of the worker currently executing this context.
    fn worker_id(&self) -> u16;

    /// The total number of workers in the pool, used by partitioners to
    /// size their initial split budget.
    fn worker_count(&self) -> usize;
}

/// Passed by mutable reference to every task body.
pub struct TaskContext<'a> {
    handle: &'a dyn SchedulerHandle,
}

impl<'a> TaskContext<'a> {
    pub fn new(handle: &'a dyn SchedulerHandle) -> Self {
        TaskContext { handle }
    }

    pub fn worker_id(&self) -> u16 {
        self.handle.worker_id()
    }

    pub fn worker_count(&self) -> usize {
        self.handle.worker_count()
    }

    pub fn spawn(&self, task: TaskRef) {
        self.handle.spawn(task);
    }

    pub fn allocate(&self, kind: TaskKind, body: Box<dyn FnMut(&mut TaskContext) -> Bypass + Send>) -> TaskRef {
        self.handle.allocate(kind, body)
    }
}
