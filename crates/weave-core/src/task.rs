//! The task object: reference-counted header, back-references to parent
//! and continuation, and an inline payload.
//!
//! Tasks never own their parent or continuation — those are raw,
//! non-owning [`TaskRef`]s into a worker's slab, exactly as the design
//! notes mandate to avoid cyclic drop ordering. The sum-type `TaskKind`
//! stands in for the source's virtual `execute`: the worker loop only
//! ever needs `(fn, data)`, never dynamic dispatch through a base class.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::payload::{Bypass, Payload};

/// A non-owning reference to a task living in some worker's allocator
/// slab. Never participates in drop ordering; the allocator alone decides
/// when the pointee is freed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskRef(pub(crate) *mut Task);

// SAFETY: TaskRef is just an address; the task graph's synchronization is
// carried by the atomic ref_count and state_flags fields of the pointee.
unsafe impl Send for TaskRef {}
unsafe impl Sync for TaskRef {}

impl TaskRef {
    /// # Safety
    /// `ptr` must point to a live `Task` for the duration any derived
    /// reference is used.
    pub unsafe fn from_raw(ptr: *mut Task) -> Self {
        TaskRef(ptr)
    }

    pub fn as_ptr(self) -> *mut Task {
        self.0
    }

    /// # Safety
    /// The pointee must be live and not concurrently mutated in a way
    /// that violates Rust's aliasing rules for the duration of the borrow.
    #[allow(clippy::should_implement_trait)]
    pub unsafe fn get(self) -> &'static Task {
        unsafe { &*self.0 }
    }

    /// # Safety
    /// Caller must have exclusive access to the pointee (only the owning
    /// worker, while the task is not stealable, may call this).
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(self) -> &'static mut Task {
        unsafe { &mut *self.0 }
    }
}

/// Minimal bitflags reimplementation: the crate pulls in no dependency for
/// a five-bit set, matching the "avoid dependency for tiny stdlib-shaped
/// surfaces" texture of the wider corpus.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            pub const fn union(self, other: Self) -> Self {
                $name(self.0 | other.0)
            }

            pub const fn difference(self, other: Self) -> Self {
                $name(self.0 & !other.0)
            }
        }
    };
}

bitflags_like! {
    /// `state_flags`: small bitset tracked on the task header.
    pub struct StateFlags: u8 {
        const ALLOCATED = 0b0000_0001;
        const QUEUED    = 0b0000_0010;
        const EXECUTING = 0b0000_0100;
        const RECYCLED  = 0b0000_1000;
        const STOLEN    = 0b0001_0000;
    }
}

/// What kind of payload a task carries; replaces the source's virtual
/// `execute()` dispatch with a closed sum type.
pub enum TaskKind {
    /// A range-decomposition task driven by a partitioner.
    Range,
    /// A join point: becomes ready when its ref_count reaches 0.
    Continuation,
    /// A placeholder task with no body (used as a throwaway continuation
    /// root in tests and as the sentinel returned by `Bypass::None`).
    Empty,
    /// A user-spawned task with an arbitrary body.
    User,
}

/// The task header: reference count, back-references, state, and an
/// inlined-or-heap payload.
pub struct Task {
    pub ref_count: AtomicU32,
    pub parent: Option<TaskRef>,
    pub continuation: Option<TaskRef>,
    state_flags: AtomicU8,
    pub owner_worker_id: u16,
    pub kind: TaskKind,
    payload: Option<Payload>,
}

impl Task {
    pub fn new<F>(kind: TaskKind, owner_worker_id: u16, body: F) -> Self
    where
        F: FnMut(&mut crate::TaskContext) -> Bypass + Send + 'static,
    {
        Task {
            ref_count: AtomicU32::new(1),
            parent: None,
            continuation: None,
            state_flags: AtomicU8::new(StateFlags::ALLOCATED.0),
            owner_worker_id,
            kind,
            payload: Some(Payload::new(body)),
        }
    }

    /// An empty task with no body, used as a bare continuation join
    /// point whose only purpose is to hold a ref_count.
    pub fn empty(owner_worker_id: u16) -> Self {
        Task {
            ref_count: AtomicU32::new(1),
            parent: None,
            continuation: None,
            state_flags: AtomicU8::new(StateFlags::ALLOCATED.0),
            owner_worker_id,
            kind: TaskKind::Empty,
            payload: None,
        }
    }

    pub fn flags(&self) -> StateFlags {
        StateFlags(self.state_flags.load(Ordering::Acquire))
    }

    pub fn set_flag(&self, flag: StateFlags) {
        self.state_flags.fetch_or(flag.0, Ordering::AcqRel);
    }

    pub fn clear_flag(&self, flag: StateFlags) {
        self.state_flags.fetch_and(!flag.0, Ordering::AcqRel);
    }

    /// `add_ref(n)` before the task has been spawned: relaxed ordering is
    /// sufficient because the parent thread that calls this is the same
    /// thread that will subsequently publish the task via `spawn`, which
    /// carries its own release semantics.
    pub fn add_ref(&self, n: u32) {
        self.ref_count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrements the ref count on completion. Returns `true` exactly
    /// once, on the thread that observes the `1 -> 0` transition — that
    /// thread is responsible for enqueueing the parent/continuation.
    pub fn release(&self) -> bool {
        self.ref_count.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Marks the current task as reusable; the scheduler will not free it
    /// on body return. Caller must re-initialize the payload before the
    /// task is re-spawned or returned as a bypass task.
    pub fn recycle<F>(&mut self, body: F)
    where
        F: FnMut(&mut crate::TaskContext) -> Bypass + Send + 'static,
    {
        debug_assert!(
            !self.flags().contains(StateFlags::QUEUED),
            "recycling a task that is still enqueued"
        );
        self.set_flag(StateFlags::RECYCLED);
        self.ref_count.store(1, Ordering::Relaxed);
        match &mut self.payload {
            Some(p) => p.reinit(body),
            None => self.payload = Some(Payload::new(body)),
        }
    }

    /// Runs the task's body. Panics propagate to the caller (the worker
    /// loop), which is responsible for releasing the ref count regardless
    /// of outcome (see the worker's catch_unwind boundary).
    pub fn execute(&mut self, ctx: &mut crate::TaskContext) -> Bypass {
        match &mut self.payload {
            Some(p) => p.call(ctx),
            None => Bypass::None,
        }
    }

    /// Sets a continuation on this task. Subsequent children of this task
    /// are reparented to `continuation` rather than to this task itself;
    /// this task's own completion does not decrement `continuation`.
    pub fn set_continuation(&mut self, continuation: TaskRef) {
        self.continuation = Some(continuation);
    }

    /// The task that should be decremented when a child of this task
    /// completes: the continuation if one was set, otherwise this task.
    pub fn reparent_target(this: TaskRef) -> TaskRef {
        let has_continuation = unsafe { this.get() }.continuation;
        has_continuation.unwrap_or(this)
    }
}
