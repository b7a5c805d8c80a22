//! Per-worker task allocator.
//!
//! Allocation is worker-local and lock-free on the hot path: each worker
//! owns a free-list of boxed `Task` slots. When a task is freed from a
//! different worker than the one that allocated it (stolen work whose
//! last child finished elsewhere), it cannot go back onto that owner's
//! single-threaded free-list directly; instead it is pushed onto a
//! thread-safe "return bin" (an atomic Treiber stack) that the owner
//! drains lazily the next time its own free-list runs dry. This keeps the
//! allocate/free path on a worker's own tasks entirely free of atomics.

use std::cell::RefCell;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::{Task, TaskRef};

/// Intrusive Treiber-stack node used by the cross-worker return bin. The
/// `Task` itself stores the next-free link so no extra allocation is
/// needed to return a task to its owner.
struct ReturnNode {
    next: AtomicPtr<ReturnNode>,
    task: *mut Task,
}

/// The lock-free bin that non-owner workers push freed tasks onto.
/// Cache-padded because every worker's allocator holds one and they are
/// commonly adjacent in a `Vec<TaskAllocator>`.
struct ReturnBin {
    head: CachePadded<AtomicPtr<ReturnNode>>,
}

impl ReturnBin {
    fn new() -> Self {
        ReturnBin {
            head: CachePadded::new(AtomicPtr::new(std::ptr::null_mut())),
        }
    }

    fn push(&self, task: *mut Task) {
        let node = Box::into_raw(Box::new(ReturnNode {
            next: AtomicPtr::new(std::ptr::null_mut()),
            task,
        }));
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            unsafe { (*node).next.store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
    }

    /// Drains every task currently in the bin, owner-only (no concurrent
    /// drainers for a given bin).
    fn drain(&self) -> Vec<*mut Task> {
        let mut head = self.head.swap(std::ptr::null_mut(), Ordering::Acquire);
        let mut out = Vec::new();
        while !head.is_null() {
            let node = unsafe { Box::from_raw(head) };
            out.push(node.task);
            head = node.next.load(Ordering::Relaxed);
        }
        out
    }
}

/// One worker's task allocator: a local free-list plus a handle to its
/// own return bin (shared with every other worker, who push into it) and
/// handles to every other worker's bin (so this worker can push tasks it
/// frees that were allocated elsewhere).
pub struct TaskAllocator {
    worker_id: u16,
    free_list: RefCell<Vec<Box<Task>>>,
    own_bin: Arc<ReturnBin>,
    all_bins: Vec<Arc<ReturnBin>>,
}

impl TaskAllocator {
    /// Builds one allocator per worker, wiring each to every other
    /// worker's return bin. `prewarm` matches `initial_task_cache`: the
    /// number of empty task slots to pre-box at startup per worker.
    pub fn new_pool(worker_count: usize, prewarm: usize) -> Vec<TaskAllocator> {
        let bins: Vec<Arc<ReturnBin>> = (0..worker_count).map(|_| Arc::new(ReturnBin::new())).collect();
        (0..worker_count)
            .map(|id| {
                let free_list = (0..prewarm)
                    .map(|_| Box::new(Task::empty(id as u16)))
                    .collect();
                TaskAllocator {
                    worker_id: id as u16,
                    free_list: RefCell::new(free_list),
                    own_bin: Arc::clone(&bins[id]),
                    all_bins: bins.clone(),
                }
            })
            .collect()
    }

    fn refill_from_bin(&self) {
        let mut list = self.free_list.borrow_mut();
        for raw in self.own_bin.drain() {
            // SAFETY: these pointers were produced by `Box::into_raw` in
            // `free` and never touched again until this drain.
            let task = unsafe { Box::from_raw(raw) };
            list.push(task);
        }
    }

    /// Allocates a task, preferring the local free-list, falling back to
    /// the owner's cross-worker return bin, and finally to a fresh heap
    /// allocation.
    pub fn allocate(&self, task: Task) -> TaskRef {
        let mut list = self.free_list.borrow_mut();
        if list.is_empty() {
            drop(list);
            self.refill_from_bin();
            list = self.free_list.borrow_mut();
        }

        let mut boxed = match list.pop() {
            Some(b) => b,
            None => {
                tracing::trace!(worker_id = self.worker_id, "task allocator heap fallback");
                Box::new(Task::empty(self.worker_id))
            }
        };
        *boxed = task;
        let ptr = Box::into_raw(boxed);
        unsafe { TaskRef::from_raw(ptr) }
    }

    /// Frees `task`, routing it to the owner's free-list if this worker
    /// *is* the owner, or onto the owner's return bin otherwise.
    pub fn free(&self, task: TaskRef) {
        let ptr = task.as_ptr();
        let owner_id = unsafe { &*ptr }.owner_worker_id;
        if owner_id == self.worker_id {
            let boxed = unsafe { Box::from_raw(ptr) };
            self.free_list.borrow_mut().push(boxed);
        } else {
            self.all_bins[owner_id as usize].push(ptr);
        }
    }
}
