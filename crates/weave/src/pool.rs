//! The worker pool and scheduler: OS threads, the park/notify wait path,
//! and the fork-join completion protocol.
//!
//! Grounded on the park/condvar notifier pattern common to per-core
//! work-stealing executors in the pack (a single `Mutex<()>` + `Condvar`
//! touched only on park/unpark, never on the hot pop/steal path) and on
//! `weave-core`'s `Deque`/`TaskAllocator` for everything else.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use weave_core::{Backoff, Bypass, SchedulerHandle, StateFlags, Task, TaskAllocator, TaskContext, TaskKind, TaskRef};

use crate::config::Config;
use crate::error::{describe_panic, SchedulerError};
use crate::trace::{NoopObserver, Observer};

thread_local! {
    /// The deque/allocator slot this thread currently executes as, if any.
    /// Set for the lifetime of an OS worker thread; set for the duration of
    /// a call to [`Scheduler::participate`] on any other thread.
    static CURRENT_SLOT: Cell<Option<u16>> = const { Cell::new(None) };
}

fn current_slot() -> Option<u16> {
    CURRENT_SLOT.with(|c| c.get())
}

fn set_current_slot(slot: Option<u16>) {
    CURRENT_SLOT.with(|c| c.set(slot));
}

/// Shared state behind every worker thread and every participating caller
/// thread. Lives behind an `Arc` so worker closures and `Scheduler` can
/// both reach it without `Scheduler` itself needing to be `Clone`.
pub(crate) struct Inner {
    deques: Vec<weave_core::Deque>,
    allocators: Vec<TaskAllocator>,
    worker_count: usize,
    total_slots: usize,
    shutdown: AtomicBool,
    park_mutex: Mutex<()>,
    park_condvar: Condvar,
    steal_retry_rounds: usize,
    participant_free: Mutex<VecDeque<u16>>,
    participant_condvar: Condvar,
    failure: Mutex<Option<Box<dyn std::any::Any + Send>>>,
    observer: Arc<dyn Observer>,
}

impl Inner {
    fn notify_one(&self) {
        let _guard = self.park_mutex.lock().unwrap();
        self.park_condvar.notify_one();
    }

    fn acquire_participant_slot(&self) -> u16 {
        let mut guard = self.participant_free.lock().unwrap();
        loop {
            if let Some(slot) = guard.pop_front() {
                return slot;
            }
            guard = self.participant_condvar.wait(guard).unwrap();
        }
    }

    fn release_participant_slot(&self, slot: u16) {
        let mut guard = self.participant_free.lock().unwrap();
        guard.push_back(slot);
        self.participant_condvar.notify_one();
    }

    fn record_failure(&self, payload: Box<dyn std::any::Any + Send>) {
        let mut guard = self.failure.lock().unwrap();
        if guard.is_none() {
            *guard = Some(payload);
        }
    }

    fn take_failure(&self) -> Option<Box<dyn std::any::Any + Send>> {
        self.failure.lock().unwrap().take()
    }

    /// Step 1-2 of the worker-loop contract: pop local bottom, else steal
    /// from every other slot in turn (including participant slots, since a
    /// waiting caller thread's deque can hold spawned children too).
    fn find_work(&self, slot: u16) -> Option<TaskRef> {
        if let Ok(task) = self.deques[slot as usize].pop_bottom() {
            return Some(task);
        }
        for i in 1..self.total_slots {
            let victim = ((slot as usize + i) % self.total_slots) as u16;
            if let Ok(task) = self.deques[victim as usize].steal_top() {
                unsafe { task.get() }.set_flag(StateFlags::STOLEN);
                self.observer.on_steal(slot, victim);
                return Some(task);
            }
        }
        None
    }

    fn enqueue_ready(&self, slot: u16, task: TaskRef) {
        unsafe { task.get() }.set_flag(StateFlags::QUEUED);
        self.deques[slot as usize].push_bottom(task);
        self.notify_one();
    }

    /// Fork-join completion: a task that set its own continuation delegates
    /// its completion signal to that continuation entirely (the spec's
    /// "T's own execution does not decrement C"), so nothing is released
    /// here for it. Otherwise the task's declared parent (already resolved
    /// to the right continuation at spawn time) is released once; if that
    /// drops it to zero, the parent is now ready and is pushed onto this
    /// worker's own deque.
    fn complete(&self, slot: u16, task: TaskRef) {
        let t = unsafe { task.get() };
        if t.continuation.is_none() {
            if let Some(parent) = t.parent {
                if unsafe { parent.get() }.release() {
                    self.enqueue_ready(slot, parent);
                }
            }
        }
        self.allocators[slot as usize].free(task);
    }

    fn run_task(&self, slot: u16, mut task: TaskRef) {
        loop {
            let t = unsafe { task.get_mut() };
            t.clear_flag(StateFlags::QUEUED);
            t.set_flag(StateFlags::EXECUTING);

            let handle: &dyn SchedulerHandle = self;
            let mut ctx = TaskContext::new(handle);
            let bypass = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| t.execute(&mut ctx))) {
                Ok(bypass) => bypass,
                Err(payload) => {
                    self.record_failure(payload);
                    Bypass::None
                }
            };

            unsafe { task.get() }.clear_flag(StateFlags::EXECUTING);
            let recycled = unsafe { task.get() }.flags().contains(StateFlags::RECYCLED);
            if recycled {
                unsafe { task.get_mut() }.clear_flag(StateFlags::RECYCLED);
            } else {
                self.complete(slot, task);
            }

            match bypass {
                Bypass::None => break,
                Bypass::Task(next) => task = next,
            }
        }
    }

    fn all_deques_empty(&self) -> bool {
        self.deques.iter().all(|d| d.approx_len() == 0)
    }

    fn park(&self, slot: u16) {
        self.observer.on_park(slot);
        let guard = self.park_mutex.lock().unwrap();
        if !self.shutdown.load(Ordering::Relaxed) && self.deques[slot as usize].approx_len() == 0 {
            let _unused = self.park_condvar.wait(guard).unwrap();
        }
        self.observer.on_wake(slot);
    }

    /// The permanent loop run by every OS worker thread.
    fn worker_main(&self, slot: u16) {
        set_current_slot(Some(slot));
        let mut backoff = Backoff::new();
        let mut empty_rounds = 0usize;

        loop {
            if let Some(task) = self.find_work(slot) {
                self.run_task(slot, task);
                backoff = Backoff::new();
                empty_rounds = 0;
                continue;
            }

            empty_rounds += 1;
            if empty_rounds < self.steal_retry_rounds {
                backoff.spin();
                continue;
            }

            if self.shutdown.load(Ordering::Relaxed) && self.all_deques_empty() {
                break;
            }
            self.park(slot);
            backoff = Backoff::new();
            empty_rounds = 0;
        }
    }

    /// Drives this thread's own deque (and steals) until `watch`'s ref
    /// count reaches zero, i.e. the awaited region has finished.
    fn drive_until_complete(&self, slot: u16, watch: TaskRef) -> Result<(), SchedulerError> {
        let mut backoff = Backoff::new();
        loop {
            if unsafe { watch.get() }.ref_count.load(Ordering::Acquire) == 0 {
                break;
            }
            if let Some(task) = self.find_work(slot) {
                self.run_task(slot, task);
                backoff = Backoff::new();
            } else {
                backoff.spin();
            }
        }
        match self.take_failure() {
            Some(payload) => Err(SchedulerError::BodyPanic(describe_panic(payload))),
            None => Ok(()),
        }
    }

    pub(crate) fn spawn_and_wait(&self, root: TaskRef) -> Result<(), SchedulerError> {
        let reentrant = current_slot().is_some();
        let slot = match current_slot() {
            Some(s) => s,
            None => self.acquire_participant_slot(),
        };
        if !reentrant {
            set_current_slot(Some(slot));
        }

        let watch = self.allocators[slot as usize].allocate(Task::empty(slot));
        unsafe { root.get_mut() }.parent = Some(watch);
        self.enqueue_ready(slot, root);

        let result = self.drive_until_complete(slot, watch);

        if !reentrant {
            set_current_slot(None);
            self.release_participant_slot(slot);
        }
        result
    }

    pub(crate) fn allocate_task<F>(&self, kind: TaskKind, body: F) -> TaskRef
    where
        F: FnMut(&mut TaskContext) -> Bypass + Send + 'static,
    {
        let slot = current_slot().expect(
            "allocate_task called outside Scheduler::participate or a running task body",
        );
        self.allocators[slot as usize].allocate(Task::new(kind, slot, body))
    }

    pub(crate) fn participate<R>(&self, f: impl FnOnce() -> R) -> R {
        if current_slot().is_some() {
            return f();
        }
        let slot = self.acquire_participant_slot();
        set_current_slot(Some(slot));
        let result = f();
        set_current_slot(None);
        self.release_participant_slot(slot);
        result
    }
}

impl SchedulerHandle for Inner {
    fn spawn(&self, task: TaskRef) {
        let slot = current_slot().expect("spawn called outside a participating context");
        self.enqueue_ready(slot, task);
        self.observer.on_spawn(slot);
    }

    fn allocate(&self, kind: TaskKind, body: Box<dyn FnMut(&mut TaskContext) -> Bypass + Send>) -> TaskRef {
        let slot = current_slot().expect("allocate called outside a participating context");
        self.allocators[slot as usize].allocate(Task::new(kind, slot, body))
    }

    fn worker_id(&self) -> u16 {
        current_slot().unwrap_or(u16::MAX)
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }
}

/// Owns the worker threads and the shared scheduler state. Dropping it (or
/// calling [`Scheduler::shutdown`] explicitly) joins every worker thread.
pub struct Scheduler {
    pub(crate) inner: Arc<Inner>,
    workers: Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl Scheduler {
    pub fn init(config: Config) -> Result<Scheduler, SchedulerError> {
        let worker_count = config.worker_count.max(1);
        let max_participants = worker_count.max(1);
        let total_slots = worker_count + max_participants;

        let allocators = TaskAllocator::new_pool(total_slots, config.initial_task_cache);
        let deques: Vec<weave_core::Deque> = (0..total_slots).map(|_| weave_core::Deque::new()).collect();
        let participant_free: VecDeque<u16> = (worker_count as u16..total_slots as u16).collect();
        let steal_retry_rounds = config.resolved_steal_retry_rounds(worker_count);
        let observer = config.observer.clone().unwrap_or_else(|| Arc::new(NoopObserver));

        if config.affinity.is_some() && !cfg!(feature = "affinity") {
            #[cfg(feature = "tracing")]
            tracing::warn!("Config::affinity set but the `affinity` feature is not enabled; ignoring");
        }

        let inner = Arc::new(Inner {
            deques,
            allocators,
            worker_count,
            total_slots,
            shutdown: AtomicBool::new(false),
            park_mutex: Mutex::new(()),
            park_condvar: Condvar::new(),
            steal_retry_rounds,
            participant_free: Mutex::new(participant_free),
            participant_condvar: Condvar::new(),
            failure: Mutex::new(None),
            observer,
        });

        let mut handles = Vec::with_capacity(worker_count);
        for w in 0..worker_count {
            let inner = Arc::clone(&inner);
            #[cfg(feature = "affinity")]
            let core_id = config.affinity.as_ref().and_then(|v| v.get(w).copied());
            let handle = thread::Builder::new()
                .name(format!("weave-worker-{w}"))
                .spawn(move || {
                    #[cfg(feature = "affinity")]
                    if let Some(core_id) = core_id {
                        if let Some(ids) = core_affinity::get_core_ids() {
                            if let Some(id) = ids.into_iter().find(|c| c.id == core_id) {
                                core_affinity::set_for_current(id);
                            }
                        }
                    }
                    inner.worker_main(w as u16);
                })
                .map_err(|e| SchedulerError::ThreadSpawn(e.to_string()))?;
            handles.push(handle);
        }

        Ok(Scheduler {
            inner,
            workers: Mutex::new(Some(handles)),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    /// The slot id of the calling thread: a worker's own id, or a
    /// participant's claimed slot. Must be called from inside
    /// [`Scheduler::participate`] or from a running task body.
    pub fn current_worker_id(&self) -> u16 {
        self.inner.worker_id()
    }

    /// Allocates a task owned by the calling slot. Must be called from
    /// inside [`Scheduler::participate`] or from a running task body.
    pub fn allocate_task<F>(&self, kind: TaskKind, body: F) -> TaskRef
    where
        F: FnMut(&mut TaskContext) -> Bypass + Send + 'static,
    {
        self.inner.allocate_task(kind, body)
    }

    /// Enqueues `task` onto the calling slot's own deque, notifying one
    /// parked worker. The task's `ref_count` must already reflect the
    /// parent's expectations (see [`weave_core::Task::add_ref`]).
    pub fn spawn(&self, task: TaskRef) {
        self.inner.spawn(task);
    }

    /// Spawns `root` and blocks the calling thread, executing and stealing
    /// tasks, until `root`'s region completes. The calling thread
    /// participates as a temporary worker (or reuses its existing slot if
    /// already participating, supporting nested parallel regions).
    pub fn spawn_and_wait(&self, root: TaskRef) -> Result<(), SchedulerError> {
        self.inner.spawn_and_wait(root)
    }

    /// Runs `f` with a claimed slot (a participant slot on a foreign
    /// thread, or the existing slot if already participating), so `f` may
    /// call [`Scheduler::allocate_task`] and [`Scheduler::spawn_and_wait`].
    pub fn participate<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.participate(f)
    }

    pub(crate) fn handle(&self) -> &dyn SchedulerHandle {
        self.inner.as_ref()
    }

    /// Signals every worker to stop once its deque drains, and joins them.
    /// Idempotent: calling it more than once (or dropping the scheduler
    /// afterward) is a no-op the second time.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        {
            let _guard = self.inner.park_mutex.lock().unwrap();
            self.inner.park_condvar.notify_all();
        }
        if let Some(handles) = self.workers.lock().unwrap().take() {
            for h in handles {
                let _ = h.join();
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
