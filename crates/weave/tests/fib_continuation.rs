//! Manual fork-join fibonacci, built directly on `weave-core`'s raw task
//! API rather than any of the `weave::patterns` functions: each task
//! computes one fib(n) call, spawns a child for fib(n - 1), and recycles
//! *itself* in place to become fib(n - 2), joined by a single continuation
//! task per call. This is the classic TBB-style "recycle as the right
//! child, spawn the left" continuation-passing fibonacci, exercising
//! `Task::recycle` and `Bypass::Task` directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use weave::{Bypass, Config, Scheduler, TaskContext, TaskKind, TaskRef};

type Slot = Arc<Mutex<Option<u64>>>;

fn empty_slot() -> Slot {
    Arc::new(Mutex::new(None))
}

fn take_slot(slot: &Slot) -> u64 {
    slot.lock().unwrap().take().expect("fib slot read before its producer ran")
}

/// Lets a task body, which only ever sees `&mut TaskContext`, learn its
/// own `TaskRef` once the scheduler has allocated it — the same need
/// `weave`'s internal pattern bodies have, solved here with a plain
/// `Mutex` instead of reaching into the crate's private `self_ref` module.
#[derive(Clone)]
struct SelfRef(Arc<Mutex<Option<TaskRef>>>);

impl SelfRef {
    fn empty() -> Self {
        SelfRef(Arc::new(Mutex::new(None)))
    }

    fn set(&self, task: TaskRef) {
        *self.0.lock().unwrap() = Some(task);
    }

    fn get(&self) -> TaskRef {
        self.0.lock().unwrap().expect("self ref read before the task was allocated")
    }
}

fn fib_body(ctx: &mut TaskContext, self_task: TaskRef, n: u64, out: Slot, allocations: &Arc<AtomicUsize>) -> Bypass {
    if n < 2 {
        *out.lock().unwrap() = Some(n);
        return Bypass::None;
    }

    let slot_l = empty_slot();
    let slot_r = empty_slot();
    let outer_parent = unsafe { self_task.get() }.parent.expect("fib task always has a parent");

    let continuation = {
        let slot_l = slot_l.clone();
        let slot_r = slot_r.clone();
        let out = out.clone();
        ctx.allocate(
            TaskKind::Continuation,
            Box::new(move |_ctx: &mut TaskContext| {
                let l = take_slot(&slot_l);
                let r = take_slot(&slot_r);
                *out.lock().unwrap() = Some(l + r);
                Bypass::None
            }),
        )
    };
    unsafe { continuation.get_mut() }.parent = Some(outer_parent);
    unsafe { continuation.get() }.add_ref(1);

    // Spawn fib(n - 1) as a genuine child, parented to the continuation.
    let child_self = SelfRef::empty();
    let child_self_for_body = child_self.clone();
    let allocations_for_child = Arc::clone(allocations);
    allocations.fetch_add(1, Ordering::Relaxed);
    let child = ctx.allocate(
        TaskKind::User,
        Box::new(move |ctx: &mut TaskContext| {
            fib_body(ctx, child_self_for_body.get(), n - 1, slot_l.clone(), &allocations_for_child)
        }),
    );
    child_self.set(child);
    unsafe { child.get_mut() }.parent = Some(continuation);
    ctx.spawn(child);

    // Recycle this very task into fib(n - 2), writing into slot_r.
    let self_ref_for_recycle = SelfRef::empty();
    self_ref_for_recycle.set(self_task);
    unsafe { self_task.get_mut() }.parent = Some(continuation);
    let n2 = n - 2;
    let allocations_for_recycle = Arc::clone(allocations);
    unsafe {
        self_task.get_mut().recycle(move |ctx: &mut TaskContext| {
            fib_body(ctx, self_ref_for_recycle.get(), n2, slot_r.clone(), &allocations_for_recycle)
        });
    }
    Bypass::Task(self_task)
}

#[test]
fn fib_20_via_recycle_and_continuation() {
    let scheduler = Scheduler::init(Config::default().worker_count(4)).expect("scheduler init");
    let allocations = Arc::new(AtomicUsize::new(1));

    let result = scheduler.participate(|| {
        let out = empty_slot();
        let self_ref = SelfRef::empty();
        let self_ref_for_body = self_ref.clone();
        let out_for_body = out.clone();
        let allocations_for_root = Arc::clone(&allocations);

        let root = scheduler.allocate_task(TaskKind::User, move |ctx: &mut TaskContext| {
            fib_body(ctx, self_ref_for_body.get(), 20, out_for_body.clone(), &allocations_for_root)
        });
        self_ref.set(root);

        scheduler.spawn_and_wait(root).expect("fib region completes without panicking");
        take_slot(&out)
    });

    assert_eq!(result, 6765);
    // A new task is allocated only for the spawned left child of a split;
    // the right child reuses the splitting task's own object via recycle.
    // So the count is the root plus one per internal node of the fib(20)
    // call tree (10945 internal nodes for n=20), not one per call.
    assert_eq!(allocations.load(Ordering::Relaxed), 10946);

    scheduler.shutdown();
}
