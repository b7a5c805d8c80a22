//! `parallel_reduce`: splits a range down to leaf pieces, maps each piece
//! to a partial value, and folds partials back up through a tree of
//! continuation tasks with an associative `combine`.
//!
//! Unlike [`crate::patterns::fork::fork`] (used by `parallel_for`, which has
//! no result to thread back and so can keep its kept piece in place on the
//! same call stack), a splitting node here is a pure dispatcher: the kept
//! piece is spawned as a real child task exactly like every sibling,
//! because each one's partial result has to survive until a continuation is
//! ready to combine it, and nothing survives a plain in-place recursion
//! once its task body returns. A split node allocates one continuation task
//! per split, seeds its `ref_count` to the number of children it is
//! waiting on, and gives each child a dedicated result slot; the
//! continuation combines those slots once every child has dropped its
//! reference, in the fixed left-to-right order [kept piece, sibling 0,
//! sibling 1, ...] the split produced them in. The continuation then writes
//! its own combined value into the slot its own spawning node was given,
//! repeating the same protocol one level up — the spec's join(L, R)
//! pattern, generalized from two children to however many a split produces.
//!
//! Critically, the node that decides to split must call
//! [`weave_core::Task::set_continuation`] on *itself* before it returns:
//! a dispatcher's own natural completion would otherwise release its old
//! parent immediately, racing ahead of the combine its own continuation
//! hasn't run yet. Every node therefore needs to know its own `TaskRef`
//! while it is running — threaded in the same way `patterns::fork`'s root
//! does, via [`crate::self_ref::SelfRef`], just at every node instead of
//! only the root.

use std::sync::{Arc, Mutex};

use weave_core::{Bypass, TaskContext, TaskKind, TaskRef};

use crate::error::SchedulerError;
use crate::partitioner::Partitioner;
use crate::self_ref::SelfRef;
use crate::splittable::SplittableRange;
use crate::Scheduler;

type Slot<T> = Arc<Mutex<Option<T>>>;

fn empty_slot<T>() -> Slot<T> {
    Arc::new(Mutex::new(None))
}

fn take_slot<T>(slot: &Slot<T>) -> T {
    slot.lock()
        .unwrap()
        .take()
        .expect("reduce slot filled before its continuation ran")
}

#[allow(clippy::too_many_arguments)]
fn reduce_fork<R, T, Map, Combine>(
    ctx: &mut TaskContext,
    self_task: TaskRef,
    mut range: R,
    depth: u16,
    partitioner: Partitioner,
    owner_slot: u16,
    out: Slot<T>,
    map: &Arc<Map>,
    combine: &Arc<Combine>,
) where
    R: SplittableRange,
    T: Send + 'static,
    Map: Fn(R) -> T + Send + Sync + 'static,
    Combine: Fn(T, T) -> T + Send + Sync + 'static,
{
    let stolen = ctx.worker_id() != owner_slot;
    let depth = partitioner.step_depth(depth, stolen, ctx.worker_count(), R::split_factor());

    if !partitioner.should_split(depth, range.is_divisible()) {
        *out.lock().unwrap() = Some((map)(range));
        return;
    }

    let siblings = range.split_siblings();
    let slots: Vec<Slot<T>> = (0..siblings.len() + 1).map(|_| empty_slot()).collect();
    let outer_parent = unsafe { self_task.get() }.parent;

    let continuation = {
        let slots = slots.clone();
        let combine = Arc::clone(combine);
        let out = out.clone();
        ctx.allocate(
            TaskKind::Continuation,
            Box::new(move |_ctx: &mut TaskContext| {
                let mut iter = slots.iter();
                let mut acc = take_slot(iter.next().expect("split always produces a kept piece"));
                for slot in iter {
                    acc = (combine)(acc, take_slot(slot));
                }
                *out.lock().unwrap() = Some(acc);
                Bypass::None
            }),
        )
    };
    unsafe { continuation.get_mut() }.parent = outer_parent;
    unsafe { continuation.get() }.add_ref(slots.len() as u32 - 1);
    unsafe { self_task.get_mut() }.set_continuation(continuation);

    let pieces = std::iter::once(range).chain(siblings);
    for (piece, slot) in pieces.zip(slots.into_iter()) {
        let map = Arc::clone(map);
        let combine = Arc::clone(combine);
        let owner_slot_for_child = ctx.worker_id();
        let self_ref = SelfRef::empty();
        let self_ref_for_child = self_ref.clone();

        let child = ctx.allocate(
            TaskKind::Range,
            Box::new(move |ctx: &mut TaskContext| {
                let child_self = self_ref_for_child.get();
                reduce_fork(ctx, child_self, piece, depth, partitioner, owner_slot_for_child, slot.clone(), &map, &combine);
                Bypass::None
            }),
        );
        self_ref.set(child);
        unsafe { child.get_mut() }.parent = Some(continuation);
        ctx.spawn(child);
    }
}

/// Maps each leaf range through `map`, folding every result into `init` via
/// `combine`. Blocks the caller until the whole range has been reduced,
/// returning the final accumulated value. `combine` must be associative; it
/// need not be commutative, since partials are always combined in the
/// left-to-right order their ranges were split in, and `init` is folded in
/// once at the very end rather than broadcast to every leaf.
pub fn parallel_reduce<R, T, Map, Combine>(
    scheduler: &Scheduler,
    range: R,
    partitioner: Partitioner,
    init: T,
    map: Map,
    combine: Combine,
) -> Result<T, SchedulerError>
where
    R: SplittableRange,
    T: Send + 'static,
    Map: Fn(R) -> T + Send + Sync + 'static,
    Combine: Fn(T, T) -> T + Send + Sync + 'static,
{
    scheduler.participate(|| {
        let map = Arc::new(map);
        let combine = Arc::new(combine);
        let out: Slot<T> = empty_slot();
        let depth = partitioner.initial_depth(scheduler.worker_count(), R::split_factor());
        let created_slot = scheduler.current_worker_id();
        let self_ref = SelfRef::empty();
        let self_ref_for_body = self_ref.clone();
        let out_for_body = out.clone();

        let root = scheduler.allocate_task(TaskKind::Range, move |ctx: &mut TaskContext| {
            let self_task = self_ref_for_body.get();
            reduce_fork(ctx, self_task, range, depth, partitioner, created_slot, out_for_body.clone(), &map, &combine);
            Bypass::None
        });
        self_ref.set(root);

        scheduler.spawn_and_wait(root)?;
        Ok(combine(init, take_slot(&out)))
    })
}
