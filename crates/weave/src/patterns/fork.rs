//! Shared recursive fork-join core for [`crate::patterns::parallel_for`]
//! and [`crate::patterns::parallel_reduce`].
//!
//! A range task splits by spawning one new task per sibling produced and
//! recursing *in place* for the piece it keeps — the local continuation
//! needs no task object of its own, since the same worker is already
//! sitting on the call stack to run it. Only the spawned siblings need a
//! `parent` bumped ahead of time; the recursing task's own eventual
//! completion is exactly the one unit already accounted for when it (or
//! whatever spawned it) was itself bumped in.

use std::sync::Arc;

use weave_core::{Bypass, TaskContext, TaskKind, TaskRef};

use crate::partitioner::Partitioner;
use crate::splittable::SplittableRange;

pub(crate) fn fork<R, Leaf>(
    ctx: &mut TaskContext,
    mut range: R,
    depth: u16,
    partitioner: Partitioner,
    owner_slot: u16,
    parent: TaskRef,
    leaf: &Arc<Leaf>,
) where
    R: SplittableRange,
    Leaf: Fn(R) + Send + Sync + 'static,
{
    let stolen = ctx.worker_id() != owner_slot;
    let depth = partitioner.step_depth(depth, stolen, ctx.worker_count(), R::split_factor());

    if partitioner.should_split(depth, range.is_divisible()) {
        let siblings = range.split_siblings();
        unsafe { parent.get() }.add_ref(siblings.len() as u32);

        for sibling in siblings {
            let leaf = Arc::clone(leaf);
            let owner_slot_for_child = ctx.worker_id();
            let child = ctx.allocate(
                TaskKind::Range,
                Box::new(move |ctx: &mut TaskContext| {
                    fork(ctx, sibling, depth, partitioner, owner_slot_for_child, parent, &leaf);
                    Bypass::None
                }),
            );
            unsafe { child.get_mut() }.parent = Some(parent);
            ctx.spawn(child);
        }

        fork(ctx, range, depth, partitioner, owner_slot, parent, leaf);
    } else {
        leaf(range);
    }
}

/// Allocates the root task for a fork-join pattern call. The body reads
/// its own `parent` lazily via `self_ref`, since [`crate::Scheduler::spawn_and_wait`]
/// only fills it in after this closure has already been built.
pub(crate) fn spawn_root<R, Leaf>(
    scheduler: &crate::Scheduler,
    range: R,
    partitioner: Partitioner,
    leaf: Arc<Leaf>,
) -> TaskRef
where
    R: SplittableRange,
    Leaf: Fn(R) + Send + Sync + 'static,
{
    use crate::self_ref::SelfRef;

    let depth = partitioner.initial_depth(scheduler.worker_count(), R::split_factor());
    let created_slot = scheduler.current_worker_id();
    let self_ref = SelfRef::empty();
    let self_ref_for_body = self_ref.clone();

    let task = scheduler.allocate_task(TaskKind::Range, move |ctx: &mut TaskContext| {
        let this = self_ref_for_body.get();
        let parent = unsafe { this.get() }
            .parent
            .expect("root fork-join task has no parent at execution time");
        fork(ctx, range, depth, partitioner, created_slot, parent, &leaf);
        Bypass::None
    });
    self_ref.set(task);
    task
}
