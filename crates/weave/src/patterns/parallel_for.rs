//! `parallel_for`: recursively split a range and run `body` once per leaf
//! piece, on whatever worker ends up owning it.

use std::sync::Arc;

use crate::error::SchedulerError;
use crate::partitioner::Partitioner;
use crate::patterns::fork::spawn_root;
use crate::splittable::SplittableRange;
use crate::Scheduler;

/// Splits `range` down to leaf-sized pieces per `partitioner` and calls
/// `body` once for each, blocking the caller until every piece has run.
/// `body` must be safe to call concurrently from any worker.
pub fn parallel_for<R, Body>(
    scheduler: &Scheduler,
    range: R,
    partitioner: Partitioner,
    body: Body,
) -> Result<(), SchedulerError>
where
    R: SplittableRange,
    Body: Fn(R) + Send + Sync + 'static,
{
    scheduler.participate(|| {
        let leaf = Arc::new(body);
        let root = spawn_root(scheduler, range, partitioner, leaf);
        scheduler.spawn_and_wait(root)
    })
}
