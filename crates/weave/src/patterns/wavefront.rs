//! `parallel_wavefront`: splits a range into a regular grid of `min_size`
//! tiles and runs each tile's body only once every tile "behind" it (one
//! step back along every axis) has finished, so dependencies propagate
//! forward the way a wavefront sweeps across a grid — the pattern used for
//! dynamic-programming recurrences like the Pascal-triangle scenario this
//! module is tested against.
//!
//! Grounded on the source's `DependencyArray`/`LaunchTask::launch`: each
//! cell there is seeded with the number of predecessor axes it has, and a
//! finishing tile decrements its forward neighbors' counts, spawning any
//! that reach zero. The source additionally lets a single wavefront task
//! cover more than one grid cell (`_splitToReady`, to absorb
//! coarser-than-grid tasks produced by its own partitioner) — this port
//! sidesteps that complexity by pinning every wavefront task to exactly
//! one `min_size`-by-`min_size`(-by-`min_size`) cell, which is sufficient
//! once `min_size` evenly divides the range's extent on every axis (the
//! precondition `parallel_wavefront` documents) and keeps the dependency
//! bookkeeping a single flat atomic array rather than a tree of splits.
//! The 3-D form the source left stubbed (`LaunchTask<3>`) is implemented
//! here in full, decrementing all three forward neighbors per axis.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use weave_core::{Bypass, TaskContext, TaskKind, TaskRef};
use weave_ranges::{KdRange2d, KdRange3d, RangeIndex};

use crate::error::SchedulerError;
use crate::partitioner::Partitioner;
use crate::self_ref::SelfRef;
use crate::Scheduler;

struct Grid2<I, Body> {
    x_origin: I,
    y_origin: I,
    x_extent: usize,
    y_extent: usize,
    x_min: usize,
    y_min: usize,
    gx: usize,
    gy: usize,
    deps: Vec<AtomicU32>,
    body: Arc<Body>,
}

impl<I: RangeIndex, Body> Grid2<I, Body> {
    fn index(&self, i: usize, j: usize) -> usize {
        j * self.gx + i
    }

    fn tile(&self, i: usize, j: usize) -> KdRange2d<I> {
        let x0 = self.x_origin.advance((i * self.x_min).min(self.x_extent));
        let x1 = self.x_origin.advance(((i + 1) * self.x_min).min(self.x_extent));
        let y0 = self.y_origin.advance((j * self.y_min).min(self.y_extent));
        let y1 = self.y_origin.advance(((j + 1) * self.y_min).min(self.y_extent));
        KdRange2d::new(x0, x1, self.x_min, y0, y1, self.y_min)
    }
}

fn spawn_tile2<I, Body>(ctx: &mut TaskContext, grid: &Arc<Grid2<I, Body>>, parent: TaskRef, i: usize, j: usize)
where
    I: RangeIndex,
    Body: Fn(KdRange2d<I>) + Send + Sync + 'static,
{
    let grid_for_body = Arc::clone(grid);
    let tile_range = grid.tile(i, j);

    let task = ctx.allocate(
        TaskKind::Range,
        Box::new(move |ctx: &mut TaskContext| {
            (grid_for_body.body)(tile_range);

            if i + 1 < grid_for_body.gx {
                let idx = grid_for_body.index(i + 1, j);
                if grid_for_body.deps[idx].fetch_sub(1, Ordering::AcqRel) == 1 {
                    spawn_tile2(ctx, &grid_for_body, parent, i + 1, j);
                }
            }
            if j + 1 < grid_for_body.gy {
                let idx = grid_for_body.index(i, j + 1);
                if grid_for_body.deps[idx].fetch_sub(1, Ordering::AcqRel) == 1 {
                    spawn_tile2(ctx, &grid_for_body, parent, i, j + 1);
                }
            }
            Bypass::None
        }),
    );
    unsafe { task.get_mut() }.parent = Some(parent);
    unsafe { parent.get() }.add_ref(1);
    ctx.spawn(task);
}

/// Runs `body` once per `x_min_size`-by-`y_min_size` tile of `range`,
/// scheduling a tile only after the tile immediately behind it on every
/// axis (lower X, lower Y) has completed. Blocks the caller until the
/// whole grid has run.
///
/// `partitioner` is accepted for signature parity with `parallel_for` and
/// `parallel_reduce` but is not consulted: a wavefront's dependency grid is
/// fixed at `range`'s own min sizes (the granularity `Partitioner::Simple`
/// would reach anyway by always splitting to the minimum), since the
/// dependency bookkeeping here is a flat array sized up front rather than a
/// tree that grows as a partitioner decides to split further.
///
/// # Panics
/// If `range`'s extent is not evenly divisible by its own min sizes on
/// both axes — the tiling this pattern performs assumes no partial tile
/// at the grid's far edge.
pub fn parallel_wavefront<I, Body>(
    scheduler: &Scheduler,
    range: KdRange2d<I>,
    body: Body,
    _partitioner: Partitioner,
) -> Result<(), SchedulerError>
where
    I: RangeIndex,
    Body: Fn(KdRange2d<I>) + Send + Sync + 'static,
{
    scheduler.participate(|| {
        let x = *range.x_range();
        let y = *range.y_range();
        let x_min = x.min_size().max(1);
        let y_min = y.min_size().max(1);
        let x_extent = x.initial_size();
        let y_extent = y.initial_size();
        assert!(x_extent % x_min == 0, "parallel_wavefront requires x_min_size to evenly divide the X extent");
        assert!(y_extent % y_min == 0, "parallel_wavefront requires y_min_size to evenly divide the Y extent");

        let gx = (x_extent / x_min).max(1);
        let gy = (y_extent / y_min).max(1);

        let mut deps = Vec::with_capacity(gx * gy);
        for j in 0..gy {
            for i in 0..gx {
                deps.push(AtomicU32::new((i > 0) as u32 + (j > 0) as u32));
            }
        }

        let grid = Arc::new(Grid2 {
            x_origin: x.origin(),
            y_origin: y.origin(),
            x_extent,
            y_extent,
            x_min,
            y_min,
            gx,
            gy,
            deps,
            body: Arc::new(body),
        });

        let self_ref = SelfRef::empty();
        let self_ref_for_body = self_ref.clone();

        let root = scheduler.allocate_task(TaskKind::Range, move |ctx: &mut TaskContext| {
            let this = self_ref_for_body.get();
            let parent = unsafe { this.get() }
                .parent
                .expect("root wavefront task has no parent at execution time");
            spawn_tile2(ctx, &grid, parent, 0, 0);
            Bypass::None
        });
        self_ref.set(root);

        scheduler.spawn_and_wait(root)
    })
}

struct Grid3<I, Body> {
    x_origin: I,
    y_origin: I,
    z_origin: I,
    x_extent: usize,
    y_extent: usize,
    z_extent: usize,
    x_min: usize,
    y_min: usize,
    z_min: usize,
    gx: usize,
    gy: usize,
    gz: usize,
    deps: Vec<AtomicU32>,
    body: Arc<Body>,
}

impl<I: RangeIndex, Body> Grid3<I, Body> {
    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.gy + j) * self.gx + i
    }

    fn tile(&self, i: usize, j: usize, k: usize) -> KdRange3d<I> {
        let x0 = self.x_origin.advance((i * self.x_min).min(self.x_extent));
        let x1 = self.x_origin.advance(((i + 1) * self.x_min).min(self.x_extent));
        let y0 = self.y_origin.advance((j * self.y_min).min(self.y_extent));
        let y1 = self.y_origin.advance(((j + 1) * self.y_min).min(self.y_extent));
        let z0 = self.z_origin.advance((k * self.z_min).min(self.z_extent));
        let z1 = self.z_origin.advance(((k + 1) * self.z_min).min(self.z_extent));
        KdRange3d::new(x0, x1, self.x_min, y0, y1, self.y_min, z0, z1, self.z_min)
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_tile3<I, Body>(ctx: &mut TaskContext, grid: &Arc<Grid3<I, Body>>, parent: TaskRef, i: usize, j: usize, k: usize)
where
    I: RangeIndex,
    Body: Fn(KdRange3d<I>) + Send + Sync + 'static,
{
    let grid_for_body = Arc::clone(grid);
    let tile_range = grid.tile(i, j, k);

    let task = ctx.allocate(
        TaskKind::Range,
        Box::new(move |ctx: &mut TaskContext| {
            (grid_for_body.body)(tile_range);

            if i + 1 < grid_for_body.gx {
                let idx = grid_for_body.index(i + 1, j, k);
                if grid_for_body.deps[idx].fetch_sub(1, Ordering::AcqRel) == 1 {
                    spawn_tile3(ctx, &grid_for_body, parent, i + 1, j, k);
                }
            }
            if j + 1 < grid_for_body.gy {
                let idx = grid_for_body.index(i, j + 1, k);
                if grid_for_body.deps[idx].fetch_sub(1, Ordering::AcqRel) == 1 {
                    spawn_tile3(ctx, &grid_for_body, parent, i, j + 1, k);
                }
            }
            if k + 1 < grid_for_body.gz {
                let idx = grid_for_body.index(i, j, k + 1);
                if grid_for_body.deps[idx].fetch_sub(1, Ordering::AcqRel) == 1 {
                    spawn_tile3(ctx, &grid_for_body, parent, i, j, k + 1);
                }
            }
            Bypass::None
        }),
    );
    unsafe { task.get_mut() }.parent = Some(parent);
    unsafe { parent.get() }.add_ref(1);
    ctx.spawn(task);
}

/// The 3-D generalization of [`parallel_wavefront`]: a tile becomes ready
/// once its three predecessors (lower X, lower Y, lower Z) have all
/// completed.
///
/// See [`parallel_wavefront`] for why `partitioner` is accepted but unused.
///
/// # Panics
/// If `range`'s extent is not evenly divisible by its own min sizes on
/// any of the three axes.
pub fn parallel_wavefront3d<I, Body>(
    scheduler: &Scheduler,
    range: KdRange3d<I>,
    body: Body,
    _partitioner: Partitioner,
) -> Result<(), SchedulerError>
where
    I: RangeIndex,
    Body: Fn(KdRange3d<I>) + Send + Sync + 'static,
{
    scheduler.participate(|| {
        let x = *range.x_range();
        let y = *range.y_range();
        let z = *range.z_range();
        let x_min = x.min_size().max(1);
        let y_min = y.min_size().max(1);
        let z_min = z.min_size().max(1);
        let x_extent = x.initial_size();
        let y_extent = y.initial_size();
        let z_extent = z.initial_size();
        assert!(x_extent % x_min == 0, "parallel_wavefront3d requires x_min_size to evenly divide the X extent");
        assert!(y_extent % y_min == 0, "parallel_wavefront3d requires y_min_size to evenly divide the Y extent");
        assert!(z_extent % z_min == 0, "parallel_wavefront3d requires z_min_size to evenly divide the Z extent");

        let gx = (x_extent / x_min).max(1);
        let gy = (y_extent / y_min).max(1);
        let gz = (z_extent / z_min).max(1);

        let mut deps = Vec::with_capacity(gx * gy * gz);
        for k in 0..gz {
            for j in 0..gy {
                for i in 0..gx {
                    deps.push(AtomicU32::new((i > 0) as u32 + (j > 0) as u32 + (k > 0) as u32));
                }
            }
        }

        let grid = Arc::new(Grid3 {
            x_origin: x.origin(),
            y_origin: y.origin(),
            z_origin: z.origin(),
            x_extent,
            y_extent,
            z_extent,
            x_min,
            y_min,
            z_min,
            gx,
            gy,
            gz,
            deps,
            body: Arc::new(body),
        });

        let self_ref = SelfRef::empty();
        let self_ref_for_body = self_ref.clone();

        let root = scheduler.allocate_task(TaskKind::Range, move |ctx: &mut TaskContext| {
            let this = self_ref_for_body.get();
            let parent = unsafe { this.get() }
                .parent
                .expect("root wavefront task has no parent at execution time");
            spawn_tile3(ctx, &grid, parent, 0, 0, 0);
            Bypass::None
        });
        self_ref.set(root);

        scheduler.spawn_and_wait(root)
    })
}
