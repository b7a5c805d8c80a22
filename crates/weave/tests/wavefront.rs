//! End-to-end `parallel_wavefront` scenario: a Pascal's-triangle-style
//! recurrence tiled across a 64x64 grid with a 4x4 tile size, checked
//! against the closed-form binomial coefficient it computes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use weave::{parallel_wavefront, Config, KdRange2d, Partitioner, Scheduler};

const SIDE: usize = 64;

#[test]
fn pascal_triangle_matches_binomial_coefficient() {
    let scheduler = Scheduler::init(Config::default().worker_count(4)).expect("scheduler init");
    let grid: Arc<Vec<AtomicU64>> = Arc::new((0..SIDE * SIDE).map(|_| AtomicU64::new(0)).collect());

    let grid_for_body = Arc::clone(&grid);
    parallel_wavefront(
        &scheduler,
        KdRange2d::<usize>::new(0, SIDE, 4, 0, SIDE, 4),
        move |r: KdRange2d<usize>| {
            // Ordering guaranteed safe by the wavefront dependency grid: no
            // other tile can be concurrently touching these cells, and the
            // grid's own AcqRel decrements establish happens-before with
            // whichever tile produced our leading edge.
            for y in r.y_range().begin()..r.y_range().end() {
                for x in r.x_range().begin()..r.x_range().end() {
                    let left = if x > 0 { grid_for_body[y * SIDE + (x - 1)].load(Ordering::Relaxed) } else { 0 };
                    let above = if y > 0 { grid_for_body[(y - 1) * SIDE + x].load(Ordering::Relaxed) } else { 0 };
                    let seed = if x == 0 && y == 0 { 1 } else { 0 };
                    grid_for_body[y * SIDE + x].store(left.wrapping_add(above).wrapping_add(seed), Ordering::Relaxed);
                }
            }
        },
        Partitioner::simple(),
    )
    .expect("parallel_wavefront completes without panicking");

    let corner = grid[(SIDE - 1) * SIDE + (SIDE - 1)].load(Ordering::Relaxed);
    assert_eq!(corner, 11_428_574_671_220_725_568);

    scheduler.shutdown();
}
