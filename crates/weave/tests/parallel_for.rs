//! End-to-end `parallel_for` scenarios: a 1-D increment over a shared
//! buffer, and a 2-D increment over a shared grid with `Static`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use weave::{parallel_for, Config, KdRange2d, Partitioner, Range1d, Scheduler};

#[test]
fn increments_every_slot_exactly_once() {
    let scheduler = Scheduler::init(Config::default().worker_count(4)).expect("scheduler init");
    let acc: Arc<Vec<AtomicU32>> = Arc::new((0..10).map(|_| AtomicU32::new(0)).collect());

    let acc_for_body = Arc::clone(&acc);
    parallel_for(
        &scheduler,
        Range1d::<usize>::new(0, 10, 1, 1),
        Partitioner::simple(),
        move |r: Range1d<usize>| {
            for i in r.begin()..r.end() {
                acc_for_body[i].fetch_add(1, Ordering::Relaxed);
            }
        },
    )
    .expect("parallel_for completes without panicking");

    for slot in acc.iter() {
        assert_eq!(slot.load(Ordering::Relaxed), 1);
    }

    scheduler.shutdown();
}

#[test]
fn increments_every_cell_of_a_2d_grid_exactly_once() {
    let scheduler = Scheduler::init(Config::default().worker_count(4)).expect("scheduler init");
    const SIDE: usize = 1024;
    let grid: Arc<Vec<AtomicU32>> = Arc::new((0..SIDE * SIDE).map(|_| AtomicU32::new(0)).collect());

    let grid_for_body = Arc::clone(&grid);
    parallel_for(
        &scheduler,
        KdRange2d::<usize>::new(0, SIDE, 1, 0, SIDE, 1),
        Partitioner::static_partitioner(),
        move |r: KdRange2d<usize>| {
            for y in r.y_range().begin()..r.y_range().end() {
                for x in r.x_range().begin()..r.x_range().end() {
                    grid_for_body[y * SIDE + x].fetch_add(1, Ordering::Relaxed);
                }
            }
        },
    )
    .expect("parallel_for completes without panicking");

    for cell in grid.iter() {
        assert_eq!(cell.load(Ordering::Relaxed), 1);
    }

    scheduler.shutdown();
}
