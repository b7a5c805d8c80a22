//! End-to-end `parallel_reduce` scenario: summing 1..=1_000_000 under the
//! `Adaptive` partitioner.

use weave::{parallel_reduce, Config, Partitioner, Range1d, Scheduler};

#[test]
fn sums_one_to_one_million() {
    let scheduler = Scheduler::init(Config::default().worker_count(4)).expect("scheduler init");

    let total = parallel_reduce(
        &scheduler,
        Range1d::<u64>::new(1, 1_000_001, 1, 1),
        Partitioner::adaptive(3),
        0u64,
        |r: Range1d<u64>| {
            let mut sum = 0u64;
            let mut i = r.begin();
            while i < r.end() {
                sum += i;
                i += 1;
            }
            sum
        },
        |a, b| a + b,
    )
    .expect("parallel_reduce completes without panicking");

    assert_eq!(total, 500_000_500_000);

    scheduler.shutdown();
}
