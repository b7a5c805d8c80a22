//! Partitioners: how deeply a pattern recursively splits a range before
//! handing a piece off as leaf work, instead of running it to exhaustion
//! immediately.
//!
//! Grounded on TBB/GTS's three-way split between a partitioner that always
//! recurses to the minimum grain (`Simple`), one that divides the range up
//! front into exactly as many pieces as there are workers and never
//! reconsiders (`Static`), and one that keeps a depth budget but will keep
//! dividing past it if a piece gets stolen, since a steal is itself
//! evidence that more parallelism would help (`Adaptive`).

/// Picked once per pattern call and carried down through every recursive
/// split of that call's range.
#[derive(Debug, Clone, Copy)]
pub enum Partitioner {
    /// Split every divisible range, all the way to `min_size`.
    Simple,
    /// Split down to a depth fixed by the worker count, then stop —
    /// exactly `worker_count` (rounded up to a power of two) leaf pieces,
    /// regardless of load imbalance afterward.
    Static,
    /// Split down to a depth budget derived from the worker count times
    /// `initial_depth_factor`; once that budget is spent, a piece only
    /// splits further if it was itself stolen from its originating deque.
    Adaptive { initial_depth_factor: u16 },
}

impl Partitioner {
    pub fn simple() -> Self {
        Partitioner::Simple
    }

    pub fn static_partitioner() -> Self {
        Partitioner::Static
    }

    pub fn adaptive(initial_depth_factor: u16) -> Self {
        Partitioner::Adaptive { initial_depth_factor }
    }

    /// `ceil(log_k(worker_count))`: the number of levels a range with
    /// branching factor `k` must split to produce at least `worker_count`
    /// leaves. Per spec.md §4.6, `k` is the range shape's own split factor
    /// (2 for `Range1d`/Kd ranges, 4 for `QuadRange`, 8 for `OctRange`), not
    /// hard-coded to 2 — `QuadRange`/`OctRange` reach the same leaf count
    /// in fewer levels than a binary range would.
    fn levels_for(worker_count: usize, split_factor: usize) -> u16 {
        let workers = worker_count.max(1) as u64;
        let k = split_factor.max(2) as u64;
        let mut levels = 0u16;
        let mut capacity = 1u64;
        while capacity < workers {
            capacity *= k;
            levels += 1;
        }
        levels
    }

    /// The split-depth budget a fresh root task should be spawned with,
    /// given the range shape's branching factor (see
    /// [`crate::splittable::SplittableRange::split_factor`]).
    pub fn initial_depth(&self, worker_count: usize, split_factor: usize) -> u16 {
        let levels = Self::levels_for(worker_count, split_factor);
        match self {
            Partitioner::Simple => u16::MAX,
            Partitioner::Static => levels,
            Partitioner::Adaptive { initial_depth_factor } => levels.saturating_mul(*initial_depth_factor).max(1),
        }
    }

    /// Whether a range task carrying the given (already-stepped, see
    /// [`Self::step_depth`]) `depth` should still recurse into a split
    /// rather than run as a leaf.
    pub fn should_split(&self, depth: u16, is_divisible: bool) -> bool {
        if !is_divisible {
            return false;
        }
        match self {
            Partitioner::Simple => true,
            Partitioner::Static => depth > 0,
            Partitioner::Adaptive { .. } => depth > 0,
        }
    }

    /// Computes the depth budget to use at one split decision, given
    /// whether the piece being considered was reached via a steal (i.e.
    /// its owning worker differs from whichever worker created it).
    ///
    /// `Simple` ignores depth entirely. `Static` decrements by one level
    /// regardless of stealing — a one-shot mapping that never adapts.
    /// `Adaptive` is the policy the spec calls out as the interesting
    /// one: a steal refreshes the budget back to its full initial value
    /// (idle neighbors are evidence that more parallelism would help),
    /// while the absence of a steal halves it (the work is being
    /// absorbed locally; further splitting only adds overhead).
    pub fn step_depth(&self, depth: u16, stolen: bool, worker_count: usize, split_factor: usize) -> u16 {
        match self {
            Partitioner::Simple => depth,
            Partitioner::Static => depth.saturating_sub(1),
            Partitioner::Adaptive { .. } => {
                if stolen {
                    self.initial_depth(worker_count, split_factor)
                } else {
                    depth / 2
                }
            }
        }
    }
}

impl Default for Partitioner {
    fn default() -> Self {
        Partitioner::Adaptive { initial_depth_factor: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_depth_tracks_worker_count_base_2() {
        assert_eq!(Partitioner::levels_for(1, 2), 0);
        assert_eq!(Partitioner::levels_for(2, 2), 1);
        assert_eq!(Partitioner::levels_for(4, 2), 2);
        assert_eq!(Partitioner::levels_for(8, 2), 3);
    }

    #[test]
    fn static_depth_shrinks_with_a_wider_split_factor() {
        // QuadRange (k=4) and OctRange (k=8) reach the same worker_count
        // leaf target in fewer levels than a binary Range1d/Kd range would.
        assert_eq!(Partitioner::levels_for(8, 2), 3);
        assert_eq!(Partitioner::levels_for(8, 4), 2);
        assert_eq!(Partitioner::levels_for(8, 8), 1);
    }

    #[test]
    fn simple_always_splits_while_divisible() {
        let p = Partitioner::simple();
        assert!(p.should_split(0, true));
        assert!(!p.should_split(0, false));
    }

    #[test]
    fn adaptive_halves_budget_when_not_stolen() {
        let p = Partitioner::adaptive(3);
        let depth = p.step_depth(4, false, 4, 2);
        assert_eq!(depth, 2);
        assert!(p.should_split(depth, true));
    }

    #[test]
    fn adaptive_refreshes_budget_on_steal() {
        let p = Partitioner::adaptive(3);
        let initial = p.initial_depth(4, 2);
        let depth = p.step_depth(0, true, 4, 2);
        assert_eq!(depth, initial);
        assert!(p.should_split(depth, true));
    }

    #[test]
    fn adaptive_stops_once_budget_exhausted_and_not_stolen() {
        let p = Partitioner::adaptive(3);
        let depth = p.step_depth(1, false, 4, 2);
        assert_eq!(depth, 0);
        assert!(!p.should_split(depth, true));
    }
}
