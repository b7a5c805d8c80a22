//! Scheduler configuration.

use std::sync::Arc;

use crate::trace::Observer;

/// Options recognized at [`crate::Scheduler::init`].
///
/// All fields have defaults matching the documented behavior: `worker_count`
/// defaults to the hardware thread count, and `steal_retry_rounds` defaults
/// to `2 * worker_count` once the worker count is known (so it is computed
/// lazily rather than hard-coded into `Default`).
pub struct Config {
    /// Number of OS worker threads. Defaults to [`num_cpus::get`].
    pub worker_count: usize,
    /// Optional per-worker hardware-thread-id binding list, indexed by
    /// worker id. Only honored when the `affinity` cargo feature is
    /// enabled; a binding for a worker beyond the list's length, or any
    /// binding at all without the feature, is ignored (a `tracing` warning
    /// is emitted in the latter case).
    pub affinity: Option<Vec<usize>>,
    /// Free-list prewarm size per worker slot.
    pub initial_task_cache: usize,
    /// Failed steal rounds before a worker parks. Defaults to
    /// `2 * worker_count` when left `None`.
    pub steal_retry_rounds: Option<usize>,
    /// Default initial split-budget factor handed to [`crate::partitioner::Adaptive`]
    /// when a pattern is not given an explicit one.
    pub adaptive_initial_depth: u16,
    /// Observer hooked into spawn/steal/park/wavefront events. Defaults to
    /// a no-op implementation.
    pub observer: Option<Arc<dyn Observer>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worker_count: num_cpus::get(),
            affinity: None,
            initial_task_cache: 32,
            steal_retry_rounds: None,
            adaptive_initial_depth: 3,
            observer: None,
        }
    }
}

impl Config {
    pub fn worker_count(mut self, n: usize) -> Self {
        self.worker_count = n.max(1);
        self
    }

    pub fn affinity(mut self, bindings: Vec<usize>) -> Self {
        self.affinity = Some(bindings);
        self
    }

    pub fn initial_task_cache(mut self, n: usize) -> Self {
        self.initial_task_cache = n;
        self
    }

    pub fn steal_retry_rounds(mut self, n: usize) -> Self {
        self.steal_retry_rounds = Some(n);
        self
    }

    pub fn adaptive_initial_depth(mut self, n: u16) -> Self {
        self.adaptive_initial_depth = n;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub(crate) fn resolved_steal_retry_rounds(&self, worker_count: usize) -> usize {
        self.steal_retry_rounds.unwrap_or(2 * worker_count)
    }
}
