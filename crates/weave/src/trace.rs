//! Optional observer hook for scheduler events.
//!
//! The source treats tracing as an external collaborator (process-wide
//! hooks); here that becomes an injected trait with a no-op default, so the
//! core scheduler is buildable and usable without pulling in any tracing
//! backend. When the `tracing` feature is enabled, [`TracingObserver`]
//! forwards every event to `tracing` spans/events at `trace`/`debug` level.

/// Hooks fired by the worker loop and wavefront pattern. All methods have
/// no-op default bodies; implement only the ones a caller cares about.
pub trait Observer: Send + Sync {
    fn on_spawn(&self, _worker_id: u16) {}
    fn on_steal(&self, _thief: u16, _victim: u16) {}
    fn on_park(&self, _worker_id: u16) {}
    fn on_wake(&self, _worker_id: u16) {}
    fn on_wavefront_cell_ready(&self, _x: usize, _y: usize, _z: usize) {}
}

/// The default observer: does nothing, compiles to nothing.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Forwards every event to `tracing` at `trace` level (`debug` for park
/// transitions, since those are comparatively rare and useful for
/// diagnosing starvation).
#[cfg(feature = "tracing")]
#[derive(Debug, Default)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl Observer for TracingObserver {
    fn on_spawn(&self, worker_id: u16) {
        tracing::trace!(worker_id, "spawn");
    }

    fn on_steal(&self, thief: u16, victim: u16) {
        tracing::trace!(thief, victim, "steal");
    }

    fn on_park(&self, worker_id: u16) {
        tracing::debug!(worker_id, "park");
    }

    fn on_wake(&self, worker_id: u16) {
        tracing::debug!(worker_id, "wake");
    }

    fn on_wavefront_cell_ready(&self, x: usize, y: usize, z: usize) {
        tracing::trace!(x, y, z, "wavefront cell ready");
    }
}
