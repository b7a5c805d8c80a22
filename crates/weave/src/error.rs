//! Error taxonomy for the facade crate.
//!
//! The only things a caller can actually recover from are a worker thread
//! failing to spawn and a propagated user-body panic. Everything else the
//! worker loop encounters (double spawn, splitting a non-divisible range,
//! recycling a queued task, running out of deque/slab capacity) is a
//! programmer-contract violation or an unrecoverable allocator failure and
//! panics at the call site per the scheduler's fatal-vs-recoverable design.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    #[error("task body panicked: {0}")]
    BodyPanic(String),
}

pub(crate) fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task body panicked with a non-string payload".to_string()
    }
}
