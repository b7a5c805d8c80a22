//! Per-worker Chase-Lev work-stealing deque.
//!
//! The owner pushes and pops the bottom (LIFO, depth-first, cache
//! friendly); any other worker may steal from the top (FIFO against the
//! owner's push pattern — "steal-oldest"). Growable: the owner resizes
//! the backing buffer when full, publishing the new buffer so thieves
//! racing against a resize either see the old buffer (and lose their CAS
//! harmlessly) or the new one.
//!
//! Memory ordering follows the spec: `bottom` uses a SeqCst store after
//! writing the slot so the write happens-before the publish; `pop_bottom`
//! decrements bottom then fences SeqCst before reading `top`, matching
//! the classic Chase-Lev / Lê et al. weak-memory-safe formulation; `top`
//! is only ever advanced by a SeqCst compare-exchange.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

use crate::sync::{fence, AtomicU64, Ordering};
use crate::TaskRef;

struct Buffer {
    slots: Box<[UnsafeCell<MaybeUninit<TaskRef>>]>,
    mask: usize,
}

impl Buffer {
    fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Buffer {
            slots,
            mask: capacity - 1,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    unsafe fn write(&self, index: u64, value: TaskRef) {
        let slot = &self.slots[index as usize & self.mask];
        unsafe { (*slot.get()).write(value) };
    }

    unsafe fn read(&self, index: u64) -> TaskRef {
        let slot = &self.slots[index as usize & self.mask];
        unsafe { (*slot.get()).assume_init() }
    }
}

// SAFETY: the deque's top/bottom protocol is the sole means of access to
// a slot; a slot is never read by two threads at once.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

/// Returned by `pop_bottom`/`steal_top` when no task is currently
/// available. Not an error: an empty deque or a lost steal race are
/// expected, routine outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Empty {
    /// Nothing queued.
    NoWork,
    /// Something was queued, but a concurrent steal/pop took it first.
    Contended,
}

/// A single worker's deque. Only the owning worker may call
/// `push_bottom`/`pop_bottom`; any worker (including the owner) may call
/// `steal_top`.
pub struct Deque {
    bottom: AtomicU64,
    top: AtomicU64,
    buffer: UnsafeCell<*mut Buffer>,
    // Retired buffers are kept alive until the deque itself drops, since a
    // concurrent thief may still be dereferencing one after a grow. This
    // is adequate for a bounded number of resizes per deque lifetime; a
    // production-grade version would use an epoch reclaimer instead.
    retired: UnsafeCell<Vec<Box<Buffer>>>,
}

// SAFETY: all shared mutable state is behind the atomics above; the
// `UnsafeCell<*mut Buffer>` is only ever written by the owner under the
// "owner grows, thieves retry" policy described in the module docs.
unsafe impl Send for Deque {}
unsafe impl Sync for Deque {}

const INITIAL_CAPACITY: usize = 64;

impl Deque {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(1);
        let buffer = Box::into_raw(Box::new(Buffer::new(capacity)));
        Deque {
            bottom: AtomicU64::new(0),
            top: AtomicU64::new(0),
            buffer: UnsafeCell::new(buffer),
            retired: UnsafeCell::new(Vec::new()),
        }
    }

    fn current_buffer(&self) -> &Buffer {
        // SAFETY: only the owner ever replaces this pointer, and it does
        // so while holding the only mutable reference (single-threaded
        // growth); readers only ever dereference, never mutate through it.
        unsafe { &**self.buffer.get() }
    }

    /// Owner-only. Grows the backing buffer when full by copying the live
    /// window `[top, bottom)` into a fresh, larger buffer and publishing
    /// it. The old buffer is retired, not freed, since a thief may still
    /// hold a reference to it mid-steal.
    fn grow(&self, bottom: u64, top: u64) {
        let old = self.current_buffer();
        let new_capacity = old.capacity() * 2;
        tracing::trace!(old_capacity = old.capacity(), new_capacity, "deque grow");
        let new_buffer = Buffer::new(new_capacity);
        let mut i = top;
        while i < bottom {
            unsafe {
                let v = old.read(i);
                new_buffer.write(i, v);
            }
            i += 1;
        }
        let new_ptr = Box::into_raw(Box::new(new_buffer));
        let old_ptr = unsafe { std::ptr::replace(self.buffer.get(), new_ptr) };
        // SAFETY: old_ptr was produced by a prior Box::into_raw and is not
        // dereferenced again through `self.buffer`.
        let old_box = unsafe { Box::from_raw(old_ptr) };
        unsafe { (*self.retired.get()).push(old_box) };
    }

    /// Owner-only. Pushes `task` onto the bottom, growing the buffer
    /// first if it is full.
    pub fn push_bottom(&self, task: TaskRef) {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);
        let cap = self.current_buffer().capacity() as u64;

        if b.wrapping_sub(t) >= cap {
            self.grow(b, t);
        }

        unsafe { self.current_buffer().write(b, task) };
        // Release: the write above must be visible to any thief that
        // observes the incremented bottom.
        self.bottom.store(b.wrapping_add(1), Ordering::Release);
    }

    /// Owner-only. Pops the most recently pushed task (LIFO).
    pub fn pop_bottom(&self) -> Result<TaskRef, Empty> {
        let b = self.bottom.load(Ordering::Relaxed);
        if b == 0 {
            return Err(Empty::NoWork);
        }
        let new_b = b.wrapping_sub(1);
        self.bottom.store(new_b, Ordering::SeqCst);

        // SeqCst fence between the bottom decrement and the top read: the
        // pair of SeqCst operations here and the thief's SeqCst CAS on
        // `top` give this a single total order, which is what makes the
        // "contest the last element" race below correct.
        fence(Ordering::SeqCst);
        let t = self.top.load(Ordering::Acquire);

        if new_b > t {
            // More than one element remained before the decrement; no
            // thief can possibly be racing for this slot.
            let task = unsafe { self.current_buffer().read(new_b) };
            return Ok(task);
        }

        if new_b == t {
            // Exactly one element left: race a thief for it via CAS on top.
            let task = unsafe { self.current_buffer().read(new_b) };
            let won = self
                .top
                .compare_exchange(t, t.wrapping_add(1), Ordering::SeqCst, Ordering::Relaxed)
                .is_ok();
            self.bottom.store(t.wrapping_add(1), Ordering::Relaxed);
            if won {
                return Ok(task);
            }
            return Err(Empty::Contended);
        }

        // new_b < t: the deque was already empty before this call.
        self.bottom.store(t, Ordering::Relaxed);
        Err(Empty::NoWork)
    }

    /// Callable by any worker. Steals the oldest task (FIFO).
    pub fn steal_top(&self) -> Result<TaskRef, Empty> {
        let t = self.top.load(Ordering::Acquire);
        // Acquire on top, then acquire on bottom: together these observe
        // a consistent `[top, bottom)` window, because `push_bottom`
        // release-stores bottom after writing the slot.
        let b = self.bottom.load(Ordering::Acquire);

        if t >= b {
            return Err(Empty::NoWork);
        }

        let task = unsafe { self.current_buffer().read(t) };
        match self
            .top
            .compare_exchange(t, t.wrapping_add(1), Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => Ok(task),
            Err(_) => Err(Empty::Contended),
        }
    }

    /// Approximate size, racy against concurrent owner/thief activity;
    /// useful for diagnostics, not for correctness decisions.
    pub fn approx_len(&self) -> i64 {
        let b = self.bottom.load(Ordering::Acquire) as i64;
        let t = self.top.load(Ordering::Acquire) as i64;
        (b - t).max(0)
    }
}

impl Default for Deque {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Deque {
    fn drop(&mut self) {
        let buf_ptr = *self.buffer.get_mut();
        // SAFETY: `Deque` is being dropped, so no thief can be concurrently
        // accessing this buffer.
        unsafe { drop(Box::from_raw(buf_ptr)) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_ref(n: usize) -> TaskRef {
        // Tasks are never dereferenced in these tests; only the pointer
        // identity is checked, so a non-null aligned sentinel is enough.
        unsafe { TaskRef::from_raw((n * 8 + 8) as *mut crate::Task) }
    }

    #[test]
    fn push_then_pop_is_lifo() {
        let dq = Deque::new();
        dq.push_bottom(dummy_ref(1));
        dq.push_bottom(dummy_ref(2));
        dq.push_bottom(dummy_ref(3));
        assert_eq!(dq.pop_bottom(), Ok(dummy_ref(3)));
        assert_eq!(dq.pop_bottom(), Ok(dummy_ref(2)));
        assert_eq!(dq.pop_bottom(), Ok(dummy_ref(1)));
        assert_eq!(dq.pop_bottom(), Err(Empty::NoWork));
    }

    #[test]
    fn steal_takes_oldest() {
        let dq = Deque::new();
        dq.push_bottom(dummy_ref(1));
        dq.push_bottom(dummy_ref(2));
        dq.push_bottom(dummy_ref(3));
        assert_eq!(dq.steal_top(), Ok(dummy_ref(1)));
        assert_eq!(dq.pop_bottom(), Ok(dummy_ref(3)));
        assert_eq!(dq.steal_top(), Ok(dummy_ref(2)));
        assert_eq!(dq.pop_bottom(), Err(Empty::NoWork));
    }

    #[test]
    fn grows_past_initial_capacity() {
        let dq = Deque::with_capacity(2);
        for i in 0..100 {
            dq.push_bottom(dummy_ref(i));
        }
        let mut popped = Vec::new();
        while let Ok(t) = dq.pop_bottom() {
            popped.push(t);
        }
        assert_eq!(popped.len(), 100);
        // LIFO order means the last pushed comes out first.
        assert_eq!(popped[0], dummy_ref(99));
        assert_eq!(popped[99], dummy_ref(0));
    }

    #[test]
    fn concurrent_steal_and_pop_conserve_every_task() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;
        use std::thread;

        let dq = Arc::new(Deque::new());
        const N: usize = 10_000;
        for i in 0..N {
            dq.push_bottom(dummy_ref(i));
        }

        let stolen = Arc::new(AtomicUsize::new(0));
        let mut thieves = Vec::new();
        for _ in 0..4 {
            let dq = Arc::clone(&dq);
            let stolen = Arc::clone(&stolen);
            thieves.push(thread::spawn(move || {
                let mut count = 0;
                loop {
                    match dq.steal_top() {
                        Ok(_) => count += 1,
                        Err(Empty::Contended) => continue,
                        Err(Empty::NoWork) => {
                            if dq.approx_len() == 0 {
                                break;
                            }
                        }
                    }
                }
                stolen.fetch_add(count, Ordering::SeqCst);
            }));
        }

        let mut popped = 0;
        while let Ok(_) = dq.pop_bottom() {
            popped += 1;
        }
        for t in thieves {
            t.join().unwrap();
        }

        assert_eq!(popped + stolen.load(Ordering::SeqCst), N);
    }
}
