//! Inline-or-heap storage for a task's body closure.
//!
//! Task bodies are typically a handful of captured words (a range, a
//! pointer to a body functor, a partitioner). Storing them inline in the
//! task header avoids a heap allocation per spawn, the dominant cost on
//! the hot path; only closures whose capture exceeds [`INLINE_CAPACITY`]
//! spill to a heap box. This is the Rust equivalent of the task header's
//! "embedded user payload, inlined up to a fixed size" from the data
//! model: a small-buffer optimization over a type-erased `FnMut`.

use std::alloc::{alloc, dealloc, Layout};
use std::mem::{align_of, size_of, MaybeUninit};
use std::ptr;

use crate::TaskContext;

/// Capacity of the inline payload buffer, in bytes. Chosen to comfortably
/// hold a 2-D range plus a partitioner and a thin body pointer (roughly
/// the "64-128 bytes" the data model calls for).
pub const INLINE_CAPACITY: usize = 128;
const INLINE_ALIGN: usize = 16;

/// What a task body does when it finishes running.
pub enum Bypass {
    /// Nothing to run immediately; the worker goes back to its own deque.
    None,
    /// Run this task immediately without re-entering the deque, for
    /// cache-local continuation of recycled tasks (e.g. `fib(n-2)` after
    /// a recycle).
    Task(crate::TaskRef),
}

type CallFn = unsafe fn(*mut u8, &mut TaskContext) -> Bypass;
type DropFn = unsafe fn(*mut u8);

struct PayloadVTable {
    call: CallFn,
    drop: DropFn,
}

unsafe fn call_impl<F>(data: *mut u8, ctx: &mut TaskContext) -> Bypass
where
    F: FnMut(&mut TaskContext) -> Bypass,
{
    let f = unsafe { &mut *(data as *mut F) };
    f(ctx)
}

unsafe fn drop_impl<F>(data: *mut u8) {
    unsafe { ptr::drop_in_place(data as *mut F) };
}

fn vtable_for<F>() -> &'static PayloadVTable
where
    F: FnMut(&mut TaskContext) -> Bypass,
{
    // One vtable instance per monomorphization of F, created once and
    // reused for every Payload::new::<F>() call.
    &PayloadVTable {
        call: call_impl::<F>,
        drop: drop_impl::<F>,
    }
    // SAFETY: promoted to 'static because the value has no interior
    // mutability and each monomorphization produces an identical value;
    // `const` promotion of the literal keeps a single static instance.
}

enum Storage {
    Inline([MaybeUninit<u8>; INLINE_CAPACITY]),
    Heap { ptr: *mut u8, layout: Layout },
}

/// A type-erased, inlined-when-possible task body.
pub struct Payload {
    storage: Storage,
    vtable: &'static PayloadVTable,
}

impl Payload {
    /// Wraps `body` as the task's payload, inlining it if it fits.
    pub fn new<F>(body: F) -> Self
    where
        F: FnMut(&mut TaskContext) -> Bypass + Send + 'static,
    {
        let vtable = vtable_for::<F>();

        if size_of::<F>() <= INLINE_CAPACITY && align_of::<F>() <= INLINE_ALIGN {
            let mut buf: [MaybeUninit<u8>; INLINE_CAPACITY] = [MaybeUninit::uninit(); INLINE_CAPACITY];
            unsafe {
                ptr::write(buf.as_mut_ptr() as *mut F, body);
            }
            Payload {
                storage: Storage::Inline(buf),
                vtable,
            }
        } else {
            let layout = Layout::new::<F>();
            unsafe {
                let ptr = alloc(layout);
                assert!(!ptr.is_null(), "payload allocation failed");
                ptr::write(ptr as *mut F, body);
                Payload {
                    storage: Storage::Heap { ptr, layout },
                    vtable,
                }
            }
        }
    }

    fn data_ptr(&mut self) -> *mut u8 {
        match &mut self.storage {
            Storage::Inline(buf) => buf.as_mut_ptr() as *mut u8,
            Storage::Heap { ptr, .. } => *ptr,
        }
    }

    /// Re-initializes this payload in place with a new closure, reusing
    /// the allocation when both old and new fit inline. Used by
    /// `Task::recycle` so a task can be re-spawned without a fresh
    /// allocation.
    pub fn reinit<F>(&mut self, body: F)
    where
        F: FnMut(&mut TaskContext) -> Bypass + Send + 'static,
    {
        // Assigning through `&mut self` drops the old `Payload` first (running
        // `Drop::drop`'s vtable-drop-and-dealloc exactly once) before writing
        // the new one; doing that drop manually here too would run it twice.
        *self = Payload::new(body);
    }

    /// Invokes the body.
    pub fn call(&mut self, ctx: &mut TaskContext) -> Bypass {
        let vtable = self.vtable;
        let data = self.data_ptr();
        unsafe { (vtable.call)(data, ctx) }
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        let data = self.data_ptr();
        unsafe { (self.vtable.drop)(data) };
        if let Storage::Heap { ptr, layout } = self.storage {
            unsafe { dealloc(ptr, layout) };
        }
    }
}

// SAFETY: the wrapped closure is required to be Send at construction.
unsafe impl Send for Payload {}
