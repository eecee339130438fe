//! A single fixed-size buddy allocator over one power-of-two byte arena.
//!
//! [`VladAllocator`] is an explicit value: construct one with [`VladAllocator::init`],
//! call [`VladAllocator::alloc`]/[`VladAllocator::free`] against it, drop it (or call
//! [`VladAllocator::end`]) when done. The free functions at the bottom of this module
//! (`vlad_init`/`vlad_malloc`/`vlad_free`/`vlad_end`/`vlad_stats`) are a thin
//! process-global convenience wrapper kept for API parity with callers that
//! want one arena per process and no value to thread through.
//!
//! Every fatal condition the allocator can hit — a corrupted free list, or a
//! pointer handed to `free` that the allocator never gave out — terminates
//! the process via `klog_error!` followed by a panic, rather than returning
//! a `Result` a caller might be tempted to paper over. A request that simply
//! doesn't fit is not fatal: it comes back as `None`.

#![no_std]

extern crate alloc;

pub mod arena;
pub mod engine;
pub mod error;
pub mod header;
pub mod inspect;

use spin::Mutex;
use vlad_lib::klog_error;

pub use arena::Arena;
pub use error::VladError;
pub use header::{ALLOC_TAG, BlockHeader, FREE_TAG, HEADER};
pub use inspect::{AllocatorStats, BlockInfo, BlockState};

pub struct VladAllocator {
    arena: Arena,
}

impl VladAllocator {
    /// Acquire an arena of at least `size` bytes (rounded up to the next
    /// power of two, floored at 512). Fatal if the host cannot supply it.
    pub fn init(size: u32) -> Self {
        match Arena::try_init(size) {
            Ok(arena) => Self { arena },
            Err(e) => fatal(e),
        }
    }

    /// Hand out a pointer to at least `n` usable bytes, or `None` if no
    /// block in the arena is large enough.
    pub fn alloc(&mut self, n: u32) -> Option<*mut u8> {
        match engine::try_alloc(&mut self.arena, n) {
            Ok(ptr) => ptr,
            Err(e) => fatal(e),
        }
    }

    /// Return a pointer previously obtained from [`Self::alloc`] on this
    /// allocator. Fatal if `ptr` was not an outstanding allocation.
    pub fn free(&mut self, ptr: *mut u8) {
        if let Err(e) = engine::try_free(&mut self.arena, ptr) {
            fatal(e);
        }
    }

    /// Read-only walk over every block, free or allocated, in address order.
    pub fn enumerate(&self, visitor: impl FnMut(BlockInfo)) {
        inspect::enumerate(&self.arena, visitor);
    }

    /// Aggregate free/allocated byte and block counts.
    pub fn stats(&self) -> AllocatorStats {
        inspect::stats(&self.arena)
    }

    /// Total arena size in bytes.
    pub fn size(&self) -> u32 {
        self.arena.size()
    }

    /// Recover the block offset backing a pointer previously returned by
    /// [`Self::alloc`], or `None` if it did not come from this arena.
    pub fn offset_of(&self, ptr: *mut u8) -> Option<u32> {
        self.arena.offset_of(ptr)
    }

    /// Release the arena back to the host. Equivalent to dropping `self`,
    /// spelled out for callers translating from the free-function API.
    pub fn end(self) {
        drop(self);
    }
}

fn fatal(err: VladError) -> ! {
    klog_error!("{}", err);
    panic!("{}", err);
}

// ---------------------------------------------------------------------------
// Process-global convenience wrapper
// ---------------------------------------------------------------------------

static GLOBAL: Mutex<Option<VladAllocator>> = Mutex::new(None);

/// Initialise the process-global arena. Idempotent: a call while already
/// initialised is ignored, even if `size` differs from the first call.
pub fn vlad_init(size: u32) {
    let mut guard = GLOBAL.lock();
    if guard.is_some() {
        return;
    }
    *guard = Some(VladAllocator::init(size));
}

/// Allocate from the process-global arena. Returns a null pointer if the
/// arena was never initialised or has no block large enough.
pub fn vlad_malloc(n: u32) -> *mut u8 {
    let mut guard = GLOBAL.lock();
    match guard.as_mut() {
        Some(allocator) => allocator.alloc(n).unwrap_or(core::ptr::null_mut()),
        None => core::ptr::null_mut(),
    }
}

/// Free a pointer previously returned by `vlad_malloc`. A null pointer or a
/// call before `vlad_init` is a silent no-op; anything else not currently
/// allocated is fatal, matching [`VladAllocator::free`].
pub fn vlad_free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let mut guard = GLOBAL.lock();
    if let Some(allocator) = guard.as_mut() {
        allocator.free(ptr);
    }
}

/// Release the process-global arena, if any.
pub fn vlad_end() {
    *GLOBAL.lock() = None;
}

/// Snapshot statistics for the process-global arena, or `None` if it was
/// never initialised.
pub fn vlad_stats() -> Option<AllocatorStats> {
    GLOBAL.lock().as_ref().map(VladAllocator::stats)
}
