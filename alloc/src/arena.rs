//! Backing buffer acquisition and raw offset/header access.
//!
//! An [`Arena`] owns a single power-of-two byte buffer obtained from the host
//! allocator and the current free-list anchor `F`. It knows nothing about
//! splitting, coalescing or the smallest-fit search — those live in
//! [`crate::engine`]; this module only knows how to get the buffer, address
//! individual headers within it by offset, and give it back.

use alloc::alloc::{alloc_zeroed, dealloc};
use core::alloc::Layout;
use core::ptr::NonNull;

use vlad_lib::{klog_debug, klog_error, next_pow2_u32};

use crate::error::VladError;
use crate::header::{BlockHeader, FREE_TAG, HEADER};

pub struct Arena {
    base: NonNull<u8>,
    layout: Layout,
    size: u32,
    free_anchor: u32,
}

// SAFETY: `Arena` owns its buffer exclusively; the crate's single-mutator
// contract (see the crate root) is what makes sharing it across threads
// sound, not any property of `NonNull` itself.
unsafe impl Send for Arena {}

impl Arena {
    /// Arenas never shrink below this many bytes, matching the floor the
    /// original allocator imposed regardless of the caller's request.
    pub const MIN_SIZE: u32 = 512;

    /// Acquire a `max(512, next_pow2(requested))`-byte buffer from the host
    /// and format it as a single free block spanning the whole arena.
    pub fn try_init(requested: u32) -> Result<Self, VladError> {
        let size = next_pow2_u32(requested).max(Self::MIN_SIZE);
        let layout = Layout::from_size_align(size as usize, core::mem::align_of::<BlockHeader>())
            .map_err(|_| VladError::OutOfMemory)?;

        // SAFETY: `layout.size()` is non-zero (at least `MIN_SIZE`).
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or_else(|| {
            klog_error!("vlad_init:insufficient memory");
            VladError::OutOfMemory
        })?;

        let mut arena = Self { base, layout, size, free_anchor: 0 };
        let root = BlockHeader { magic: FREE_TAG, size, next: 0, prev: 0 };
        // SAFETY: offset 0 is within the freshly acquired buffer.
        unsafe { arena.write_header(0, root) };

        klog_debug!("arena: acquired {} bytes (requested {})", size, requested);
        Ok(arena)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn free_anchor(&self) -> u32 {
        self.free_anchor
    }

    pub fn set_free_anchor(&mut self, offset: u32) {
        self.free_anchor = offset;
    }

    /// # Safety
    /// `offset + HEADER` must be `<= self.size`.
    pub unsafe fn read_header(&self, offset: u32) -> BlockHeader {
        debug_assert!(offset + HEADER <= self.size);
        unsafe { *(self.base.as_ptr().add(offset as usize) as *const BlockHeader) }
    }

    /// # Safety
    /// `offset + HEADER` must be `<= self.size`.
    pub unsafe fn write_header(&mut self, offset: u32, header: BlockHeader) {
        debug_assert!(offset + HEADER <= self.size);
        unsafe { *(self.base.as_ptr().add(offset as usize) as *mut BlockHeader) = header };
    }

    /// Pointer to the payload following the header at `offset`.
    pub fn user_ptr(&self, offset: u32) -> *mut u8 {
        unsafe { self.base.as_ptr().add(offset as usize + HEADER as usize) }
    }

    /// Recover the block offset a previously handed-out pointer belongs to.
    /// Returns `None` for a pointer that does not lie within this arena.
    pub fn offset_of(&self, ptr: *mut u8) -> Option<u32> {
        let base = self.base.as_ptr() as usize;
        let p = ptr as usize;
        let header_size = HEADER as usize;
        if p < base + header_size || p > base + self.size as usize {
            return None;
        }
        Some((p - base - header_size) as u32)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: `base`/`layout` are exactly what `alloc_zeroed` returned.
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rounds_up_to_power_of_two_with_floor() {
        let a = Arena::try_init(100).unwrap();
        assert_eq!(a.size(), Arena::MIN_SIZE);

        let b = Arena::try_init(1000).unwrap();
        assert_eq!(b.size(), 1024);
    }

    #[test]
    fn init_formats_a_single_free_block() {
        let a = Arena::try_init(512).unwrap();
        let h = unsafe { a.read_header(0) };
        assert_eq!(h.magic, FREE_TAG);
        assert_eq!(h.size, 512);
    }

    #[test]
    fn offset_of_rejects_foreign_pointers() {
        let a = Arena::try_init(512).unwrap();
        let mut x = 0u8;
        assert_eq!(a.offset_of(&mut x as *mut u8), None);
        assert_eq!(a.offset_of(a.user_ptr(0)), Some(0));
    }
}
