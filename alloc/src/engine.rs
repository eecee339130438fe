//! Smallest-fit search, recursive split, insertion-scan free, and the
//! coalescing pass.
//!
//! Every function here takes an `&mut Arena` and works purely in terms of
//! byte offsets; none of it knows about `VladAllocator` or the process-global
//! convenience wrapper in the crate root.

use vlad_lib::{klog_trace, next_pow2_u32};

use crate::arena::Arena;
use crate::error::VladError;
use crate::header::{ALLOC_TAG, BlockHeader, FREE_TAG, HEADER};

fn read(arena: &Arena, off: u32) -> BlockHeader {
    unsafe { arena.read_header(off) }
}

fn write(arena: &mut Arena, off: u32, header: BlockHeader) {
    unsafe { arena.write_header(off, header) };
}

/// Detach the block at `off` from whatever free list it currently belongs
/// to, using its own `next`/`prev` fields to locate its neighbours.
fn unlink(arena: &mut Arena, off: u32) {
    let h = read(arena, off);
    if h.next == off {
        // Singleton: nothing else references this block.
        return;
    }
    let mut prev = read(arena, h.prev);
    prev.next = h.next;
    write(arena, h.prev, prev);

    let mut next = read(arena, h.next);
    next.prev = h.prev;
    write(arena, h.next, next);
}

/// Splice `off` into the free list immediately after `after`.
fn splice_after(arena: &mut Arena, after: u32, off: u32) {
    let mut a = read(arena, after);
    let old_next = a.next;

    a.next = off;
    write(arena, after, a);

    let mut new_node = read(arena, off);
    new_node.next = old_next;
    new_node.prev = after;
    write(arena, off, new_node);

    let mut next = read(arena, old_next);
    next.prev = off;
    write(arena, old_next, next);
}

/// Walk the full free list starting at `F`, returning the offset of the
/// smallest block that satisfies `need`, breaking ties in favour of the
/// block encountered first.
fn smallest_fit(arena: &Arena, need: u32) -> Result<Option<u32>, VladError> {
    let f = arena.free_anchor();
    let anchor = read(arena, f);
    if !anchor.is_free() {
        // No free blocks anywhere in the arena.
        return Ok(None);
    }

    let mut best: Option<(u32, u32)> = None;
    let mut node = f;
    loop {
        let h = read(arena, node);
        if !h.is_free() {
            return Err(VladError::Corruption);
        }
        if h.size >= need {
            match best {
                Some((_, best_size)) if h.size >= best_size => {}
                _ => best = Some((node, h.size)),
            }
        }
        let next = h.next;
        if next == f {
            break;
        }
        node = next;
    }
    Ok(best.map(|(off, _)| off))
}

/// Repeatedly halve the block at `off` (size `size`) until it is exactly
/// `need` bytes, leaving each freed half correctly spliced into the list.
fn split_down(arena: &mut Arena, off: u32, size: u32, need: u32) {
    let mut size = size;
    while size / 2 >= need {
        let half = size / 2;
        let buddy_off = off + half;

        let mut b = read(arena, off);
        b.size = half;
        write(arena, off, b);

        let buddy = BlockHeader { magic: FREE_TAG, size: half, next: 0, prev: 0 };
        write(arena, buddy_off, buddy);
        splice_after(arena, off, buddy_off);

        size = half;
    }
}

/// Find, split and unlink a block of at least `n + HEADER` bytes, returning
/// a pointer to its payload, or `None` if no block is large enough.
pub fn try_alloc(arena: &mut Arena, n: u32) -> Result<Option<*mut u8>, VladError> {
    let need = next_pow2_u32(n.saturating_add(HEADER));
    if need > arena.size() {
        return Ok(None);
    }

    let Some(chosen) = smallest_fit(arena, need)? else {
        return Ok(None);
    };

    let chosen_size = read(arena, chosen).size;
    split_down(arena, chosen, chosen_size, need);

    let old_next = read(arena, chosen).next;
    unlink(arena, chosen);

    if arena.free_anchor() == chosen {
        arena.set_free_anchor(old_next);
    }

    write(arena, chosen, BlockHeader { magic: ALLOC_TAG, size: need, next: 0, prev: 0 });
    klog_trace!("alloc: off={} need={}", chosen, need);
    Ok(Some(arena.user_ptr(chosen)))
}

/// Validate `ptr`, reinsert its block into the free list in address order,
/// and run the coalescing pass.
pub fn try_free(arena: &mut Arena, ptr: *mut u8) -> Result<(), VladError> {
    let off = arena.offset_of(ptr).ok_or(VladError::InvalidFree)?;
    let mut this = read(arena, off);
    if !this.is_allocated() {
        return Err(VladError::InvalidFree);
    }

    let size = arena.size();
    let mut scan = (off + this.size) % size;
    let next_off = loop {
        if scan == off {
            break off; // no other free block exists; becomes a singleton.
        }
        let candidate = read(arena, scan);
        if candidate.is_free() {
            break scan;
        }
        scan = (scan + candidate.size) % size;
    };

    this.magic = FREE_TAG;
    if next_off == off {
        this.next = off;
        this.prev = off;
        write(arena, off, this);
    } else {
        let prev_off = read(arena, next_off).prev;
        this.next = next_off;
        this.prev = prev_off;
        write(arena, off, this);

        let mut prev = read(arena, prev_off);
        prev.next = off;
        write(arena, prev_off, prev);

        let mut next = read(arena, next_off);
        next.prev = off;
        write(arena, next_off, next);
    }

    klog_trace!("free: off={} size={}", off, this.size);
    coalesce(arena);
    Ok(())
}

/// Walk the arena from offset 0, merging any adjacent equal-sized,
/// buddy-aligned free pair, restarting from the top after every merge.
pub fn coalesce(arena: &mut Arena) {
    loop {
        let mut merged = false;
        let mut p: u32 = 0;
        while p < arena.size() {
            let c = read(arena, p);
            if !c.is_free() {
                p += c.size;
                continue;
            }
            let q = p + c.size;
            if q >= arena.size() {
                break;
            }
            let neighbour = read(arena, q);
            if neighbour.is_free() && neighbour.size == c.size && p % (2 * c.size) == 0 {
                unlink(arena, q);
                // Re-read: if `q` happened to be `p`'s free-list neighbour,
                // `unlink` already rewrote `p`'s next/prev fields above.
                let mut grown = read(arena, p);
                grown.size = c.size * 2;
                write(arena, p, grown);
                klog_trace!("coalesce: merged {} + {} -> {}", p, q, p);
                merged = true;
                break;
            }
            p += c.size;
        }
        if !merged {
            break;
        }
    }
    reseed_anchor(arena);
}

/// Retag `F` to the last free block in address order, leaving it untouched
/// if no free block remains (the next `try_alloc` will observe a non-free
/// anchor and correctly report exhaustion).
fn reseed_anchor(arena: &mut Arena) {
    let mut p = 0u32;
    let mut last_free = None;
    while p < arena.size() {
        let h = read(arena, p);
        if h.is_free() {
            last_free = Some(p);
        }
        p += h.size;
    }
    if let Some(f) = last_free {
        arena.set_free_anchor(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_returns_to_single_block() {
        let mut arena = Arena::try_init(1024).unwrap();
        let p = try_alloc(&mut arena, 100).unwrap().unwrap();
        try_free(&mut arena, p).unwrap();
        let root = read(&arena, 0);
        assert!(root.is_free());
        assert_eq!(root.size, 1024);
    }

    #[test]
    fn exhaustion_returns_none_not_err() {
        let mut arena = Arena::try_init(512).unwrap();
        let _a = try_alloc(&mut arena, 400).unwrap().unwrap(); // needs all 512 bytes
        let b = try_alloc(&mut arena, 1).unwrap();
        assert!(b.is_none());
    }

    #[test]
    fn free_of_foreign_pointer_is_invalid() {
        let mut arena = Arena::try_init(512).unwrap();
        let mut x = 0u8;
        let err = try_free(&mut arena, &mut x as *mut u8).unwrap_err();
        assert_eq!(err, VladError::InvalidFree);
    }

    #[test]
    fn double_free_is_detected() {
        let mut arena = Arena::try_init(512).unwrap();
        let p = try_alloc(&mut arena, 64).unwrap().unwrap();
        try_free(&mut arena, p).unwrap();
        let err = try_free(&mut arena, p).unwrap_err();
        assert_eq!(err, VladError::InvalidFree);
    }

    #[test]
    fn smallest_fit_prefers_tightest_block_over_first() {
        let mut arena = Arena::try_init(1024).unwrap();
        // Split the arena into a 512 and (implicitly) leave a smaller block
        // available by allocating and freeing to create fragmentation.
        let a = try_alloc(&mut arena, 100).unwrap().unwrap(); // 128-byte block at 0
        let b = try_alloc(&mut arena, 50).unwrap().unwrap(); // 128-byte block at 128
        let _c = try_alloc(&mut arena, 400).unwrap().unwrap(); // 512-byte block at 512
        try_free(&mut arena, a).unwrap();
        // Free list now holds a 128-byte block at 0 and a 256-byte block at 256.
        let p = try_alloc(&mut arena, 100).unwrap().unwrap();
        assert_eq!(arena.offset_of(p), Some(0));
        try_free(&mut arena, b).unwrap();
    }
}
