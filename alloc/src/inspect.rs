//! Read-only enumeration and aggregate statistics over an [`Arena`].
//!
//! Neither function here takes a `&mut Arena` — they only walk the arena in
//! address order and report what they see, never mutating a header.

use crate::arena::Arena;
use crate::header::HEADER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Allocated,
}

#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    pub offset: u32,
    pub size: u32,
    pub state: BlockState,
}

/// Visit every block from offset 0 to the end of the arena, in address
/// order, reporting its offset, size and free/allocated state.
pub fn enumerate(arena: &Arena, mut visitor: impl FnMut(BlockInfo)) {
    let mut p = 0u32;
    while p < arena.size() {
        // SAFETY: `p` starts at 0 and advances only by a block's own
        // `size`, so it always lands on a header boundary.
        let h = unsafe { arena.read_header(p) };
        let state = if h.is_free() { BlockState::Free } else { BlockState::Allocated };
        visitor(BlockInfo { offset: p, size: h.size, state });
        p += h.size;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocatorStats {
    pub arena_size: u32,
    pub free_bytes: u32,
    pub allocated_bytes: u32,
    pub free_block_count: u32,
    pub allocated_block_count: u32,
    pub largest_free_block: u32,
}

impl AllocatorStats {
    /// Bytes of header overhead across every allocated block, i.e. bytes the
    /// caller asked for `n` but the arena spent `HEADER` extra on bookkeeping.
    pub fn header_overhead(&self) -> u32 {
        self.allocated_block_count * HEADER
    }
}

pub fn stats(arena: &Arena) -> AllocatorStats {
    let mut s = AllocatorStats { arena_size: arena.size(), ..Default::default() };
    enumerate(arena, |b| match b.state {
        BlockState::Free => {
            s.free_bytes += b.size;
            s.free_block_count += 1;
            s.largest_free_block = s.largest_free_block.max(b.size);
        }
        BlockState::Allocated => {
            s.allocated_bytes += b.size;
            s.allocated_block_count += 1;
        }
    });
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::try_alloc;

    #[test]
    fn stats_partition_sums_to_arena_size() {
        let mut arena = Arena::try_init(1024).unwrap();
        let _a = try_alloc(&mut arena, 100).unwrap().unwrap();
        let s = stats(&arena);
        assert_eq!(s.free_bytes + s.allocated_bytes, s.arena_size);
        assert_eq!(s.allocated_block_count, 1);
        assert_eq!(s.largest_free_block, 512);
    }

    #[test]
    fn enumerate_visits_in_address_order() {
        let mut arena = Arena::try_init(1024).unwrap();
        let _a = try_alloc(&mut arena, 100).unwrap().unwrap();
        let mut offsets = alloc::vec::Vec::new();
        enumerate(&arena, |b| offsets.push(b.offset));
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
    }
}
