//! Unified error/fatal-condition type for the allocator.
//!
//! Mirrors the shape of a typical kernel `MmError`: one enum, one `Display`
//! impl producing the operator-facing message, and nothing else. Unlike an
//! `MmError`, every variant here is fatal — the crate has no use for a
//! `Result`-returning public API, since a request that can merely fail
//! (insufficient free space) is represented as `None`, not an error. These
//! three variants exist solely to carry the one fixed diagnostic string each
//! prints before the process aborts.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VladError {
    /// The host could not supply the backing buffer at `init`.
    OutOfMemory,
    /// A block expected to carry `FREE_TAG` did not, during free-list
    /// traversal.
    Corruption,
    /// A pointer passed to `free` does not carry `ALLOC_TAG` at its header.
    InvalidFree,
}

impl fmt::Display for VladError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "vlad_init:insufficient memory"),
            Self::Corruption => write!(f, "Memory corruption"),
            Self::InvalidFree => write!(f, "Attempt to free non-allocated memory"),
        }
    }
}
