//! Error type for arena operations.
//!
//! `Display` goes through `core::fmt` only, so an error can be rendered into
//! a stack buffer from inside the allocator.

use core::fmt;

/// Errors reported by [`Arena`](crate::Arena) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The OS refused the arena reservation.
    ReservationFailed {
        /// Bytes requested from the OS.
        size: usize,
    },

    /// Carving the block would pass the end of the reservation.
    Exhausted {
        /// The requested payload size.
        requested: usize,
    },

    /// `count * size` does not fit in a `usize`.
    Overflow { count: usize, size: usize },

    /// Alignment is not a power of two.
    InvalidAlignment { align: usize },

    /// Pointer does not belong to a block carved by this arena.
    ForeignPointer { addr: usize },

    /// Pointer refers to a block that is already on the free list.
    DoubleFree { addr: usize },

    /// The free list reaches a node that cannot be a free header.
    CorruptFreeList {
        /// Header address of the offending node.
        addr: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AllocError::ReservationFailed { size } => {
                write!(f, "arena reservation of {} bytes failed", size)
            }
            AllocError::Exhausted { requested } => {
                write!(f, "arena exhausted allocating {} bytes", requested)
            }
            AllocError::Overflow { count, size } => {
                write!(f, "allocation size overflow ({} * {})", count, size)
            }
            AllocError::InvalidAlignment { align } => {
                write!(f, "invalid alignment {}", align)
            }
            AllocError::ForeignPointer { addr } => {
                write!(f, "free of pointer not owned by arena: {:#x}", addr)
            }
            AllocError::DoubleFree { addr } => write!(f, "double free detected: {:#x}", addr),
            AllocError::CorruptFreeList { addr } => {
                write!(f, "free list corrupted at header {:#x}", addr)
            }
        }
    }
}

impl std::error::Error for AllocError {}
