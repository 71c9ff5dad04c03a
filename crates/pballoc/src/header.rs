//! Block header layout.
//!
//! Every block is a fixed-size header immediately followed by its payload:
//!
//! ```text
//!   header address                  payload address (returned to caller)
//!   |                               |
//!   v                               v
//!   +---------------+---------------+---------------------------------+
//!   | size (usize)  | link (usize)  | payload: `size` bytes ...       |
//!   +---------------+---------------+---------------------------------+
//!   offset 0        offset 8        offset HEADER_SIZE
//! ```
//!
//! The header is accessed through explicit byte offsets rather than by casting
//! the address to a struct, so the on-heap layout is exactly what is written
//! here regardless of how the compiler would lay out a Rust struct.
//!
//! The link word has three states:
//!
//! | value        | meaning                                   |
//! |--------------|-------------------------------------------|
//! | `usize::MAX` | block is allocated (not linked)           |
//! | `0`          | block is free and is the last list node   |
//! | other        | block is free; address of the next header |

use crate::util::{align_up, MIN_ALIGN};
use core::mem::size_of;
use core::ptr::NonNull;

const SIZE_OFFSET: usize = 0;
const LINK_OFFSET: usize = size_of::<usize>();

/// Bytes between a header address and its payload.
pub const HEADER_SIZE: usize = align_up(2 * size_of::<usize>(), MIN_ALIGN);

const NOT_LINKED: usize = usize::MAX;
const LIST_END: usize = 0;

/// Decoded state of a header's link word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The block is allocated.
    NotLinked,
    /// The block is free and last in the list.
    End,
    /// The block is free; the next free block follows.
    Next(BlockHeader),
}

impl Link {
    /// Link value that continues a list whose current head is `head`.
    #[inline]
    pub fn to(head: Option<BlockHeader>) -> Self {
        match head {
            Some(h) => Link::Next(h),
            None => Link::End,
        }
    }

    #[inline]
    fn encode(self) -> usize {
        match self {
            Link::NotLinked => NOT_LINKED,
            Link::End => LIST_END,
            Link::Next(h) => h.addr(),
        }
    }

    #[inline]
    fn decode(word: usize) -> Self {
        match word {
            NOT_LINKED => Link::NotLinked,
            LIST_END => Link::End,
            addr => Link::Next(BlockHeader(unsafe { NonNull::new_unchecked(addr as *mut u8) })),
        }
    }
}

/// Handle to a block header in arena memory.
///
/// A `BlockHeader` is just an address; reading or writing through it is
/// unsafe because nothing checks that the address really is a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader(NonNull<u8>);

impl BlockHeader {
    /// # Safety
    /// `addr` must be the start of a `HEADER_SIZE`-byte, word-aligned region
    /// inside a live arena mapping.
    #[inline]
    pub unsafe fn at(addr: NonNull<u8>) -> Self {
        BlockHeader(addr)
    }

    /// Header for a payload pointer previously returned by the arena.
    ///
    /// # Safety
    /// `payload` must be at least `HEADER_SIZE` bytes past the arena base.
    #[inline]
    pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
        BlockHeader(NonNull::new_unchecked(payload.as_ptr().sub(HEADER_SIZE)))
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    #[inline]
    pub fn payload(self) -> NonNull<u8> {
        // A header is never the last HEADER_SIZE bytes of the address space.
        unsafe { NonNull::new_unchecked(self.0.as_ptr().add(HEADER_SIZE)) }
    }

    #[inline]
    unsafe fn word(self, offset: usize) -> *mut usize {
        self.0.as_ptr().add(offset).cast::<usize>()
    }

    /// Write a fresh header for an allocated block of `capacity` bytes.
    ///
    /// # Safety
    /// The header region must be writable and owned by the caller.
    #[inline]
    pub unsafe fn init(self, capacity: usize) {
        self.word(SIZE_OFFSET).write(capacity);
        self.word(LINK_OFFSET).write(NOT_LINKED);
    }

    /// Payload capacity recorded when the block was carved.
    ///
    /// # Safety
    /// The header must have been written by [`BlockHeader::init`].
    #[inline]
    pub unsafe fn size(self) -> usize {
        self.word(SIZE_OFFSET).read()
    }

    /// # Safety
    /// Same as [`BlockHeader::size`].
    #[inline]
    pub unsafe fn link(self) -> Link {
        Link::decode(self.word(LINK_OFFSET).read())
    }

    /// # Safety
    /// Same as [`BlockHeader::size`].
    #[inline]
    pub unsafe fn set_link(self, link: Link) {
        self.word(LINK_OFFSET).write(link.encode());
    }

    /// # Safety
    /// Same as [`BlockHeader::size`].
    #[inline]
    pub unsafe fn is_allocated(self) -> bool {
        self.link() == Link::NotLinked
    }

    /// Next node when this header is on the free list.
    ///
    /// # Safety
    /// Same as [`BlockHeader::size`].
    #[inline]
    pub unsafe fn next_free(self) -> Option<BlockHeader> {
        match self.link() {
            Link::Next(next) => Some(next),
            Link::End | Link::NotLinked => None,
        }
    }
}
