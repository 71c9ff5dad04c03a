//! The arena: a single anonymous mapping carved into header-prefixed blocks.
//!
//! ```text
//!   base                                   frontier                  limit
//!   |                                      |                         |
//!   v                                      v                         v
//!   +----+------+----+----------+----+-----+-------------------------+
//!   | H  |  A   | H  |    B     | H  |  C  |   never claimed         |
//!   +----+------+----+----------+----+-----+-------------------------+
//!              ^                      ^
//!              free_head -------------+ (C freed last, then B)
//! ```
//!
//! Allocation first walks the free list (most recently freed first) and
//! takes the first block whose recorded capacity is large enough; the block
//! keeps its full capacity. If nothing fits, a new block is carved at the
//! frontier. Blocks are never split, merged, or returned to the OS.
//!
//! An `Arena` is plain single-threaded state: every mutating operation takes
//! `&mut self`. The process heap in [`crate::init`] puts one behind a lock.

use crate::error::AllocError;
use crate::header::{BlockHeader, Link, HEADER_SIZE};
use crate::platform;
use crate::util::{checked_align_up, is_aligned, page_size, MIN_ALIGN};
use core::ptr::{self, NonNull};

/// Counters describing how much of an arena is in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Bytes reserved from the OS (0 before the first allocation).
    pub reserved: usize,
    /// Bytes between the base and the frontier, headers included.
    pub claimed: usize,
    /// Blocks currently on the free list.
    pub free_blocks: usize,
    /// Sum of the capacities of free blocks.
    pub free_bytes: usize,
}

/// Result of walking the free list with [`Arena::check_integrity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub free_blocks: usize,
    pub free_bytes: usize,
}

pub struct Arena {
    reservation: usize,
    base: usize,
    limit: usize,
    frontier: usize,
    free_head: Option<BlockHeader>,
}

// The arena exclusively owns its mapping; the raw header handles inside it
// point nowhere else.
unsafe impl Send for Arena {}

impl Arena {
    /// An arena that will reserve `reservation` bytes (rounded up to the page
    /// size) on its first allocation. Nothing is mapped until then.
    pub const fn new(reservation: usize) -> Self {
        Arena {
            reservation,
            base: 0,
            limit: 0,
            frontier: 0,
            free_head: None,
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.base != 0
    }

    /// Reserve the backing region if that has not happened yet.
    ///
    /// Returns `Ok(true)` when this call performed the reservation and
    /// `Ok(false)` when the arena was already initialized.
    #[inline]
    pub fn ensure_initialized(&mut self) -> Result<bool, AllocError> {
        if self.is_initialized() {
            return Ok(false);
        }
        self.reserve()?;
        Ok(true)
    }

    #[cold]
    #[inline(never)]
    fn reserve(&mut self) -> Result<(), AllocError> {
        let failed = AllocError::ReservationFailed {
            size: self.reservation,
        };
        let size = checked_align_up(self.reservation.max(1), page_size()).ok_or(failed)?;

        // SAFETY: size is page-aligned and non-zero.
        let base = unsafe { platform::map_anonymous(size) };
        if base.is_null() {
            return Err(failed);
        }

        self.reservation = size;
        self.base = base as usize;
        self.limit = self.base + size;
        self.frontier = self.base;
        self.free_head = None;
        Ok(())
    }

    /// Allocate a block with at least `size` usable bytes, aligned to
    /// [`MIN_ALIGN`].
    ///
    /// A zero-byte request still gets its own header and therefore a
    /// distinct address.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.ensure_initialized()?;
        if let Some(block) = self.take_first_fit(size, MIN_ALIGN) {
            return Ok(block.payload());
        }
        self.bump(size, MIN_ALIGN)
    }

    /// Allocate a block whose payload is aligned to `align`.
    pub fn allocate_aligned(
        &mut self,
        size: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if !align.is_power_of_two() {
            return Err(AllocError::InvalidAlignment { align });
        }
        if align <= MIN_ALIGN {
            return self.allocate(size);
        }
        self.ensure_initialized()?;
        if let Some(block) = self.take_first_fit(size, align) {
            return Ok(block.payload());
        }
        self.bump(size, align)
    }

    /// `allocate(count * size)` with the payload zero-filled.
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        let total = count
            .checked_mul(size)
            .ok_or(AllocError::Overflow { count, size })?;
        let payload = self.allocate(total)?;
        // SAFETY: the block has at least `total` bytes of capacity.
        unsafe { ptr::write_bytes(payload.as_ptr(), 0, total) };
        Ok(payload)
    }

    /// Push the block owning `ptr` onto the free list. Null is ignored.
    ///
    /// With `free-checks`, pointers outside the claimed region, misaligned
    /// pointers and blocks that are already free are rejected before
    /// anything is modified. An aligned pointer into the middle of a block
    /// is rejected only if the 16 bytes before it do not read as an
    /// allocated header.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer returned by this arena. Without
    /// `free-checks` a foreign or repeated release corrupts the free list.
    pub unsafe fn release(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        let Some(payload) = NonNull::new(ptr) else {
            return Ok(());
        };
        let block = self.block_for(payload)?;
        block.set_link(Link::to(self.free_head));
        self.free_head = Some(block);
        Ok(())
    }

    /// Grow-only resize.
    ///
    /// - null `ptr`: same as [`Arena::allocate`].
    /// - `new_size == 0`: releases `ptr` and returns null.
    /// - `new_size` within the recorded capacity: returns `ptr` untouched.
    /// - otherwise: moves the contents (the old capacity, never more) into a
    ///   new block and releases the old one. On failure the old block is
    ///   left as it was.
    ///
    /// # Safety
    /// Same contract as [`Arena::release`].
    pub unsafe fn resize(&mut self, ptr: *mut u8, new_size: usize) -> Result<*mut u8, AllocError> {
        self.resize_aligned(ptr, new_size, MIN_ALIGN)
    }

    /// [`Arena::resize`] where a replacement block honours `align`.
    ///
    /// # Safety
    /// Same contract as [`Arena::release`]; `ptr` must already be aligned to
    /// `align`.
    pub unsafe fn resize_aligned(
        &mut self,
        ptr: *mut u8,
        new_size: usize,
        align: usize,
    ) -> Result<*mut u8, AllocError> {
        let Some(payload) = NonNull::new(ptr) else {
            return self.allocate_aligned(new_size, align).map(NonNull::as_ptr);
        };
        if new_size == 0 {
            self.release(ptr)?;
            return Ok(ptr::null_mut());
        }

        let block = self.block_for(payload)?;
        let old_size = block.size();
        if new_size <= old_size {
            return Ok(ptr);
        }

        let fresh = self.allocate_aligned(new_size, align)?;
        ptr::copy_nonoverlapping(ptr, fresh.as_ptr(), old_size);
        self.release(ptr)?;
        Ok(fresh.as_ptr())
    }

    /// Recorded capacity of the block owning `ptr`; 0 for null.
    ///
    /// # Safety
    /// `ptr` must be null or a pointer returned by this arena.
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        match NonNull::new(ptr) {
            Some(payload) => BlockHeader::from_payload(payload).size(),
            None => 0,
        }
    }

    /// True if `ptr` lies in the part of the arena that has been carved.
    pub fn owns(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        self.is_initialized() && addr >= self.base + HEADER_SIZE && addr <= self.frontier
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn frontier(&self) -> usize {
        self.frontier
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes left between the frontier and the limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.frontier
    }

    /// Payload address of the free-list head, if any.
    pub fn free_list_head(&self) -> Option<NonNull<u8>> {
        self.free_head.map(BlockHeader::payload)
    }

    /// Free blocks as `(payload, capacity)`, in reuse order.
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            cursor: self.free_head,
            budget: (self.frontier - self.base) / HEADER_SIZE,
            arena: self,
        }
    }

    pub fn stats(&self) -> ArenaStats {
        let (free_blocks, free_bytes) = self
            .free_blocks()
            .fold((0, 0), |(n, bytes), (_, size)| (n + 1, bytes + size));
        ArenaStats {
            reserved: self.limit - self.base,
            claimed: self.frontier - self.base,
            free_blocks,
            free_bytes,
        }
    }

    /// Walk the free list, checking that every node is a plausible free
    /// header inside the claimed region and that the walk terminates.
    pub fn check_integrity(&self) -> Result<IntegrityReport, AllocError> {
        // More nodes than can physically fit means the walk revisited one.
        let max_nodes = (self.frontier - self.base) / HEADER_SIZE;
        let mut report = IntegrityReport::default();
        let mut cursor = self.free_head;

        while let Some(block) = cursor {
            let addr = block.addr();
            let corrupt = AllocError::CorruptFreeList { addr };
            if report.free_blocks >= max_nodes || !self.holds_header(addr) {
                return Err(corrupt);
            }

            // SAFETY: addr is a header-sized, aligned slot inside the mapping.
            let (size, link) = unsafe { (block.size(), block.link()) };
            if size > self.frontier - addr - HEADER_SIZE {
                return Err(corrupt);
            }
            cursor = match link {
                Link::NotLinked => return Err(corrupt),
                Link::End => None,
                Link::Next(next) => Some(next),
            };

            report.free_blocks += 1;
            report.free_bytes += size;
        }
        Ok(report)
    }

    /// True if a whole, aligned header starting at `addr` lies in the
    /// claimed region.
    #[inline]
    fn holds_header(&self, addr: usize) -> bool {
        addr >= self.base
            && addr <= self.frontier.saturating_sub(HEADER_SIZE)
            && is_aligned(addr, MIN_ALIGN)
    }

    /// Unlink and return the first free block with enough capacity and a
    /// suitably aligned payload.
    fn take_first_fit(&mut self, size: usize, align: usize) -> Option<BlockHeader> {
        let mut prev: Option<BlockHeader> = None;
        let mut cursor = self.free_head;

        while let Some(block) = cursor {
            // SAFETY: every node was pushed by `release` and lies inside the
            // mapping.
            unsafe {
                let next = block.next_free();
                let aligned = is_aligned(block.payload().as_ptr() as usize, align);
                if aligned && block.size() >= size {
                    match prev {
                        Some(p) => p.set_link(Link::to(next)),
                        None => self.free_head = next,
                    }
                    block.set_link(Link::NotLinked);
                    return Some(block);
                }
                prev = Some(block);
                cursor = next;
            }
        }
        None
    }

    /// Carve a new block at the frontier. Leaves the arena untouched if the
    /// block would pass the limit.
    fn bump(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        let exhausted = AllocError::Exhausted { requested: size };
        let capacity = checked_align_up(size, MIN_ALIGN).ok_or(exhausted)?;
        let payload = self
            .frontier
            .checked_add(HEADER_SIZE)
            .and_then(|p| checked_align_up(p, align))
            .ok_or(exhausted)?;
        let end = payload.checked_add(capacity).ok_or(exhausted)?;
        if end > self.limit {
            return Err(exhausted);
        }

        // SAFETY: [payload - HEADER_SIZE, end) is unclaimed arena memory.
        let block = unsafe {
            let block = BlockHeader::at(NonNull::new_unchecked((payload - HEADER_SIZE) as *mut u8));
            block.init(capacity);
            block
        };
        self.frontier = end;
        Ok(block.payload())
    }

    #[inline]
    unsafe fn block_for(&self, payload: NonNull<u8>) -> Result<BlockHeader, AllocError> {
        #[cfg(feature = "free-checks")]
        self.check_live(payload)?;
        Ok(BlockHeader::from_payload(payload))
    }

    #[cfg(feature = "free-checks")]
    unsafe fn check_live(&self, payload: NonNull<u8>) -> Result<(), AllocError> {
        let addr = payload.as_ptr() as usize;
        let foreign = AllocError::ForeignPointer { addr };
        if !self.owns(payload.as_ptr()) || !is_aligned(addr, MIN_ALIGN) {
            return Err(foreign);
        }
        let block = BlockHeader::from_payload(payload);
        if block.size() > self.frontier - addr {
            return Err(foreign);
        }
        if !block.is_allocated() {
            return Err(AllocError::DoubleFree { addr });
        }
        Ok(())
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if self.is_initialized() {
            // SAFETY: base/limit describe the mapping made in `reserve`.
            unsafe { platform::unmap(self.base as *mut u8, self.limit - self.base) };
        }
    }
}

/// Iterator returned by [`Arena::free_blocks`].
///
/// Stops at the first node outside the claimed region, and after as many
/// nodes as could fit in it, so a corrupted list ends the walk early
/// instead of reading wild memory or spinning forever.
pub struct FreeBlocks<'a> {
    cursor: Option<BlockHeader>,
    budget: usize,
    arena: &'a Arena,
}

impl Iterator for FreeBlocks<'_> {
    type Item = (NonNull<u8>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.cursor?;
        if self.budget == 0 || !self.arena.holds_header(block.addr()) {
            self.cursor = None;
            return None;
        }
        self.budget -= 1;
        // SAFETY: the shared borrow of the arena keeps the list unchanged.
        unsafe {
            self.cursor = block.next_free();
            Some((block.payload(), block.size()))
        }
    }
}
