//! `#[global_allocator]` support for pballoc.
//!
//! ```rust,ignore
//! use pballoc::PbAlloc;
//!
//! #[global_allocator]
//! static GLOBAL: PbAlloc = PbAlloc;
//! ```

use crate::diag;
use crate::error::AllocError;
use crate::init::with_heap;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr;

/// A zero-sized unit struct that implements [`GlobalAlloc`] by delegating to
/// the process heap.
pub struct PbAlloc;

unsafe impl GlobalAlloc for PbAlloc {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Zero-size types: return a well-aligned dangling pointer.
        if layout.size() == 0 {
            return layout.align() as *mut u8;
        }
        with_heap(|heap| heap.allocate_aligned(layout.size(), layout.align()))
            .map_or(ptr::null_mut(), |p| p.as_ptr())
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let p = self.alloc(layout);
        if !p.is_null() && layout.size() != 0 {
            ptr::write_bytes(p, 0, layout.size());
        }
        p
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        if let Err(err) = with_heap(|heap| heap.release(ptr)) {
            diag::abort_with_error(&err);
        }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // Old allocation was zero-sized: this is effectively a fresh alloc.
        if layout.size() == 0 {
            return self.alloc(Layout::from_size_align_unchecked(new_size, layout.align()));
        }
        // Rust's GlobalAlloc contract guarantees new_size > 0, so the
        // release-on-zero branch of resize is never taken here.
        debug_assert!(new_size > 0, "GlobalAlloc::realloc called with new_size == 0");

        match with_heap(|heap| heap.resize_aligned(ptr, new_size, layout.align())) {
            Ok(p) => p,
            Err(AllocError::Exhausted { .. }) => ptr::null_mut(),
            Err(err) => diag::abort_with_error(&err),
        }
    }
}
