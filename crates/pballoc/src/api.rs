//! C allocator entry points over the process heap.
//!
//! With the `export-symbols` feature these are exported unmangled, so the
//! cdylib can replace the platform allocator (`LD_PRELOAD` or link order).
//! Without it they are ordinary Rust functions with C calling convention.

use crate::error::AllocError;
use crate::init::with_heap;
use crate::util::MIN_ALIGN;
use crate::{config, diag, platform};
use core::ffi::c_void;
use core::ptr::{self, NonNull};

/// Map an arena error onto the libc convention: NULL plus errno for
/// resource failures, abort for detected misuse.
#[cold]
fn fail(err: AllocError) -> *mut c_void {
    match err {
        AllocError::Exhausted { .. } if config::abort_on_oom() => diag::abort_with_error(&err),
        AllocError::Exhausted { .. }
        | AllocError::Overflow { .. }
        | AllocError::ReservationFailed { .. } => {
            platform::set_errno(libc::ENOMEM);
            ptr::null_mut()
        }
        AllocError::InvalidAlignment { .. } => {
            platform::set_errno(libc::EINVAL);
            ptr::null_mut()
        }
        AllocError::ForeignPointer { .. }
        | AllocError::DoubleFree { .. }
        | AllocError::CorruptFreeList { .. } => diag::abort_with_error(&err),
    }
}

#[inline]
fn returned(result: Result<NonNull<u8>, AllocError>) -> *mut c_void {
    match result {
        Ok(p) => p.as_ptr() as *mut c_void,
        Err(err) => fail(err),
    }
}

// ============================================================================
// Standard C allocator API
// ============================================================================

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    returned(with_heap(|heap| heap.allocate(size)))
}

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    if let Err(err) = with_heap(|heap| heap.release(ptr as *mut u8)) {
        fail(err);
    }
}

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    returned(with_heap(|heap| heap.zero_allocate(nmemb, size)))
}

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    match with_heap(|heap| heap.resize(ptr as *mut u8, size)) {
        Ok(p) => p as *mut c_void,
        Err(err) => fail(err),
    }
}

// ============================================================================
// Aligned allocation
// ============================================================================

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn posix_memalign(
    memptr: *mut *mut c_void,
    alignment: usize,
    size: usize,
) -> libc::c_int {
    if memptr.is_null() {
        return libc::EINVAL;
    }

    // alignment must be a power of 2 and a multiple of sizeof(void*)
    if !alignment.is_power_of_two() || alignment < core::mem::size_of::<*mut c_void>() {
        return libc::EINVAL;
    }

    match with_heap(|heap| heap.allocate_aligned(size, alignment)) {
        Ok(p) => {
            *memptr = p.as_ptr() as *mut c_void;
            0
        }
        // Errors go out through the return value only; errno is untouched.
        Err(err @ AllocError::Exhausted { .. }) if config::abort_on_oom() => {
            diag::abort_with_error(&err)
        }
        Err(AllocError::Exhausted { .. })
        | Err(AllocError::Overflow { .. })
        | Err(AllocError::ReservationFailed { .. }) => libc::ENOMEM,
        Err(AllocError::InvalidAlignment { .. }) => libc::EINVAL,
        Err(
            err @ (AllocError::ForeignPointer { .. }
            | AllocError::DoubleFree { .. }
            | AllocError::CorruptFreeList { .. }),
        ) => diag::abort_with_error(&err),
    }
}

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn aligned_alloc(alignment: usize, size: usize) -> *mut c_void {
    // C11: size must be a multiple of alignment
    if !alignment.is_power_of_two() || (size % alignment != 0 && size != 0) {
        platform::set_errno(libc::EINVAL);
        return ptr::null_mut();
    }
    returned(with_heap(|heap| heap.allocate_aligned(size, alignment)))
}

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn memalign(alignment: usize, size: usize) -> *mut c_void {
    if !alignment.is_power_of_two() {
        platform::set_errno(libc::EINVAL);
        return ptr::null_mut();
    }
    returned(with_heap(|heap| heap.allocate_aligned(size, alignment.max(MIN_ALIGN))))
}

// ============================================================================
// GNU extensions
// ============================================================================

#[cfg_attr(feature = "export-symbols", no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
    if ptr.is_null() {
        return 0;
    }
    with_heap(|heap| heap.usable_size(ptr as *mut u8))
}
