use core::ptr;
use core::sync::atomic::{AtomicI32, Ordering};

pub unsafe fn map_anonymous(size: usize) -> *mut u8 {
    let result = libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
    );
    if result == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        result as *mut u8
    }
}

pub unsafe fn unmap(ptr: *mut u8, size: usize) {
    libc::munmap(ptr as *mut libc::c_void, size);
}

#[inline]
pub unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

// No public futex on macOS: yield and let the caller re-check.
pub fn wait_on(word: &AtomicI32, expected: i32) {
    if word.load(Ordering::Relaxed) == expected {
        unsafe {
            libc::sched_yield();
        }
    }
}

pub fn wake_one(_word: &AtomicI32) {}
