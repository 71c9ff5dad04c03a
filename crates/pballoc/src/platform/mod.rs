use core::sync::atomic::AtomicI32;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "linux")]
pub use linux as sys;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
pub use macos as sys;

/// Reserve `size` bytes of private, anonymous, read-write memory.
/// Returns null on failure.
///
/// # Safety
/// Caller must ensure `size` is page-aligned and non-zero.
#[inline]
pub unsafe fn map_anonymous(size: usize) -> *mut u8 {
    sys::map_anonymous(size)
}

/// Unmap previously mapped memory.
///
/// # Safety
/// `ptr` must have been returned by `map_anonymous` and `size` must match.
#[inline]
pub unsafe fn unmap(ptr: *mut u8, size: usize) {
    sys::unmap(ptr, size);
}

/// Write all of `bytes` to `fd`, retrying on short writes and EINTR.
/// Errors are dropped: there is nowhere left to report them.
pub fn write_fd(fd: libc::c_int, bytes: &[u8]) {
    let mut rest = bytes;
    while !rest.is_empty() {
        let n = unsafe { libc::write(fd, rest.as_ptr() as *const libc::c_void, rest.len()) };
        if n > 0 {
            rest = &rest[n as usize..];
        } else if n < 0 && errno() == libc::EINTR {
            continue;
        } else {
            return;
        }
    }
}

/// Flush `fd` to its backing device. Failures (e.g. fd is a pipe) are ignored.
pub fn sync_fd(fd: libc::c_int) {
    unsafe {
        libc::fsync(fd);
    }
}

/// Read the calling thread's errno.
#[inline]
pub fn errno() -> libc::c_int {
    unsafe { *sys::errno_location() }
}

/// Set the calling thread's errno.
#[inline]
pub fn set_errno(code: libc::c_int) {
    unsafe {
        *sys::errno_location() = code;
    }
}

/// Block while `word` still holds `expected` (may wake spuriously).
/// The caller's errno is preserved.
#[inline]
pub fn wait_on(word: &AtomicI32, expected: i32) {
    let saved = errno();
    sys::wait_on(word, expected);
    set_errno(saved);
}

/// Wake one thread blocked in [`wait_on`] for `word`.
#[inline]
pub fn wake_one(word: &AtomicI32) {
    sys::wake_one(word);
}
