//! Fork safety.
//!
//! A thread other than the forking one may hold the heap lock at the moment
//! of `fork()`. That thread does not exist in the child, so the child's copy
//! of the lock would stay held forever. The child handler clears it; the
//! arena itself is copy-on-write and needs nothing.

unsafe extern "C" fn atfork_child() {
    crate::init::reset_lock_after_fork();
}

/// Register the pthread_atfork handler. Must be called once during init.
///
/// # Safety
/// Must be called from the initialization path.
pub unsafe fn register_atfork() {
    libc::pthread_atfork(None, None, Some(atfork_child));
}
