//! The process heap: one [`Arena`] of [`HEAP_SIZE`] bytes behind a lock.

use crate::arena::Arena;
use crate::config::{self, HEAP_SIZE};
use crate::sync::Mutex;
use crate::{diag, fork, platform};
use core::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

static INIT_STATE: AtomicU8 = AtomicU8::new(UNINIT);

static HEAP: Mutex<Arena> = Mutex::new(Arena::new(HEAP_SIZE));

/// Reserve the process heap on first use.
///
/// Reads the environment config and maps the arena, printing the `pb!`
/// marker once it exists; the fork handler is registered last. A failed
/// reservation terminates the process.
#[cold]
#[inline(never)]
fn initialize() {
    match INIT_STATE.compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {}
        Err(INITIALIZING) => {
            while INIT_STATE.load(Ordering::Acquire) == INITIALIZING {
                core::hint::spin_loop();
            }
            return;
        }
        Err(_) => return,
    }

    // fsync on a pipe and the atfork registration may set errno.
    let saved_errno = platform::errno();
    unsafe { config::read_config() };

    match HEAP.lock().ensure_initialized() {
        Ok(true) if !config::quiet() => diag::announce(),
        Ok(_) => {}
        Err(_) => diag::exit_reservation_failed(),
    }

    INIT_STATE.store(READY, Ordering::Release);

    // After READY: libc may allocate while registering the handler.
    unsafe { fork::register_atfork() };
    platform::set_errno(saved_errno);
}

#[inline(always)]
pub fn ensure_initialized() {
    if INIT_STATE.load(Ordering::Acquire) != READY {
        initialize();
    }
}

/// Run `f` on the process heap inside its critical section.
///
/// `f` must not allocate through the process heap: the lock is not
/// reentrant.
#[inline]
pub fn with_heap<R>(f: impl FnOnce(&mut Arena) -> R) -> R {
    ensure_initialized();
    let mut heap = HEAP.lock();
    f(&mut heap)
}

/// Release the heap lock in a fork child.
///
/// # Safety
/// Must only be called in the child right after `fork()`.
pub(crate) unsafe fn reset_lock_after_fork() {
    HEAP.reset_after_fork();
}
