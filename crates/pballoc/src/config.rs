use crate::util::{gib, kib, mib};
use core::sync::atomic::{AtomicBool, Ordering};

/// Size of the process heap reservation.
///
/// Fixed at build time: set `PBALLOC_HEAP_SIZE` (bytes, or with a `K`, `M`
/// or `G` suffix) when compiling to override the 2 GiB default.
pub const HEAP_SIZE: usize = match option_env!("PBALLOC_HEAP_SIZE") {
    Some(text) => match parse_size(text.as_bytes()) {
        Some(size) => size,
        None => panic!("PBALLOC_HEAP_SIZE must be a byte count with optional K/M/G suffix"),
    },
    None => gib(2),
};

/// Cached config values (read once at init, never allocate).
static QUIET: AtomicBool = AtomicBool::new(false);
static ABORT_ON_OOM: AtomicBool = AtomicBool::new(false);

/// Read configuration from environment variables.
/// Must be called during init, before any allocations.
///
/// # Safety
/// Must be called from single-threaded context (init).
pub unsafe fn read_config() {
    QUIET.store(getenv_flag(b"PBALLOC_QUIET\0"), Ordering::Relaxed);
    ABORT_ON_OOM.store(getenv_flag(b"PBALLOC_ABORT_ON_OOM\0"), Ordering::Relaxed);
}

/// Suppress the one-time `pb!` marker on stdout.
pub fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Abort instead of returning NULL when the heap reservation is used up.
pub fn abort_on_oom() -> bool {
    ABORT_ON_OOM.load(Ordering::Relaxed)
}

/// Parse `"4096"`, `"64K"`, `"512M"`, `"2G"` (suffix case-insensitive).
pub const fn parse_size(text: &[u8]) -> Option<usize> {
    let mut len = text.len();
    if len == 0 {
        return None;
    }
    let unit = match text[len - 1] {
        b'k' | b'K' => kib(1),
        b'm' | b'M' => mib(1),
        b'g' | b'G' => gib(1),
        _ => 1,
    };
    if unit != 1 {
        len -= 1;
        if len == 0 {
            return None;
        }
    }

    let mut value: usize = 0;
    let mut i = 0;
    while i < len {
        let byte = text[i];
        if byte < b'0' || byte > b'9' {
            return None;
        }
        value = match value.checked_mul(10) {
            Some(v) => match v.checked_add((byte - b'0') as usize) {
                Some(v) => v,
                None => return None,
            },
            None => return None,
        };
        i += 1;
    }
    if value == 0 {
        return None;
    }
    value.checked_mul(unit)
}

/// True if the variable is set to anything other than an empty string or `0`.
///
/// # Safety
/// Calls libc::getenv, which is not thread-safe.
unsafe fn getenv_flag(key: &[u8]) -> bool {
    let val = libc::getenv(key.as_ptr() as *const libc::c_char);
    if val.is_null() {
        return false;
    }
    let first = *(val as *const u8);
    let second = if first == 0 { 0 } else { *(val as *const u8).add(1) };
    !(first == 0 || (first == b'0' && second == 0))
}
