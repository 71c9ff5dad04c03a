/// Align `value` up to the next multiple of `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Like [`align_up`], but returns `None` instead of wrapping past `usize::MAX`.
#[inline(always)]
pub const fn checked_align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Check if `value` is aligned to `align`.
#[inline(always)]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Minimum alignment for all payloads (matches max_align_t on 64-bit).
pub const MIN_ALIGN: usize = 16;

pub const fn kib(n: usize) -> usize {
    n * 1024
}

pub const fn mib(n: usize) -> usize {
    kib(n) * 1024
}

pub const fn gib(n: usize) -> usize {
    mib(n) * 1024
}

/// Runtime page size, initialized from sysconf(_SC_PAGESIZE) on first use.
static PAGE_SIZE_CACHED: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);

/// Get the system page size, querying the OS once. Falls back to 4096.
#[inline]
pub fn page_size() -> usize {
    use core::sync::atomic::Ordering;

    let cached = PAGE_SIZE_CACHED.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }
    let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let ps = if ps > 0 { ps as usize } else { 4096 };
    PAGE_SIZE_CACHED.store(ps, Ordering::Relaxed);
    ps
}
