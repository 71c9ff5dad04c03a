#![no_main]

use libfuzzer_sys::fuzz_target;
use pballoc::{AllocError, Arena, MIN_ALIGN};

// Fuzz target that exercises size boundaries and alignment.
// Interprets input as a series of (size, alignment_shift) records,
// allocates from a private arena, writes to the full extent,
// verifies alignment and capacity, and releases.

fuzz_target!(|data: &[u8]| {
    let mut arena = Arena::new(8 << 20);

    let mut i = 0;
    while i + 5 <= data.len() {
        let raw_size = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        let shift = data[i + 4] % 13;
        i += 5;

        // Cap size so a run of records exercises reuse rather than exhaustion.
        let size = (raw_size as usize) % (256 * 1024);
        let align = 1usize << shift;

        let ptr = match arena.allocate_aligned(size, align) {
            Ok(p) => p.as_ptr(),
            Err(AllocError::Exhausted { .. }) => continue,
            Err(e) => panic!("allocate_aligned({}, {}) failed: {}", size, align, e),
        };

        assert_eq!(ptr as usize % align.max(MIN_ALIGN), 0, "misaligned {:p}", ptr);

        let usable = unsafe { arena.usable_size(ptr) };
        assert!(usable >= size, "usable_size {} < requested {}", usable, size);
        assert_eq!(usable % MIN_ALIGN, 0);

        unsafe {
            std::ptr::write_bytes(ptr, 0xBB, usable);
            arena.release(ptr).expect("release");
        }

        // Zero-fill applies to recycled blocks too.
        if size < 65536 {
            if let Ok(p) = arena.zero_allocate(1, size) {
                let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), size) };
                assert!(bytes.iter().all(|&b| b == 0), "zero_allocate not zeroed");
                unsafe { arena.release(p.as_ptr()).expect("release") };
            }
        }
    }

    arena.check_integrity().expect("arena integrity");
});
