#![no_main]

use libfuzzer_sys::fuzz_target;
use pballoc::Arena;
use std::ptr;

/// Fuzz target that interprets a byte slice as a sequence of arena operations
/// and checks every reuse decision against a shadow free list.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=allocate, 1=release, 2=resize, 3=zero_allocate)
///   byte 1-2: size (little-endian u16)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// We track up to 64 live pointers.
const MAX_SLOTS: usize = 64;
const ARENA_SIZE: usize = 1 << 20;

struct Shadow {
    /// (payload address, capacity), head first.
    free: Vec<(usize, usize)>,
}

impl Shadow {
    fn expect_fit(&mut self, size: usize) -> Option<(usize, usize)> {
        let i = self.free.iter().position(|&(_, cap)| cap >= size)?;
        Some(self.free.remove(i))
    }

    fn push(&mut self, addr: usize, cap: usize) {
        self.free.insert(0, (addr, cap));
    }
}

/// Allocate through `f`, asserting the result matches the shadow's first fit.
fn checked_alloc(
    arena: &mut Arena,
    shadow: &mut Shadow,
    size: usize,
    f: impl FnOnce(&mut Arena) -> Result<ptr::NonNull<u8>, pballoc::AllocError>,
) -> Option<*mut u8> {
    let expected = shadow.expect_fit(size);
    match f(arena) {
        Ok(p) => {
            let cap = unsafe { arena.usable_size(p.as_ptr()) };
            if let Some(fit) = expected {
                assert_eq!((p.as_ptr() as usize, cap), fit, "first-fit mismatch");
            } else {
                assert_eq!(cap, (size + 15) & !15);
            }
            Some(p.as_ptr())
        }
        Err(_) => {
            assert!(expected.is_none(), "reusable block ignored");
            None
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut arena = Arena::new(ARENA_SIZE);
    let mut shadow = Shadow { free: Vec::new() };
    let mut slots: [*mut u8; MAX_SLOTS] = [ptr::null_mut(); MAX_SLOTS];
    let mut sizes: [usize; MAX_SLOTS] = [0; MAX_SLOTS];

    let release = |arena: &mut Arena, shadow: &mut Shadow, p: *mut u8| unsafe {
        let cap = arena.usable_size(p);
        arena.release(p).expect("release of live block");
        shadow.push(p as usize, cap);
    };

    let mut i = 0;
    while i + 4 <= data.len() {
        let opcode = data[i] & 0x03;
        let size = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize;
        let slot = (data[i + 3] as usize) % MAX_SLOTS;
        i += 4;

        match opcode {
            0 => {
                if !slots[slot].is_null() {
                    release(&mut arena, &mut shadow, slots[slot]);
                    slots[slot] = ptr::null_mut();
                }
                if let Some(p) = checked_alloc(&mut arena, &mut shadow, size, |a| a.allocate(size)) {
                    unsafe { ptr::write_bytes(p, 0xAA, size) };
                    slots[slot] = p;
                    sizes[slot] = size;
                }
            }
            1 => {
                if !slots[slot].is_null() {
                    let bytes = unsafe { std::slice::from_raw_parts(slots[slot], sizes[slot]) };
                    assert!(bytes.iter().all(|&b| b == 0xAA), "live block clobbered");
                    release(&mut arena, &mut shadow, slots[slot]);
                    slots[slot] = ptr::null_mut();
                }
            }
            2 => {
                let old = slots[slot];
                if old.is_null() {
                    continue;
                }
                let cap = unsafe { arena.usable_size(old) };
                if size == 0 {
                    let r = unsafe { arena.resize(old, 0) }.expect("resize to zero");
                    assert!(r.is_null());
                    shadow.push(old as usize, cap);
                    slots[slot] = ptr::null_mut();
                } else if size <= cap {
                    let r = unsafe { arena.resize(old, size) }.expect("in-place resize");
                    assert_eq!(r, old, "resize within capacity moved the block");
                    unsafe { ptr::write_bytes(r, 0xAA, size) };
                    sizes[slot] = size;
                } else {
                    // The old block is still live while the new one is found.
                    let expected = shadow.expect_fit(size);
                    match unsafe { arena.resize(old, size) } {
                        Ok(r) => {
                            if let Some((addr, _)) = expected {
                                assert_eq!(r as usize, addr, "first-fit mismatch on grow");
                            }
                            let bytes = unsafe { std::slice::from_raw_parts(r, sizes[slot]) };
                            assert!(bytes.iter().all(|&b| b == 0xAA), "grow lost contents");
                            shadow.push(old as usize, cap);
                            unsafe { ptr::write_bytes(r, 0xAA, size) };
                            slots[slot] = r;
                            sizes[slot] = size;
                        }
                        Err(_) => assert!(expected.is_none()),
                    }
                }
            }
            3 => {
                if !slots[slot].is_null() {
                    release(&mut arena, &mut shadow, slots[slot]);
                    slots[slot] = ptr::null_mut();
                }
                let nmemb = size >> 8;
                let elem = size & 0xFF;
                let total = nmemb * elem;
                if let Some(p) =
                    checked_alloc(&mut arena, &mut shadow, total, |a| a.zero_allocate(nmemb, elem))
                {
                    let bytes = unsafe { std::slice::from_raw_parts(p, total) };
                    assert!(bytes.iter().all(|&b| b == 0), "zero_allocate not zeroed");
                    unsafe { ptr::write_bytes(p, 0xAA, total) };
                    slots[slot] = p;
                    sizes[slot] = total;
                }
            }
            _ => unreachable!(),
        }
    }

    let listed: Vec<(usize, usize)> = arena
        .free_blocks()
        .map(|(p, cap)| (p.as_ptr() as usize, cap))
        .collect();
    assert_eq!(listed, shadow.free);
    arena.check_integrity().expect("arena integrity");
});
