/// Seeded allocation traces replayed against whatever `malloc` the process
/// has, checking the C contract everywhere and pballoc's reuse order when it
/// is preloaded.
///
/// Run with: rustc -O tests/differential/trace_replay.rs -o target/trace_replay && \
///           LD_PRELOAD=target/release/libpballoc.so PBALLOC_QUIET=1 target/trace_replay
///
/// The library must be built with `--features export-symbols`. Without the
/// preload only the allocator-independent checks run.
///
/// Everything the replay loop needs is allocated before it starts, so the
/// only heap traffic during a replay is the trace itself. That is what lets
/// the reuse model predict exact addresses.

use std::collections::VecDeque;
use std::ffi::c_void;

const MAX_LIVE: usize = 4096;

#[derive(Debug, Clone, Copy)]
enum Step {
    Malloc(usize),
    Calloc(usize, usize),
    /// Release the live block chosen by the hint.
    Free(usize),
    /// Resize the live block chosen by the hint.
    Realloc(usize, usize),
}

struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, max: usize) -> usize {
        (self.next() as usize) % max
    }

    /// Mostly small requests, with an occasional page-sized one.
    fn size(&mut self) -> usize {
        match self.below(8) {
            0..=4 => self.below(128),
            5 | 6 => self.below(1024),
            _ => self.below(8192),
        }
    }
}

fn trace(seed: u64, len: usize) -> Vec<Step> {
    let mut rng = Rng(seed);
    let mut live = 0usize;
    (0..len)
        .map(|_| {
            let roll = rng.below(100);
            let step = if live >= MAX_LIVE || (roll < 35 && live > 0) {
                Step::Free(rng.below(live))
            } else if roll < 55 && live > 0 {
                Step::Realloc(rng.below(live), rng.size())
            } else if roll < 65 {
                Step::Calloc(rng.below(32), rng.below(64))
            } else {
                Step::Malloc(rng.size())
            };
            match step {
                Step::Malloc(_) | Step::Calloc(..) => live += 1,
                Step::Free(_) => live -= 1,
                Step::Realloc(_, 0) => live -= 1,
                Step::Realloc(..) => {}
            }
            step
        })
        .collect()
}

#[derive(Clone, Copy)]
struct Block {
    ptr: *mut u8,
    usable: usize,
    tag: u8,
}

/// Expected free list of blocks this replay released, most recent first.
/// Blocks freed before the replay started sit behind all of these, so a
/// prediction is only made when one of ours fits.
struct ReuseModel {
    free: VecDeque<(usize, usize)>,
}

impl ReuseModel {
    fn predict(&mut self, size: usize) -> Option<(usize, usize)> {
        let i = self.free.iter().position(|&(_, usable)| usable >= size)?;
        self.free.remove(i)
    }

    fn released(&mut self, block: &Block) {
        self.free.push_front((block.ptr as usize, block.usable));
    }
}

struct Replay {
    pballoc: bool,
    live: Vec<Block>,
    model: ReuseModel,
    next_tag: u8,
}

impl Replay {
    fn new(pballoc: bool, steps: usize) -> Self {
        Replay {
            pballoc,
            live: Vec::with_capacity(MAX_LIVE + 1),
            model: ReuseModel {
                free: VecDeque::with_capacity(steps + 1),
            },
            next_tag: 1,
        }
    }

    fn tag(&mut self) -> u8 {
        self.next_tag = self.next_tag % 250 + 1;
        self.next_tag
    }

    fn usable(ptr: *mut u8) -> usize {
        unsafe { libc::malloc_usable_size(ptr as *mut c_void) }
    }

    /// Check a fresh block and fill its whole usable range with a new tag.
    fn adopt(&mut self, ptr: *mut u8, size: usize, predicted: Option<(usize, usize)>) -> Block {
        assert!(!ptr.is_null(), "allocation of {} bytes returned NULL", size);
        assert_eq!(ptr as usize % 16, 0, "{:p} is not 16-byte aligned", ptr);
        let usable = Self::usable(ptr);
        assert!(usable >= size, "usable {} < requested {}", usable, size);
        if self.pballoc {
            assert_eq!(usable % 16, 0, "capacity {} is not a multiple of 16", usable);
            if let Some((addr, capacity)) = predicted {
                assert_eq!(ptr as usize, addr, "first-fit reuse picked the wrong block");
                assert_eq!(usable, capacity, "reused block changed capacity");
            }
        }
        let tag = self.tag();
        unsafe { std::ptr::write_bytes(ptr, tag, usable) };
        Block { ptr, usable, tag }
    }

    fn verify(block: &Block, len: usize) {
        let bytes = unsafe { std::slice::from_raw_parts(block.ptr, len) };
        if let Some(at) = bytes.iter().position(|&b| b != block.tag) {
            panic!("block {:p} clobbered at offset {} of {}", block.ptr, at, len);
        }
    }

    fn predict(&mut self, size: usize) -> Option<(usize, usize)> {
        if self.pballoc {
            self.model.predict(size)
        } else {
            None
        }
    }

    fn step(&mut self, step: Step) {
        match step {
            Step::Malloc(size) => {
                let predicted = self.predict(size);
                let ptr = unsafe { libc::malloc(size) } as *mut u8;
                let block = self.adopt(ptr, size, predicted);
                self.live.push(block);
            }
            Step::Calloc(nmemb, size) => {
                let total = nmemb * size;
                let predicted = self.predict(total);
                let ptr = unsafe { libc::calloc(nmemb, size) } as *mut u8;
                assert!(!ptr.is_null(), "calloc({}, {}) returned NULL", nmemb, size);
                let bytes = unsafe { std::slice::from_raw_parts(ptr, total) };
                assert!(bytes.iter().all(|&b| b == 0), "calloc({}, {}) not zeroed", nmemb, size);
                let block = self.adopt(ptr, total, predicted);
                self.live.push(block);
            }
            Step::Free(hint) => {
                let block = self.live.swap_remove(hint % self.live.len());
                Self::verify(&block, block.usable);
                unsafe { libc::free(block.ptr as *mut c_void) };
                self.model.released(&block);
            }
            Step::Realloc(hint, new_size) => {
                let idx = hint % self.live.len();
                let old = self.live[idx];
                Self::verify(&old, old.usable);

                if new_size <= old.usable && self.pballoc && new_size > 0 {
                    let ptr = unsafe { libc::realloc(old.ptr as *mut c_void, new_size) } as *mut u8;
                    assert_eq!(ptr, old.ptr, "realloc within capacity moved the block");
                    assert_eq!(Self::usable(ptr), old.usable, "realloc shrank the capacity");
                    return;
                }

                // The old block is still live while the new one is chosen.
                let predicted = if new_size == 0 { None } else { self.predict(new_size) };
                let ptr = unsafe { libc::realloc(old.ptr as *mut c_void, new_size) } as *mut u8;
                if new_size == 0 {
                    if self.pballoc {
                        assert!(ptr.is_null(), "realloc(p, 0) must release and return NULL");
                        self.model.released(&old);
                    } else if !ptr.is_null() {
                        unsafe { libc::free(ptr as *mut c_void) };
                    }
                    self.live.swap_remove(idx);
                    return;
                }

                assert!(!ptr.is_null(), "realloc to {} returned NULL", new_size);
                // pballoc copies exactly the old capacity; others owe the
                // smaller of the two sizes.
                let kept = Block { ptr, ..old };
                Self::verify(&kept, old.usable.min(new_size));
                if self.pballoc && ptr != old.ptr {
                    self.model.released(&old);
                }
                self.live[idx] = self.adopt(ptr, new_size, predicted);
            }
        }
    }

    fn finish(mut self) -> usize {
        let count = self.live.len();
        for block in self.live.drain(..) {
            Self::verify(&block, block.usable);
            unsafe { libc::free(block.ptr as *mut c_void) };
        }
        count
    }
}

fn main() {
    let steps: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(50_000);

    let pballoc = std::env::var_os("LD_PRELOAD")
        .map(|v| v.to_string_lossy().contains("pballoc"))
        .unwrap_or(false);

    println!(
        "trace replay: {} steps per seed, reuse model {}",
        steps,
        if pballoc { "on" } else { "off (not preloaded)" }
    );

    for seed in 0..8 {
        let plan = trace(seed, steps);
        let mut replay = Replay::new(pballoc, steps);
        for &step in &plan {
            replay.step(step);
        }
        let left = replay.finish();
        println!("  seed {}: ok ({} blocks live at the end)", seed, left);
    }
}
