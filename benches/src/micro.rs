/// Microbenchmarks for pballoc.
///
/// The allocator ships as a cdylib, so these programs are built with plain
/// rustc and run under LD_PRELOAD of a library built with
/// `--features export-symbols`:
///
///   rustc -O benches/src/micro.rs -o target/micro
///   LD_PRELOAD=target/release/libpballoc.so PBALLOC_QUIET=1 target/micro

use std::hint::black_box;
use std::time::Instant;

extern "C" {
    fn malloc(size: usize) -> *mut u8;
    fn free(ptr: *mut u8);
    fn calloc(nmemb: usize, size: usize) -> *mut u8;
    fn realloc(ptr: *mut u8, size: usize) -> *mut u8;
}

fn allocator_name() -> String {
    std::env::var("ALLOCATOR_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn ns_per_op(start: Instant, ops: usize) -> f64 {
    start.elapsed().as_nanos() as f64 / ops as f64
}

/// malloc/free of one size: after the first round every request is served
/// by the free-list head.
fn bench_malloc_free(size: usize, iterations: usize) -> f64 {
    for _ in 0..1000 {
        unsafe {
            let ptr = malloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, size.min(64));
            free(black_box(ptr));
        }
    }
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = malloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, size.min(64));
            free(black_box(ptr));
        }
    }
    ns_per_op(start, iterations)
}

fn bench_calloc_free(size: usize, iterations: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = calloc(black_box(1), black_box(size));
            free(black_box(ptr));
        }
    }
    ns_per_op(start, iterations)
}

/// Every step past the block's capacity moves it; the old block joins the
/// free list.
fn bench_realloc_grow(iterations: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let mut ptr = malloc(black_box(16));
            for &size in black_box(&[32usize, 64, 128, 256, 512, 1024]) {
                ptr = realloc(black_box(ptr), size);
            }
            free(black_box(ptr));
        }
    }
    ns_per_op(start, iterations)
}

/// Cost of a first-fit scan that has to pass `depth` too-small blocks
/// before it finds one that fits. Only the scanning malloc is timed; the
/// list is rebuilt between rounds.
fn bench_first_fit_depth(depth: usize, iterations: usize) -> f64 {
    unsafe {
        let mut big = malloc(4096);
        let mut small: Vec<*mut u8> = (0..depth).map(|_| malloc(16)).collect();
        let mut total = std::time::Duration::ZERO;

        for _ in 0..iterations {
            // Free list: depth small blocks, then the big one.
            free(big);
            for &p in &small {
                free(p);
            }

            let start = Instant::now();
            big = malloc(black_box(4096));
            total += start.elapsed();

            for p in small.iter_mut() {
                *p = malloc(16);
            }
        }

        free(big);
        for p in small {
            free(p);
        }
        total.as_nanos() as f64 / iterations as f64
    }
}

fn bench_threaded_throughput(num_threads: usize, ops_per_thread: usize, size: usize) -> f64 {
    let start = Instant::now();
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            std::thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    unsafe {
                        let ptr = malloc(black_box(size));
                        std::ptr::write_bytes(ptr, 0xCD, size.min(16));
                        free(black_box(ptr));
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    let total_ops = num_threads * ops_per_thread;
    total_ops as f64 / start.elapsed().as_secs_f64()
}

fn main() {
    let iterations = 1_000_000;
    let name = allocator_name();

    println!("=== microbenchmarks ({}) ===\n", name);

    let mut latencies: Vec<(usize, f64)> = Vec::new();
    let mut key_throughput_1t = 0.0f64;
    let mut key_throughput_4t = 0.0f64;

    println!("--- malloc/free latency (ns/op) ---");
    for &size in &[16, 32, 64, 128, 256, 512, 1024, 4096, 16384, 65536, 262144] {
        let ns = bench_malloc_free(size, iterations);
        println!("  size={:>8}: {:>8.1} ns", size, ns);
        latencies.push((size, ns));
    }

    println!("\n--- calloc/free latency (ns/op) ---");
    for &size in &[16, 64, 256, 1024, 4096, 65536] {
        let ns = bench_calloc_free(size, iterations);
        println!("  size={:>8}: {:>8.1} ns", size, ns);
    }

    println!("\n--- realloc grow pattern (ns/op) ---");
    let ns = bench_realloc_grow(iterations / 10);
    println!("  16->1024: {:.1} ns", ns);

    println!("\n--- first-fit scan depth (ns/op) ---");
    for &depth in &[0, 16, 256, 4096] {
        let ns = bench_first_fit_depth(depth, 10_000);
        println!("  depth={:>5}: {:>10.1} ns", depth, ns);
    }

    println!("\n--- multi-threaded throughput (Mops/sec) ---");
    for &threads in &[1, 2, 4, 8] {
        let mops = bench_threaded_throughput(threads, iterations / threads, 64) / 1_000_000.0;
        println!("  threads={}: {:>6.2} Mops/sec", threads, mops);
        if threads == 1 {
            key_throughput_1t = mops;
        }
        if threads == 4 {
            key_throughput_4t = mops;
        }
    }

    print!("\nSUMMARY|{}", name);
    for &(size, ns) in &latencies {
        print!("|latency_{}={:.1}", size, ns);
    }
    println!(
        "|throughput_1t={:.2}|throughput_4t={:.2}",
        key_throughput_1t, key_throughput_4t
    );
}
