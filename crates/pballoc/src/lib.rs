//! # pballoc
//!
//! A pointer-bumping `malloc` replacement. The whole heap is one anonymous
//! mapping of [`HEAP_SIZE`] bytes reserved on the first allocation; blocks
//! are carved from it front to back, and released blocks go on a LIFO free
//! list that later requests scan first-fit.
//!
//! - [`Arena`] is the allocator proper: an owned value with no hidden global
//!   state, usable on its own (tests build as many as they like).
//! - [`init`] holds the process heap, one `Arena` behind a futex lock.
//! - [`api`] provides `malloc`, `free`, `calloc`, `realloc` and friends on
//!   top of the process heap; build with `--features export-symbols` to
//!   export them from the cdylib.
//! - `PbAlloc` (feature `global-allocator`) is a `#[global_allocator]`.
//!
//! Blocks are never split, coalesced, shrunk or returned to the OS.

extern crate libc;

pub mod api;
pub mod arena;
pub mod config;
pub mod diag;
pub mod error;
mod fork;
#[cfg(feature = "global-allocator")]
pub mod global_alloc;
pub mod header;
pub mod init;
pub mod platform;
pub mod sync;
pub mod util;

pub use arena::{Arena, ArenaStats, FreeBlocks, IntegrityReport};
pub use config::HEAP_SIZE;
pub use error::AllocError;
#[cfg(feature = "global-allocator")]
pub use global_alloc::PbAlloc;
pub use header::HEADER_SIZE;
pub use util::MIN_ALIGN;
