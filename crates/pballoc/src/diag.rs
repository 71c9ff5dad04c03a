//! Allocation-free diagnostics.
//!
//! Nothing here may touch the heap: messages are formatted into a fixed stack
//! buffer and written straight to the file descriptor.

use crate::error::AllocError;
use crate::platform;
use core::fmt::{self, Write};

const STDOUT: libc::c_int = 1;
const STDERR: libc::c_int = 2;

/// Printed once when the process heap has been reserved.
pub const INIT_MARKER: &[u8] = b"pb!\n";

/// Printed when the process heap cannot be reserved.
pub const RESERVE_FAILED: &[u8] = b"mmap failed!\n";

/// Fixed-capacity message buffer. Output past the capacity is dropped.
pub struct StackMessage {
    buf: [u8; 192],
    len: usize,
}

impl StackMessage {
    pub const fn new() -> Self {
        StackMessage {
            buf: [0; 192],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Write for StackMessage {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buf.len() - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

/// Emit the one-time initialization marker on stdout.
pub fn announce() {
    platform::write_fd(STDOUT, INIT_MARKER);
    platform::sync_fd(STDOUT);
}

/// Render `err` as a single `pballoc: ...` line.
pub fn render(err: &AllocError) -> StackMessage {
    let mut msg = StackMessage::new();
    let _ = writeln!(msg, "pballoc: {}", err);
    msg
}

/// Report a non-fatal error on stderr.
pub fn report(err: &AllocError) {
    platform::write_fd(STDERR, render(err).as_bytes());
}

/// Abort with a diagnostic message to stderr.
/// This is used when heap misuse is detected.
#[cold]
#[inline(never)]
pub fn abort_with_error(err: &AllocError) -> ! {
    report(err);
    unsafe { libc::abort() }
}

/// Terminate the process because the heap could not be reserved.
#[cold]
#[inline(never)]
pub fn exit_reservation_failed() -> ! {
    platform::write_fd(STDERR, RESERVE_FAILED);
    unsafe { libc::_exit(1) }
}
