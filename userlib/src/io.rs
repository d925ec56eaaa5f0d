//! I/O functions for userspace.
//!
//! Everything goes through the calling process's descriptors; stdout is
//! descriptor 1.

use core::fmt;

use kernel::{Fd, UserContext, STDOUT};

/// Write all of `buf` to `fd`, retrying short writes. Returns false on error.
pub fn write_all(ctx: &UserContext, fd: Fd, mut buf: &[u8]) -> bool {
    while !buf.is_empty() {
        let written = ctx.write(fd, buf);
        if written <= 0 {
            return false;
        }
        buf = &buf[written as usize..];
    }
    true
}

/// Print a string to stdout.
pub fn print(ctx: &UserContext, s: &str) {
    let _ = write_all(ctx, STDOUT, s.as_bytes());
}

/// Print a string to stdout with a newline.
pub fn println(ctx: &UserContext, s: &str) {
    print(ctx, s);
    print(ctx, "\n");
}

/// `fmt::Write` adapter over stdout.
pub struct Stdout<'a>(pub &'a UserContext);

impl fmt::Write for Stdout<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if write_all(self.0, STDOUT, s.as_bytes()) {
            Ok(())
        } else {
            Err(fmt::Error)
        }
    }
}

/// Formatted print to the process's stdout.
#[macro_export]
macro_rules! uprintln {
    ($ctx:expr) => {
        $crate::io::println($ctx, "")
    };
    ($ctx:expr, $($arg:tt)*) => {{
        use core::fmt::Write as _;
        let mut out = $crate::io::Stdout($ctx);
        let _ = out.write_fmt(format_args!($($arg)*));
        let _ = out.write_str("\n");
    }};
}
