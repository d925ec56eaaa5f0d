//! Joinix Userspace Library
//!
//! Helpers for programs running on the Joinix kernel, plus the driver
//! programs used to exercise exec, join and the descriptor layer.
//!
//! # Example
//!
//! ```rust,no_run
//! use userlib::io;
//!
//! fn main_program(ctx: &kernel::UserContext) -> i32 {
//!     io::println(ctx, "Hello from userspace!");
//!     0
//! }
//! ```

#![no_std]

extern crate alloc;

pub mod io;
pub mod programs;

use alloc::sync::Arc;
use kernel::{ImageRegistry, Kernel, KernelBuilder};
use storage::RamFs;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::io::{print, println};
    pub use crate::uprintln;
    pub use kernel::{Fd, UserContext, STDIN, STDOUT};
}

/// Kernel on the host scheduler with every driver program installed and
/// `fs` as its file store.
pub fn boot(fs: RamFs) -> Arc<Kernel> {
    boot_with(Kernel::builder(), fs)
}

/// Same as [`boot`] but on a caller-supplied builder.
pub fn boot_with(builder: KernelBuilder, fs: RamFs) -> Arc<Kernel> {
    let registry = ImageRegistry::new();
    programs::install(&registry);
    log::debug!("[LOADER] installed {} driver programs", programs::PROGRAMS.len());
    builder
        .loader(Arc::new(registry))
        .storage(Arc::new(fs))
        .build()
}
