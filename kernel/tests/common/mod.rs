//! Shared fixtures for kernel integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use joinix_kernel::{ImageRegistry, Kernel, KernelConfig};
use storage::RamFs;

/// Long enough for anything that should happen.
pub const WAIT: Duration = Duration::from_secs(5);

/// Long enough to be confident something is blocked.
pub const BLOCKED: Duration = Duration::from_millis(200);

/// One-shot latch a program can wait on.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }
}

/// Registry with the small programs most tests need.
pub fn registry() -> ImageRegistry {
    let registry = ImageRegistry::new();
    registry.register("exit0.coff", |_| 0);
    registry.register("exit7.coff", |_| 7);
    registry.register("argc.coff", |ctx| ctx.argc() as i32);
    registry.register("fault.coff", |_| panic!("simulated fault"));
    registry.register("explicit.coff", |ctx| ctx.exit(3));
    registry.register("spin.coff", |ctx| loop {
        ctx.yield_now();
    });
    registry
}

pub fn kernel_with(registry: ImageRegistry, fs: RamFs) -> Arc<Kernel> {
    Kernel::builder()
        .loader(Arc::new(registry))
        .storage(Arc::new(fs))
        .build()
}

pub fn kernel() -> Arc<Kernel> {
    kernel_with(registry(), RamFs::new())
}

pub fn kernel_config(config: KernelConfig, fs: RamFs) -> Arc<Kernel> {
    Kernel::builder()
        .config(config)
        .loader(Arc::new(registry()))
        .storage(Arc::new(fs))
        .build()
}
