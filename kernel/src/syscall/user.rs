//! Syscall context handed to running programs.
//!
//! Mirrors the C-style user API: every call returns an `i32`, with `-1`
//! meaning failure.

use alloc::string::String;
use alloc::sync::Arc;

use super::{dispatch, Syscall};
use crate::process::ProcessId;
use crate::system::Kernel;
use crate::vfs::Fd;

/// What a program sees of the kernel while it runs.
#[derive(Clone)]
pub struct UserContext {
    kernel: Arc<Kernel>,
    pid: ProcessId,
    args: Arc<[String]>,
}

impl UserContext {
    pub fn new(kernel: Arc<Kernel>, pid: ProcessId, args: Arc<[String]>) -> Self {
        Self { kernel, pid, args }
    }

    /// Calling process.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Argument count.
    pub fn argc(&self) -> usize {
        self.args.len()
    }

    /// Argument vector.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Start `image`; returns the child PID or -1.
    pub fn exec(&self, image: &str, args: &[&str]) -> i32 {
        self.exec_with(image, args, &[])
    }

    /// Like [`exec`](Self::exec), sharing `inherit` with the child.
    pub fn exec_with(&self, image: &str, args: &[&str], inherit: &[Fd]) -> i32 {
        self.call(Syscall::Exec {
            image,
            args,
            inherit,
        })
    }

    /// Wait for child `pid`. Returns 1 (normal exit) or 0 (fault) and fills
    /// `status`; -1 if `pid` is not an unjoined child.
    pub fn join(&self, pid: i32, status: &mut i32) -> i32 {
        self.call(Syscall::Join { pid, status })
    }

    pub fn creat(&self, path: &str) -> i32 {
        self.call(Syscall::Creat { path })
    }

    pub fn open(&self, path: &str) -> i32 {
        self.call(Syscall::Open { path })
    }

    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> i32 {
        self.call(Syscall::Read { fd, buf })
    }

    pub fn write(&self, fd: Fd, buf: &[u8]) -> i32 {
        self.call(Syscall::Write { fd, buf })
    }

    pub fn close(&self, fd: Fd) -> i32 {
        self.call(Syscall::Close { fd })
    }

    pub fn unlink(&self, path: &str) -> i32 {
        self.call(Syscall::Unlink { path })
    }

    /// Terminate with `status`. Never returns.
    ///
    /// The status is recorded before the task is left. A context obtained
    /// from [`Kernel::attach_init`] is not a scheduler task: leaving unwinds
    /// the attached thread, so drivers of such a root either call
    /// [`Kernel::terminate`] instead or catch the unwind.
    pub fn exit(&self, status: i32) -> ! {
        self.call(Syscall::Exit { status });
        self.kernel.scheduler().exit_current()
    }

    /// End the calling process with status 0, stop the machine and leave.
    /// Never returns; see [`exit`](Self::exit) for attached roots.
    pub fn halt(&self) -> ! {
        self.call(Syscall::Halt);
        self.kernel.scheduler().exit_current()
    }

    /// Give up the execution unit. On a halted machine the task is abandoned
    /// instead.
    pub fn yield_now(&self) {
        if self.kernel.is_halted() {
            self.kernel.scheduler().exit_current();
        }
        self.kernel.scheduler().yield_now();
    }

    fn call(&self, call: Syscall<'_>) -> i32 {
        dispatch(&self.kernel, self.pid, call)
    }
}

impl core::fmt::Debug for UserContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserContext")
            .field("pid", &self.pid)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
