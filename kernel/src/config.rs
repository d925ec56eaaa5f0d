//! Kernel configuration constants.
//!
//! This module contains compile-time limits for the kernel, plus
//! [`KernelConfig`] for the values a kernel instance may override when it is
//! built.

/// Maximum number of process control blocks (live and zombie).
pub const MAX_PROCESSES: usize = 4096;

/// Largest PID; PIDs cross the syscall boundary as `i32`.
pub const MAX_PID: u64 = i32::MAX as u64;

/// Descriptor slots per process, standard streams included.
pub const MAX_FILES: usize = 16;

/// Maximum length of a path or image name in bytes.
pub const MAX_PATH_LEN: usize = storage::MAX_PATH_LEN;

/// Maximum number of `exec` arguments.
pub const MAX_ARGS: usize = 64;

/// Maximum length of a single `exec` argument in bytes.
pub const MAX_ARG_LEN: usize = 256;

/// Image names must carry this suffix to be considered executable.
pub const EXECUTABLE_SUFFIX: &str = ".coff";

/// Status written to `join`'s slot for a child that faulted.
pub const FAULT_STATUS: i32 = -1;

/// Log every syscall at trace level.
pub const TRACE_SYSCALLS: bool = cfg!(feature = "trace-syscalls");

/// Per-instance limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Upper bound on PCBs in the store.
    pub max_processes: usize,
    /// Descriptor slots per process (at least 2).
    pub max_files: usize,
}

impl KernelConfig {
    /// Override the process limit.
    pub fn with_max_processes(mut self, max_processes: usize) -> Self {
        self.max_processes = max_processes;
        self
    }

    /// Override the descriptor table size. Never below the two standard streams.
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(2);
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: MAX_PROCESSES,
            max_files: MAX_FILES,
        }
    }
}
