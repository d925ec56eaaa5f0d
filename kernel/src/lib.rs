//! Joinix Kernel Library
//!
//! Process lifecycle, exec/join coordination and per-process descriptor
//! tables. The executable loader, the scheduler and the storage medium are
//! collaborators behind traits; the host build ships one implementation of
//! each so the whole boundary can be driven from `cargo test`.
//!
//! # Layout
//!
//! - [`process`]: PCB store, wait queues, exec/join coordinator
//! - [`vfs`]: open file objects, descriptor tables, console streams
//! - [`loader`]: image loading contract and the in-memory image registry
//! - [`scheduler`]: scheduling contract and the thread-per-process host scheduler
//! - [`syscall`]: syscall numbers, dispatch and the user-side context
//! - [`system`]: the [`Kernel`] instance that ties it together

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod loader;
pub mod process;
pub mod scheduler;
pub mod syscall;
pub mod system;
pub mod vfs;

pub use config::KernelConfig;
pub use loader::{ExecutionContext, ImageRegistry, LoadError, Loader, ProgramEntry};
pub use process::{ExecOptions, ExitStatus, ProcessError, ProcessId, ProcessState};
#[cfg(feature = "std")]
pub use scheduler::thread::ThreadScheduler;
pub use scheduler::{Scheduler, SchedulerError, Task, TaskId};
pub use syscall::{dispatch, Syscall, SyscallError, SyscallNumber, UserContext, SYSCALL_FAILURE};
pub use system::{Kernel, KernelBuilder};
pub use vfs::{Console, Fd, VfsError, STDIN, STDOUT};
