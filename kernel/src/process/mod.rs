//! Process Management
//!
//! This module provides the PCB store, the exec/join coordinator and the wait
//! queues that let `join` suspend until a child terminates.

pub mod manager;
pub mod table;
pub mod wait;

use alloc::vec::Vec;

use crate::loader::LoadError;
use crate::scheduler::SchedulerError;
use crate::vfs::{Fd, VfsError};

pub use manager::ProcessManager;
pub use table::{ExitStatus, Process, ProcessId, ProcessSnapshot, ProcessState, ProcessTable};
pub use wait::WaitQueue;

/// Process lifecycle error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    /// Image could not be loaded; no PID was consumed
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Join target is not an unjoined child of the caller
    #[error("process {0} is not an unjoined child of the caller")]
    NotAChild(ProcessId),
    /// PID is not in the store
    #[error("no such process {0}")]
    NoSuchProcess(ProcessId),
    /// Parent is unknown or already a zombie
    #[error("parent process {0} is not running")]
    ParentNotRunning(ProcessId),
    /// Second termination of the same process
    #[error("process {0} has already exited")]
    AlreadyExited(ProcessId),
    /// Store is full
    #[error("process limit reached")]
    ProcessLimitReached,
    /// Machine is halted; nothing new may start
    #[error("machine halted")]
    Halted,
    /// Descriptor handed to exec for inheritance is unusable
    #[error(transparent)]
    Descriptor(#[from] VfsError),
    /// Scheduler refused the task; the PCB was discarded
    #[error(transparent)]
    Spawn(#[from] SchedulerError),
}

/// Extra knobs for `exec`.
///
/// By default a child starts with only stdin and stdout bound. Descriptors
/// listed with [`inherit`](Self::inherit) are bound under the same number in
/// the child and share the parent's open file object (and its cursor).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    inherit: Vec<Fd>,
}

impl ExecOptions {
    /// Default options: no inherited descriptors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share descriptor `fd` with the child.
    pub fn inherit(mut self, fd: Fd) -> Self {
        if !self.inherit.contains(&fd) {
            self.inherit.push(fd);
        }
        self
    }

    /// Descriptors to share.
    pub fn inherited(&self) -> &[Fd] {
        &self.inherit
    }
}
