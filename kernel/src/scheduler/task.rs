//! Task definition.
//!
//! A task is the runnable half of a process: the program body plus the hook
//! that reports how it ended back to the kernel.

use alloc::boxed::Box;
use alloc::string::String;

use crate::process::{ExitStatus, ProcessId};

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "task{}", self.0)
    }
}

/// Program body: runs to completion and returns the exit code.
pub type TaskBody = Box<dyn FnOnce() -> i32 + Send>;

/// Called exactly once with the way the body ended, unless the body left
/// through [`Scheduler::exit_current`](super::Scheduler::exit_current).
pub type ExitHook = Box<dyn FnOnce(ExitStatus) + Send>;

/// A unit of work handed to a scheduler.
pub struct Task {
    pid: ProcessId,
    name: String,
    body: TaskBody,
    on_exit: ExitHook,
}

impl Task {
    /// Create a task for process `pid`.
    pub fn new<B, E>(pid: ProcessId, name: impl Into<String>, body: B, on_exit: E) -> Self
    where
        B: FnOnce() -> i32 + Send + 'static,
        E: FnOnce(ExitStatus) + Send + 'static,
    {
        Self {
            pid,
            name: name.into(),
            body: Box::new(body),
            on_exit: Box::new(on_exit),
        }
    }

    /// Process this task executes.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Task name (the process image).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into body and exit hook.
    pub fn into_parts(self) -> (TaskBody, ExitHook) {
        (self.body, self.on_exit)
    }

    /// Run the body on the current execution unit and report a normal exit.
    pub fn run(self) {
        let (body, on_exit) = self.into_parts();
        let code = body();
        on_exit(ExitStatus::Exited(code));
    }
}

impl core::fmt::Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
