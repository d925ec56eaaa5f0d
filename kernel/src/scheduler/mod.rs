//! Scheduling contract.
//!
//! The kernel never decides which process runs where. It hands each new
//! process to a [`Scheduler`] as a [`Task`] and relies on the
//! `block_current`/`unblock` pair to suspend tasks waiting in `join`.

pub mod task;
#[cfg(feature = "std")]
pub mod thread;

use alloc::string::String;

pub use task::{ExitHook, Task, TaskBody, TaskId};

/// Scheduler failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// No execution unit could be created for the task. The task, exit hook
    /// included, has been dropped without running.
    #[error("cannot start {0}: {1}")]
    SpawnFailed(String, String),
}

/// Execution-unit provider.
///
/// `unblock` carries wake-token semantics: if it is delivered to a task that
/// has not called `block_current` yet, that task's next `block_current`
/// returns immediately. `block_current` may also return spuriously; callers
/// re-check their condition in a loop.
pub trait Scheduler: Send + Sync {
    /// Start running `task` and return the id it runs under.
    ///
    /// On error the task never runs and its exit hook is never called.
    fn enqueue(&self, task: Task) -> Result<TaskId, SchedulerError>;

    /// Id of the calling task.
    fn current_task_id(&self) -> TaskId;

    /// Suspend the calling task until it is unblocked.
    fn block_current(&self);

    /// Make a blocked task runnable again.
    fn unblock(&self, task: TaskId);

    /// Give up the execution unit voluntarily.
    fn yield_now(&self);

    /// Abandon the calling task. Its exit hook is not invoked.
    fn exit_current(&self) -> !;
}
