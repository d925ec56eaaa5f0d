//! Wait queues for blocking `join`.
//!
//! Each PCB owns one queue of task ids. A joiner registers itself while it
//! still holds the target's lifecycle lock and then blocks; `terminate` wakes
//! every registered task after publishing the zombie state.

use alloc::collections::VecDeque;
use spin::Mutex;

use crate::scheduler::{Scheduler, TaskId};

/// FIFO of tasks waiting for one event.
pub struct WaitQueue {
    waiters: Mutex<VecDeque<TaskId>>,
}

impl WaitQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Add `task` to the queue. Registering twice is a no-op.
    pub fn register(&self, task: TaskId) {
        let mut waiters = self.waiters.lock();
        if !waiters.contains(&task) {
            waiters.push_back(task);
        }
    }

    /// Wake all waiters, returning how many were woken.
    pub fn wake_all(&self, scheduler: &dyn Scheduler) -> usize {
        let drained: VecDeque<TaskId> = core::mem::take(&mut *self.waiters.lock());
        let woken = drained.len();
        for task in drained {
            scheduler.unblock(task);
        }
        woken
    }

    /// Number of registered waiters.
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Whether no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}
