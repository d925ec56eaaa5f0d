//! Thread-per-process scheduler for hosted builds.
//!
//! Every task gets its own OS thread. Blocking is `std::thread::park`, whose
//! token makes an early `unpark` stick, and faults are panics caught at the
//! top of the task thread.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, Thread, ThreadId};

use hashbrown::HashMap;
use spin::Mutex;

use super::{Scheduler, SchedulerError, Task, TaskId};
use crate::process::ExitStatus;

/// Unwind payload used by [`Scheduler::exit_current`].
struct TaskExit;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    threads: Mutex<HashMap<TaskId, Thread>>,
    ids: Mutex<HashMap<ThreadId, TaskId>>,
}

impl Registry {
    fn alloc_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn attach(&self, id: TaskId, handle: Thread) {
        self.ids.lock().insert(handle.id(), id);
        self.threads.lock().insert(id, handle);
    }

    fn detach(&self, id: TaskId) {
        if let Some(handle) = self.threads.lock().remove(&id) {
            self.ids.lock().remove(&handle.id());
        }
    }
}

/// Task ids a foreign thread picked up, detached when the thread ends.
#[derive(Default)]
struct ForeignAttachments(RefCell<Vec<(Weak<Registry>, TaskId)>>);

impl Drop for ForeignAttachments {
    fn drop(&mut self) {
        for (registry, id) in self.0.get_mut().drain(..) {
            if let Some(registry) = registry.upgrade() {
                registry.detach(id);
            }
        }
    }
}

thread_local! {
    static FOREIGN: ForeignAttachments = ForeignAttachments::default();
}

/// Runs each task on a dedicated OS thread.
///
/// Threads that were not started by this scheduler (a test's main thread
/// driving the root process, for example) get a task id the first time they
/// ask for one and give it back when they end.
#[derive(Clone, Default)]
pub struct ThreadScheduler {
    registry: Arc<Registry>,
}

impl ThreadScheduler {
    /// Create a scheduler with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads currently known to the scheduler, foreign threads
    /// that asked for an id included.
    pub fn task_count(&self) -> usize {
        self.registry.threads.lock().len()
    }

    fn run(registry: &Registry, id: TaskId, task: Task) {
        registry.attach(id, thread::current());
        let pid = task.pid();
        let (body, on_exit) = task.into_parts();

        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(code) => on_exit(ExitStatus::Exited(code)),
            Err(payload) if is_task_exit(&*payload) => {
                log::trace!("[SCHED] {} (pid {}) left via exit", id, pid);
            }
            Err(_) => {
                log::debug!("[SCHED] {} (pid {}) faulted", id, pid);
                on_exit(ExitStatus::Faulted);
            }
        }

        registry.detach(id);
    }
}

fn is_task_exit(payload: &(dyn Any + Send)) -> bool {
    payload.is::<TaskExit>()
}

impl Scheduler for ThreadScheduler {
    fn enqueue(&self, task: Task) -> Result<TaskId, SchedulerError> {
        let id = self.registry.alloc_id();
        let registry = Arc::clone(&self.registry);
        let name = format!("{}:{}", task.name(), task.pid());

        log::trace!("[SCHED] starting {} as {}", name, id);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(&registry, id, task))
            .map_err(|err| {
                // The task (and its exit hook) was dropped with the closure.
                log::error!("[SCHED] failed to start {}: {}", name, err);
                SchedulerError::SpawnFailed(name, err.to_string())
            })?;
        Ok(id)
    }

    fn current_task_id(&self) -> TaskId {
        let current = thread::current();
        if let Some(id) = self.registry.ids.lock().get(&current.id()) {
            return *id;
        }
        let id = self.registry.alloc_id();
        self.registry.attach(id, current);
        let weak = Arc::downgrade(&self.registry);
        if FOREIGN.try_with(|f| f.0.borrow_mut().push((weak, id))).is_err() {
            // Thread is already tearing down its locals.
            self.registry.detach(id);
        }
        log::trace!("[SCHED] attached foreign thread as {}", id);
        id
    }

    fn block_current(&self) {
        thread::park();
    }

    fn unblock(&self, task: TaskId) {
        match self.registry.threads.lock().get(&task) {
            Some(handle) => handle.unpark(),
            None => log::trace!("[SCHED] unblock of finished {}", task),
        }
    }

    fn yield_now(&self) {
        thread::yield_now();
    }

    fn exit_current(&self) -> ! {
        panic::resume_unwind(Box::new(TaskExit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessId;
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn reporting_task<B>(body: B) -> (Task, mpsc::Receiver<ExitStatus>)
    where
        B: FnOnce() -> i32 + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let task = Task::new(ProcessId(1), "t.coff", body, move |status| {
            let _ = tx.send(status);
        });
        (task, rx)
    }

    #[test]
    fn test_normal_exit() {
        let sched = ThreadScheduler::new();
        let (task, rx) = reporting_task(|| 3);
        sched.enqueue(task).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ExitStatus::Exited(3));
    }

    #[test]
    fn test_panic_is_fault() {
        let sched = ThreadScheduler::new();
        let (task, rx) = reporting_task(|| panic!("bad access"));
        sched.enqueue(task).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ExitStatus::Faulted);
    }

    #[test]
    fn test_exit_current_skips_hook() {
        let sched = ThreadScheduler::new();
        let inner = sched.clone();
        let (task, rx) = reporting_task(move || inner.exit_current());
        sched.enqueue(task).unwrap();
        assert!(matches!(
            rx.recv_timeout(WAIT),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_unblock_before_block_is_not_lost() {
        let sched = ThreadScheduler::new();
        let id = sched.current_task_id();
        assert_eq!(sched.current_task_id(), id);

        sched.unblock(id);
        sched.block_current();
    }

    #[test]
    fn test_blocked_task_is_woken() {
        let sched = ThreadScheduler::new();
        let (ready_tx, ready_rx) = mpsc::channel();
        let inner = sched.clone();
        let (task, rx) = reporting_task(move || {
            let _ = ready_tx.send(inner.current_task_id());
            inner.block_current();
            9
        });
        sched.enqueue(task).unwrap();

        let id = ready_rx.recv_timeout(WAIT).unwrap();
        sched.unblock(id);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ExitStatus::Exited(9));
    }

    #[test]
    fn test_foreign_thread_detaches_on_exit() {
        let sched = ThreadScheduler::new();
        let inner = sched.clone();
        let id = thread::spawn(move || {
            let id = inner.current_task_id();
            assert_eq!(inner.task_count(), 1);
            id
        })
        .join()
        .unwrap();

        assert_eq!(sched.task_count(), 0);
        // The id is gone: unblocking it is a no-op.
        sched.unblock(id);

        let (task, rx) = reporting_task(|| 0);
        sched.enqueue(task).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ExitStatus::Exited(0));
    }
}
