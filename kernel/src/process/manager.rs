//! Process Manager
//!
//! The exec/join coordinator: creation through the loader, termination with
//! orphan handling, and blocking one-time join.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::table::{Process, ProcessId, ProcessState, ProcessTable};
use super::{ExitStatus, ProcessError};
use crate::config::KernelConfig;
use crate::loader::{ExecutionContext, Loader};
use crate::scheduler::Scheduler;
use crate::vfs::FdTable;

/// Process manager
pub struct ProcessManager {
    config: KernelConfig,
    table: ProcessTable,
    loader: Arc<dyn Loader>,
    scheduler: Arc<dyn Scheduler>,
}

impl ProcessManager {
    /// Create a process manager with an empty table
    pub fn new(config: KernelConfig, loader: Arc<dyn Loader>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            config,
            table: ProcessTable::new(),
            loader,
            scheduler,
        }
    }

    /// Load `image` and create its PCB under `parent`.
    ///
    /// The loader runs first, so a missing or invalid image never consumes a
    /// PID. The returned context still has to be handed to the scheduler.
    pub fn create_process(
        &self,
        parent: Option<ProcessId>,
        image: &str,
        args: Vec<String>,
        files: FdTable,
    ) -> Result<(Arc<Process>, ExecutionContext), ProcessError> {
        let context = self.loader.load(image, &args)?;
        let process = self.table.create(
            parent,
            String::from(image),
            args,
            files,
            self.config.max_processes,
        )?;

        match parent {
            Some(ppid) => log::debug!("[PROC] {} created pid {} ({})", ppid, process.pid(), image),
            None => log::debug!("[PROC] created root pid {} ({})", process.pid(), image),
        }
        Ok((process, context))
    }

    /// Wait for `target`, an unjoined child of `caller`, and consume it.
    ///
    /// Membership is checked before blocking. If two tasks of the same parent
    /// race on one child, exactly one gets the status.
    pub fn join(&self, caller: ProcessId, target: ProcessId) -> Result<ExitStatus, ProcessError> {
        let parent = self.table.lookup(caller)?;
        if caller == target || !parent.has_child(target) {
            return Err(ProcessError::NotAChild(target));
        }
        let child = self.table.get(target).ok_or(ProcessError::NotAChild(target))?;

        let status = loop {
            {
                let lifecycle = child.lifecycle();
                if let ProcessState::Zombie(status) = lifecycle.state {
                    break status;
                }
                // Registered under the child's lock: terminate cannot slip
                // between this check and the wakeup.
                child.joiners().register(self.scheduler.current_task_id());
            }
            log::trace!("[PROC] {} blocking on {}", caller, target);
            self.scheduler.block_current();
        };

        if !parent.lifecycle().children.remove(&target) {
            return Err(ProcessError::NotAChild(target));
        }
        self.reap(target);
        log::debug!("[PROC] {} joined {} ({:?})", caller, target, status);
        Ok(status)
    }

    /// Move `pid` to Zombie with `status`.
    ///
    /// Closes its regular descriptors, orphans its children (reaping the ones
    /// already dead) and wakes its joiners. A process without a parent is
    /// reaped at once since nobody can join it.
    pub fn terminate(&self, pid: ProcessId, status: ExitStatus) -> Result<(), ProcessError> {
        let process = self.table.lookup(pid)?;

        let (children, parent) = {
            let mut lifecycle = process.lifecycle();
            if let ProcessState::Zombie(recorded) = lifecycle.state {
                log::warn!(
                    "[PROC] second termination of {} ignored (recorded {:?}, got {:?})",
                    pid,
                    recorded,
                    status
                );
                return Err(ProcessError::AlreadyExited(pid));
            }
            lifecycle.state = ProcessState::Zombie(status);
            (core::mem::take(&mut lifecycle.children), lifecycle.parent)
        };
        log::debug!("[PROC] {} terminated: {:?}", pid, status);

        let closed = process.files().lock().close_all();
        drop(closed);

        for child in children {
            self.orphan(child);
        }

        process.joiners().wake_all(&*self.scheduler);

        if parent.is_none() {
            self.reap(pid);
        }
        Ok(())
    }

    fn orphan(&self, pid: ProcessId) {
        let Some(child) = self.table.get(pid) else {
            return;
        };
        let dead = {
            let mut lifecycle = child.lifecycle();
            lifecycle.parent = None;
            lifecycle.state.is_zombie()
        };
        if dead {
            self.reap(pid);
        } else {
            log::debug!("[PROC] {} orphaned", pid);
        }
    }

    /// Undo [`create_process`](Self::create_process) for a process whose
    /// task never started.
    ///
    /// The PCB leaves its parent's children and the store, its descriptors are
    /// closed, and anyone who already found it and is waiting in `join` wakes
    /// up to a `NotAChild` failure.
    pub fn discard(&self, pid: ProcessId) {
        let Some(process) = self.table.get(pid) else {
            return;
        };
        let parent = {
            let mut lifecycle = process.lifecycle();
            lifecycle.state = ProcessState::Zombie(ExitStatus::Faulted);
            lifecycle.parent
        };
        if let Some(parent) = parent.and_then(|ppid| self.table.get(ppid)) {
            parent.lifecycle().children.remove(&pid);
        }
        self.table.remove(pid);

        let closed = process.files().lock().close_all();
        drop(closed);
        process.joiners().wake_all(&*self.scheduler);
        log::warn!("[PROC] discarded {}: task never started", pid);
    }

    /// Remove a PCB from the store.
    pub fn reap(&self, pid: ProcessId) -> Option<Arc<Process>> {
        let process = self.table.remove(pid)?;
        log::debug!("[PROC] reaped {}", pid);
        Some(process)
    }

    /// Look up a PCB
    pub fn lookup(&self, pid: ProcessId) -> Result<Arc<Process>, ProcessError> {
        self.table.lookup(pid)
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }
}
