//! Process Table
//!
//! The PCB store: every live and zombie process, indexed by PID. Parent and
//! child links are PIDs into this table, never pointers.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::{Mutex, MutexGuard, RwLock};

use super::wait::WaitQueue;
use super::ProcessError;
use crate::config::{FAULT_STATUS, MAX_PID};
use crate::vfs::FdTable;

/// Process ID type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

impl ProcessId {
    /// Convert a PID coming from the syscall boundary. Non-positive values
    /// never name a process.
    pub fn from_raw(raw: i32) -> Option<Self> {
        u64::try_from(raw).ok().filter(|v| *v > 0).map(ProcessId)
    }

    /// PID as handed back to user programs. The table never allocates past
    /// [`MAX_PID`], so this is lossless for allocated PIDs.
    pub fn as_raw(&self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Returned from its entry point or called `exit`.
    Exited(i32),
    /// Died abnormally.
    Faulted,
}

impl ExitStatus {
    /// Value written to the joiner's status slot.
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Faulted => FAULT_STATUS,
        }
    }

    /// Whether the process exited on its own terms.
    pub fn is_normal(&self) -> bool {
        matches!(self, ExitStatus::Exited(_))
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Process is executing or runnable
    Running,
    /// Process has exited but has not been reaped yet
    Zombie(ExitStatus),
}

impl ProcessState {
    /// Whether the process has terminated.
    pub fn is_zombie(&self) -> bool {
        matches!(self, ProcessState::Zombie(_))
    }

    /// Recorded exit status, if terminated.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self {
            ProcessState::Zombie(status) => Some(*status),
            ProcessState::Running => None,
        }
    }
}

/// Mutable lifecycle fields, guarded together so that state transitions and
/// parent/children updates are atomic.
pub(crate) struct Lifecycle {
    pub(crate) state: ProcessState,
    pub(crate) parent: Option<ProcessId>,
    /// Spawned and not yet joined.
    pub(crate) children: BTreeSet<ProcessId>,
}

/// A process control block
pub struct Process {
    pid: ProcessId,
    name: String,
    args: Vec<String>,
    lifecycle: Mutex<Lifecycle>,
    files: Mutex<FdTable>,
    /// Tasks blocked in `join` on this process.
    joiners: WaitQueue,
}

impl Process {
    fn new(
        pid: ProcessId,
        parent: Option<ProcessId>,
        name: String,
        args: Vec<String>,
        files: FdTable,
    ) -> Self {
        Self {
            pid,
            name,
            args,
            lifecycle: Mutex::new(Lifecycle {
                state: ProcessState::Running,
                parent,
                children: BTreeSet::new(),
            }),
            files: Mutex::new(files),
            joiners: WaitQueue::new(),
        }
    }

    /// Process ID
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Image name the process was started from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument vector passed to `exec`
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Current state
    pub fn state(&self) -> ProcessState {
        self.lifecycle.lock().state
    }

    /// Parent PID; `None` for a root process or an orphan
    pub fn parent(&self) -> Option<ProcessId> {
        self.lifecycle.lock().parent
    }

    /// Children that have not been joined yet
    pub fn children(&self) -> Vec<ProcessId> {
        self.lifecycle.lock().children.iter().copied().collect()
    }

    /// Whether `pid` is an unjoined child of this process
    pub fn has_child(&self, pid: ProcessId) -> bool {
        self.lifecycle.lock().children.contains(&pid)
    }

    /// Descriptor table, exclusively owned by this process
    pub fn files(&self) -> &Mutex<FdTable> {
        &self.files
    }

    pub(crate) fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock()
    }

    pub(crate) fn joiners(&self) -> &WaitQueue {
        &self.joiners
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Global process table
pub struct ProcessTable {
    /// All processes indexed by PID
    processes: RwLock<BTreeMap<ProcessId, Arc<Process>>>,
    /// Next PID to hand out; PIDs are never reused
    next_pid: AtomicU64,
}

impl ProcessTable {
    /// Create a new empty process table
    pub const fn new() -> Self {
        Self {
            processes: RwLock::new(BTreeMap::new()),
            next_pid: AtomicU64::new(1),
        }
    }

    /// Allocate a PID, insert a Running PCB and link it under `parent`.
    ///
    /// The parent's lifecycle lock is held across the insertion so a parent
    /// cannot turn into a zombie while gaining a child. A PID is consumed only
    /// when every check has passed.
    pub fn create(
        &self,
        parent: Option<ProcessId>,
        name: String,
        args: Vec<String>,
        files: FdTable,
        max_processes: usize,
    ) -> Result<Arc<Process>, ProcessError> {
        let parent_process = match parent {
            Some(ppid) => Some(
                self.get(ppid)
                    .ok_or(ProcessError::ParentNotRunning(ppid))?,
            ),
            None => None,
        };

        let mut parent_guard = parent_process.as_ref().map(|p| p.lifecycle());
        if let (Some(guard), Some(ppid)) = (&parent_guard, parent) {
            if guard.state.is_zombie() {
                return Err(ProcessError::ParentNotRunning(ppid));
            }
        }

        let process = {
            let mut processes = self.processes.write();
            if processes.len() >= max_processes || self.next_pid.load(Ordering::SeqCst) > MAX_PID {
                return Err(ProcessError::ProcessLimitReached);
            }
            let pid = ProcessId(self.next_pid.fetch_add(1, Ordering::SeqCst));
            let process = Arc::new(Process::new(pid, parent, name, args, files));
            processes.insert(pid, Arc::clone(&process));
            process
        };

        if let Some(guard) = parent_guard.as_mut() {
            guard.children.insert(process.pid);
        }
        Ok(process)
    }

    /// Look up a process, failing with `NoSuchProcess`
    pub fn lookup(&self, pid: ProcessId) -> Result<Arc<Process>, ProcessError> {
        self.get(pid).ok_or(ProcessError::NoSuchProcess(pid))
    }

    /// Get a process by PID
    pub fn get(&self, pid: ProcessId) -> Option<Arc<Process>> {
        self.processes.read().get(&pid).cloned()
    }

    /// Remove a process
    pub fn remove(&self, pid: ProcessId) -> Option<Arc<Process>> {
        self.processes.write().remove(&pid)
    }

    /// Whether the store holds `pid`
    pub fn contains(&self, pid: ProcessId) -> bool {
        self.processes.read().contains_key(&pid)
    }

    /// Get count of processes, zombies included
    pub fn count(&self) -> usize {
        self.processes.read().len()
    }

    /// Number of processes that have not terminated
    pub fn running_count(&self) -> usize {
        self.all()
            .iter()
            .filter(|p| !p.state().is_zombie())
            .count()
    }

    /// PID the next successful creation will receive
    pub fn peek_next_pid(&self) -> ProcessId {
        ProcessId(self.next_pid.load(Ordering::SeqCst))
    }

    /// Get a snapshot of all processes.
    ///
    /// The table lock is released before any PCB is locked.
    pub fn snapshot(&self) -> Vec<ProcessSnapshot> {
        self.all()
            .iter()
            .map(|proc| {
                let lifecycle = proc.lifecycle();
                ProcessSnapshot {
                    pid: proc.pid,
                    parent: lifecycle.parent,
                    name: proc.name.clone(),
                    state: lifecycle.state,
                    children: lifecycle.children.iter().copied().collect(),
                }
            })
            .collect()
    }

    fn all(&self) -> Vec<Arc<Process>> {
        self.processes.read().values().cloned().collect()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight snapshot of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub pid: ProcessId,
    pub parent: Option<ProcessId>,
    pub name: String,
    pub state: ProcessState,
    pub children: Vec<ProcessId>,
}
