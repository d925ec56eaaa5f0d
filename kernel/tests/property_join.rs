//! Property: exec/join/terminate agree with a reference model.
//!
//! For any interleaving of spawns, terminations and joins, the process
//! manager returns the same results as a straightforward model of the
//! parent/children bookkeeping, and the store holds exactly the PCBs the
//! model says are still reachable. Joins that would block are skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use joinix_kernel::process::ProcessManager;
use joinix_kernel::vfs::FdTable;
use joinix_kernel::{
    ExitStatus, ImageRegistry, KernelConfig, ProcessError, ProcessId, Scheduler, SchedulerError,
    Task, TaskId,
};
use proptest::prelude::*;

/// Never runs anything; blocking would be a test bug.
struct Inert;

impl Scheduler for Inert {
    fn enqueue(&self, _task: Task) -> Result<TaskId, SchedulerError> {
        Ok(TaskId(0))
    }
    fn current_task_id(&self) -> TaskId {
        TaskId(0)
    }
    fn block_current(&self) {
        panic!("model only joins terminated children");
    }
    fn unblock(&self, _task: TaskId) {}
    fn yield_now(&self) {}
    fn exit_current(&self) -> ! {
        panic!("no task to exit");
    }
}

#[derive(Debug, Clone)]
enum Op {
    Spawn { parent: Option<usize> },
    Exit { target: usize, code: i32 },
    Join { caller: usize, target: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::option::weighted(0.8, 0..12usize).prop_map(|parent| Op::Spawn { parent }),
        (0..12usize, -5..5i32).prop_map(|(target, code)| Op::Exit { target, code }),
        (0..12usize, 0..12usize).prop_map(|(caller, target)| Op::Join { caller, target }),
    ]
}

#[derive(Debug)]
struct ModelProcess {
    parent: Option<u64>,
    status: Option<ExitStatus>,
    children: BTreeSet<u64>,
}

#[derive(Default)]
struct Model {
    procs: BTreeMap<u64, ModelProcess>,
    next_pid: u64,
}

impl Model {
    fn spawn(&mut self, parent: Option<u64>) -> Result<u64, ProcessError> {
        if let Some(ppid) = parent {
            match self.procs.get(&ppid) {
                Some(p) if p.status.is_none() => {}
                _ => return Err(ProcessError::ParentNotRunning(ProcessId(ppid))),
            }
        }
        self.next_pid += 1;
        let pid = self.next_pid;
        self.procs.insert(
            pid,
            ModelProcess {
                parent,
                status: None,
                children: BTreeSet::new(),
            },
        );
        if let Some(ppid) = parent {
            self.procs.get_mut(&ppid).unwrap().children.insert(pid);
        }
        Ok(pid)
    }

    fn exit(&mut self, pid: u64, status: ExitStatus) -> Result<(), ProcessError> {
        let proc = self
            .procs
            .get_mut(&pid)
            .ok_or(ProcessError::NoSuchProcess(ProcessId(pid)))?;
        if proc.status.is_some() {
            return Err(ProcessError::AlreadyExited(ProcessId(pid)));
        }
        proc.status = Some(status);
        let children = std::mem::take(&mut proc.children);
        let orphaned_root = proc.parent.is_none();

        for child in children {
            let c = self.procs.get_mut(&child).unwrap();
            c.parent = None;
            if c.status.is_some() {
                self.procs.remove(&child);
            }
        }
        if orphaned_root {
            self.procs.remove(&pid);
        }
        Ok(())
    }

    /// `None` when the real join would block.
    fn join(&mut self, caller: u64, target: u64) -> Option<Result<ExitStatus, ProcessError>> {
        let Some(parent) = self.procs.get(&caller) else {
            return Some(Err(ProcessError::NoSuchProcess(ProcessId(caller))));
        };
        if caller == target || !parent.children.contains(&target) {
            return Some(Err(ProcessError::NotAChild(ProcessId(target))));
        }
        let status = self.procs[&target].status?;
        self.procs.get_mut(&caller).unwrap().children.remove(&target);
        self.procs.remove(&target);
        Some(Ok(status))
    }
}

fn manager() -> ProcessManager {
    let registry = ImageRegistry::new();
    registry.register("p.coff", |_| 0);
    ProcessManager::new(KernelConfig::default(), Arc::new(registry), Arc::new(Inert))
}

/// Indices past the end name PIDs that were never allocated.
fn pid_at(pids: &[u64], index: usize) -> u64 {
    pids.get(index).copied().unwrap_or(1000 + index as u64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn manager_matches_model(ops in prop::collection::vec(arb_op(), 1..80)) {
        let mgr = manager();
        let mut model = Model::default();
        let mut pids: Vec<u64> = Vec::new();

        for op in ops {
            match op {
                Op::Spawn { parent } => {
                    let parent = parent.map(|i| pid_at(&pids, i));
                    let expected = model.spawn(parent);
                    let actual = mgr
                        .create_process(parent.map(ProcessId), "p.coff", Vec::new(), FdTable::new(16))
                        .map(|(p, _)| p.pid().as_u64());
                    prop_assert_eq!(&actual, &expected);
                    if let Ok(pid) = actual {
                        pids.push(pid);
                    }
                }
                Op::Exit { target, code } => {
                    let pid = pid_at(&pids, target);
                    let status = if code < 0 { ExitStatus::Faulted } else { ExitStatus::Exited(code) };
                    prop_assert_eq!(mgr.terminate(ProcessId(pid), status), model.exit(pid, status));
                }
                Op::Join { caller, target } => {
                    let (caller, target) = (pid_at(&pids, caller), pid_at(&pids, target));
                    if let Some(expected) = model.join(caller, target) {
                        prop_assert_eq!(mgr.join(ProcessId(caller), ProcessId(target)), expected);
                    }
                }
            }

            let stored: BTreeSet<u64> = mgr
                .table()
                .snapshot()
                .iter()
                .map(|s| s.pid.as_u64())
                .collect();
            let modelled: BTreeSet<u64> = model.procs.keys().copied().collect();
            prop_assert_eq!(stored, modelled);
        }
    }

    #[test]
    fn failed_spawns_never_advance_pids(bad_parents in prop::collection::vec(500u64..600, 1..20)) {
        let mgr = manager();
        for parent in bad_parents {
            let before = mgr.table().peek_next_pid();
            let result = mgr.create_process(Some(ProcessId(parent)), "p.coff", Vec::new(), FdTable::new(16));
            prop_assert!(result.is_err());
            prop_assert_eq!(mgr.table().peek_next_pid(), before);
        }
        let missing = mgr.create_process(None, "nope.coff", Vec::new(), FdTable::new(16));
        prop_assert!(matches!(missing, Err(ProcessError::Load(_))));
        prop_assert_eq!(mgr.table().peek_next_pid(), ProcessId(1));
    }
}
