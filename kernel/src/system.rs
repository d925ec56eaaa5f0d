//! Kernel instance.
//!
//! [`Kernel`] owns the process manager, the VFS and the halt state. It is
//! always shared as `Arc<Kernel>` because running tasks hold a reference
//! through their [`UserContext`].

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;
use storage::{OpenFlags, RamFs, StorageBackend};

use crate::config::KernelConfig;
use crate::loader::{ExecutionContext, ImageRegistry, Loader};
use crate::process::{
    ExecOptions, ExitStatus, Process, ProcessError, ProcessId, ProcessManager, ProcessSnapshot,
    WaitQueue,
};
use crate::scheduler::{Scheduler, Task};
use crate::syscall::UserContext;
use crate::vfs::{Console, Fd, Vfs, VfsError};

/// Builder for [`Kernel`].
pub struct KernelBuilder {
    config: KernelConfig,
    scheduler: Arc<dyn Scheduler>,
    loader: Option<Arc<dyn Loader>>,
    storage: Option<Arc<dyn StorageBackend>>,
    console: Option<Arc<Console>>,
}

impl KernelBuilder {
    /// Start from a scheduler; everything else has a default (empty image
    /// registry, empty RAM filesystem, fresh console).
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            config: KernelConfig::default(),
            scheduler,
            loader: None,
            storage: None,
            console: None,
        }
    }

    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn console(mut self, console: Arc<Console>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn build(self) -> Arc<Kernel> {
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(ImageRegistry::new()));
        let storage = self.storage.unwrap_or_else(|| Arc::new(RamFs::new()));
        let console = self.console.unwrap_or_default();
        let max_files = self.config.max_files;

        log::info!(
            "[PROC] kernel up (max {} processes, {} files each)",
            self.config.max_processes,
            max_files
        );
        Arc::new(Kernel {
            processes: ProcessManager::new(self.config, loader, self.scheduler),
            vfs: Vfs::new(storage, console, max_files),
            halted: Mutex::new(false),
            halt_waiters: WaitQueue::new(),
        })
    }
}

/// The process-control and file-I/O subsystem.
pub struct Kernel {
    processes: ProcessManager,
    vfs: Vfs,
    halted: Mutex<bool>,
    halt_waiters: WaitQueue,
}

impl Kernel {
    /// Builder using the thread-per-process host scheduler.
    #[cfg(feature = "std")]
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new(Arc::new(crate::scheduler::thread::ThreadScheduler::new()))
    }

    /// Load `image` as a root process and start it.
    pub fn spawn_init(self: &Arc<Self>, image: &str, args: &[&str]) -> Result<ProcessId, ProcessError> {
        self.ensure_running()?;
        let args = args.iter().map(|arg| String::from(*arg)).collect();
        let (process, context) =
            self.processes
                .create_process(None, image, args, self.vfs.new_table())?;
        self.launch(&process, context)?;
        Ok(process.pid())
    }

    /// Register the calling thread as a root process named `name`.
    ///
    /// Nothing is loaded or scheduled; the caller drives the process through
    /// [`context`](Self::context) and ends it with [`terminate`](Self::terminate).
    pub fn attach_init(self: &Arc<Self>, name: &str) -> Result<UserContext, ProcessError> {
        self.ensure_running()?;
        let process = self.processes.table().create(
            None,
            String::from(name),
            alloc::vec![String::from(name)],
            self.vfs.new_table(),
            self.processes.config().max_processes,
        )?;
        log::debug!("[PROC] attached root pid {} ({})", process.pid(), name);
        self.context(process.pid())
    }

    /// Syscall context for an existing process.
    pub fn context(self: &Arc<Self>, pid: ProcessId) -> Result<UserContext, ProcessError> {
        let process = self.processes.lookup(pid)?;
        let args: Arc<[String]> = process.args().into();
        Ok(UserContext::new(Arc::clone(self), pid, args))
    }

    /// Start `image` as a child of `caller`. Returns without waiting.
    pub fn exec(
        self: &Arc<Self>,
        caller: ProcessId,
        image: &str,
        args: &[&str],
        options: &ExecOptions,
    ) -> Result<ProcessId, ProcessError> {
        self.ensure_running()?;
        let parent = self.processes.lookup(caller)?;
        let files = self.vfs.inherit(parent.files(), options.inherited())?;
        let args = args.iter().map(|arg| String::from(*arg)).collect();

        let (process, context) = self.processes.create_process(Some(caller), image, args, files)?;
        self.launch(&process, context)?;
        Ok(process.pid())
    }

    /// Hand a freshly created process to the scheduler. If the scheduler
    /// refuses it, the PCB is discarded again.
    fn launch(
        self: &Arc<Self>,
        process: &Arc<Process>,
        context: ExecutionContext,
    ) -> Result<(), ProcessError> {
        let pid = process.pid();
        let body_kernel = Arc::clone(self);
        let exit_kernel = Arc::clone(self);
        let name = String::from(context.image());

        let task = Task::new(
            pid,
            name,
            move || {
                let user = UserContext::new(body_kernel, pid, Arc::clone(context.args()));
                (context.entry())(&user)
            },
            move |status| exit_kernel.on_task_exit(pid, status),
        );
        match self.processes.scheduler().enqueue(task) {
            Ok(task_id) => {
                log::trace!("[SCHED] pid {} runs as {}", pid, task_id);
                Ok(())
            }
            Err(err) => {
                self.processes.discard(pid);
                Err(err.into())
            }
        }
    }

    /// Block until `target` (an unjoined child of `caller`) terminates, then
    /// consume it.
    pub fn join(&self, caller: ProcessId, target: ProcessId) -> Result<ExitStatus, ProcessError> {
        self.processes.join(caller, target)
    }

    /// Record that `pid` finished. Halts the machine when nothing is left
    /// running.
    pub fn terminate(&self, pid: ProcessId, status: ExitStatus) -> Result<(), ProcessError> {
        self.processes.terminate(pid, status)?;
        if self.processes.table().running_count() == 0 {
            log::info!("[PROC] last process exited");
            self.halt();
        }
        Ok(())
    }

    /// Exit hook for tasks whose body returned or faulted.
    pub fn on_task_exit(&self, pid: ProcessId, status: ExitStatus) {
        if let Err(err) = self.terminate(pid, status) {
            log::warn!("[PROC] exit of pid {} not recorded: {}", pid, err);
        }
    }

    /// Stop the machine. Idempotent.
    pub fn halt(&self) {
        {
            let mut halted = self.halted.lock();
            if *halted {
                return;
            }
            *halted = true;
        }
        log::info!("[PROC] machine halted");
        self.halt_waiters.wake_all(&**self.processes.scheduler());
    }

    pub fn is_halted(&self) -> bool {
        *self.halted.lock()
    }

    /// Block the calling task until the machine halts.
    pub fn wait_for_halt(&self) {
        let scheduler = self.processes.scheduler();
        loop {
            {
                let halted = self.halted.lock();
                if *halted {
                    return;
                }
                self.halt_waiters.register(scheduler.current_task_id());
            }
            scheduler.block_current();
        }
    }

    /// Open an existing file for `pid`.
    pub fn open(&self, pid: ProcessId, path: &str) -> Result<Fd, ProcessError> {
        let process = self.processes.lookup(pid)?;
        Ok(self.vfs.open(process.files(), path, OpenFlags::OPEN)?)
    }

    /// Create (or truncate) and open a file for `pid`.
    pub fn create(&self, pid: ProcessId, path: &str) -> Result<Fd, ProcessError> {
        let process = self.processes.lookup(pid)?;
        Ok(self.vfs.open(process.files(), path, OpenFlags::CREAT)?)
    }

    pub fn read(&self, pid: ProcessId, fd: Fd, buf: &mut [u8]) -> Result<usize, ProcessError> {
        let process = self.processes.lookup(pid)?;
        Ok(self.vfs.read(process.files(), fd, buf)?)
    }

    pub fn write(&self, pid: ProcessId, fd: Fd, data: &[u8]) -> Result<usize, ProcessError> {
        let process = self.processes.lookup(pid)?;
        Ok(self.vfs.write(process.files(), fd, data)?)
    }

    pub fn close(&self, pid: ProcessId, fd: Fd) -> Result<(), ProcessError> {
        let process = self.processes.lookup(pid)?;
        Ok(self.vfs.close(process.files(), fd)?)
    }

    pub fn unlink(&self, path: &str) -> Result<(), VfsError> {
        self.vfs.unlink(path)
    }

    /// Copy of the process table.
    pub fn snapshot(&self) -> Vec<ProcessSnapshot> {
        self.processes.table().snapshot()
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn console(&self) -> &Arc<Console> {
        self.vfs.console()
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        self.vfs.storage()
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        self.processes.scheduler()
    }

    fn ensure_running(&self) -> Result<(), ProcessError> {
        if self.is_halted() {
            return Err(ProcessError::Halted);
        }
        Ok(())
    }
}
