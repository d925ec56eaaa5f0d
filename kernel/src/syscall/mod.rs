//! System call handling module.
//!
//! User programs reach the kernel through [`dispatch`], either directly with a
//! typed [`Syscall`] or through the [`UserContext`] wrappers. Every failure is
//! collapsed to [`SYSCALL_FAILURE`] at this boundary; the typed error is only
//! logged.

pub mod handlers;
pub mod user;

use alloc::string::String;
use alloc::sync::Arc;

use crate::config::TRACE_SYSCALLS;
use crate::loader::LoadError;
use crate::process::{ProcessError, ProcessId};
use crate::system::Kernel;
use crate::vfs::{Fd, VfsError};

pub use user::UserContext;

/// Value returned by every failing syscall.
pub const SYSCALL_FAILURE: i32 = -1;

/// System call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    /// Stop the machine.
    Halt = 0,
    /// Terminate the calling process.
    Exit = 1,
    /// Start a child process.
    Exec = 2,
    /// Wait for a child and collect its status.
    Join = 3,
    /// Create or truncate a file and open it.
    Creat = 4,
    /// Open an existing file.
    Open = 5,
    /// Read from a descriptor.
    Read = 6,
    /// Write to a descriptor.
    Write = 7,
    /// Close a descriptor.
    Close = 8,
    /// Remove a file name.
    Unlink = 9,
}

impl SyscallNumber {
    /// Lower-case syscall name.
    pub fn name(&self) -> &'static str {
        match self {
            SyscallNumber::Halt => "halt",
            SyscallNumber::Exit => "exit",
            SyscallNumber::Exec => "exec",
            SyscallNumber::Join => "join",
            SyscallNumber::Creat => "creat",
            SyscallNumber::Open => "open",
            SyscallNumber::Read => "read",
            SyscallNumber::Write => "write",
            SyscallNumber::Close => "close",
            SyscallNumber::Unlink => "unlink",
        }
    }
}

impl TryFrom<u32> for SyscallNumber {
    type Error = SyscallError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SyscallNumber::Halt),
            1 => Ok(SyscallNumber::Exit),
            2 => Ok(SyscallNumber::Exec),
            3 => Ok(SyscallNumber::Join),
            4 => Ok(SyscallNumber::Creat),
            5 => Ok(SyscallNumber::Open),
            6 => Ok(SyscallNumber::Read),
            7 => Ok(SyscallNumber::Write),
            8 => Ok(SyscallNumber::Close),
            9 => Ok(SyscallNumber::Unlink),
            _ => Err(SyscallError::InvalidSyscall(value)),
        }
    }
}

/// System call result.
pub type SyscallResult = Result<i32, SyscallError>;

/// System call errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyscallError {
    /// Image missing or rejected by the loader.
    #[error("exec failed: {0}")]
    Load(LoadError),
    /// Join target is not an unjoined child of the caller.
    #[error("{0} is not an unjoined child")]
    NotAChild(i32),
    /// Unbound descriptor, or one that does not allow the operation.
    #[error("invalid descriptor {0}")]
    DescriptorInvalid(Fd),
    /// Path does not resolve.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed path, over-long argument and the like.
    #[error("invalid argument")]
    InvalidArgument,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("process limit reached")]
    ProcessLimitReached,
    #[error("machine halted")]
    Halted,
    /// Child was created but could not be started.
    #[error("cannot start process")]
    SpawnFailed,
    /// Calling process is not in the table.
    #[error("no such process {0}")]
    NoSuchProcess(ProcessId),
    /// Storage failure on an otherwise valid descriptor.
    #[error("i/o error")]
    Io,
    #[error("invalid syscall number {0}")]
    InvalidSyscall(u32),
}

impl SyscallError {
    /// Value the failing call returns to the program.
    pub fn sentinel(&self) -> i32 {
        SYSCALL_FAILURE
    }
}

impl From<VfsError> for SyscallError {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::NotFound(path) => SyscallError::NotFound(path),
            VfsError::InvalidFd(fd)
            | VfsError::NotReadable(fd)
            | VfsError::NotWritable(fd)
            | VfsError::Protected(fd) => SyscallError::DescriptorInvalid(fd),
            VfsError::TooManyOpenFiles => SyscallError::TooManyOpenFiles,
            VfsError::InvalidPath => SyscallError::InvalidArgument,
            VfsError::Storage(_) => SyscallError::Io,
        }
    }
}

impl From<ProcessError> for SyscallError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Load(
                LoadError::NameTooLong | LoadError::TooManyArgs(_) | LoadError::ArgTooLong(_),
            ) => SyscallError::InvalidArgument,
            ProcessError::Load(load) => SyscallError::Load(load),
            ProcessError::NotAChild(pid) => SyscallError::NotAChild(pid.as_raw()),
            ProcessError::NoSuchProcess(pid) | ProcessError::ParentNotRunning(pid) => {
                SyscallError::NoSuchProcess(pid)
            }
            ProcessError::AlreadyExited(pid) => SyscallError::NoSuchProcess(pid),
            ProcessError::ProcessLimitReached => SyscallError::ProcessLimitReached,
            ProcessError::Halted => SyscallError::Halted,
            ProcessError::Descriptor(vfs) => vfs.into(),
            ProcessError::Spawn(_) => SyscallError::SpawnFailed,
        }
    }
}

/// A decoded system call with its arguments.
#[derive(Debug)]
pub enum Syscall<'a> {
    Halt,
    Exit { status: i32 },
    Exec {
        image: &'a str,
        args: &'a [&'a str],
        /// Descriptors shared with the child.
        inherit: &'a [Fd],
    },
    Join { pid: i32, status: &'a mut i32 },
    Creat { path: &'a str },
    Open { path: &'a str },
    Read { fd: Fd, buf: &'a mut [u8] },
    Write { fd: Fd, buf: &'a [u8] },
    Close { fd: Fd },
    Unlink { path: &'a str },
}

impl Syscall<'_> {
    pub fn number(&self) -> SyscallNumber {
        match self {
            Syscall::Halt => SyscallNumber::Halt,
            Syscall::Exit { .. } => SyscallNumber::Exit,
            Syscall::Exec { .. } => SyscallNumber::Exec,
            Syscall::Join { .. } => SyscallNumber::Join,
            Syscall::Creat { .. } => SyscallNumber::Creat,
            Syscall::Open { .. } => SyscallNumber::Open,
            Syscall::Read { .. } => SyscallNumber::Read,
            Syscall::Write { .. } => SyscallNumber::Write,
            Syscall::Close { .. } => SyscallNumber::Close,
            Syscall::Unlink { .. } => SyscallNumber::Unlink,
        }
    }
}

/// Dispatch a system call made by `caller`.
///
/// `Exit` and `Halt` only update kernel state here; leaving the calling task
/// is up to the caller (see [`UserContext::exit`]).
pub fn dispatch(kernel: &Arc<Kernel>, caller: ProcessId, call: Syscall<'_>) -> i32 {
    let number = call.number();
    let result = handlers::handle(kernel, caller, call);

    if TRACE_SYSCALLS {
        log::trace!("[SYSCALL] pid {} {} -> {:?}", caller, number.name(), result);
    }

    match result {
        Ok(value) => value,
        Err(err) => {
            log::debug!("[SYSCALL] pid {} {} failed: {}", caller, number.name(), err);
            err.sentinel()
        }
    }
}
