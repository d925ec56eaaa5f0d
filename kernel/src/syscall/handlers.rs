//! System call handlers.
//!
//! One handler per call. Handlers return typed errors; [`super::dispatch`]
//! turns them into the failure sentinel.

use alloc::sync::Arc;

use super::{Syscall, SyscallError, SyscallResult};
use crate::process::{ExecOptions, ExitStatus, ProcessId};
use crate::system::Kernel;
use crate::vfs::Fd;

/// Handle a system call.
pub fn handle(kernel: &Arc<Kernel>, caller: ProcessId, call: Syscall<'_>) -> SyscallResult {
    match call {
        Syscall::Halt => handle_halt(kernel, caller),
        Syscall::Exit { status } => handle_exit(kernel, caller, status),
        Syscall::Exec {
            image,
            args,
            inherit,
        } => handle_exec(kernel, caller, image, args, inherit),
        Syscall::Join { pid, status } => handle_join(kernel, caller, pid, status),
        Syscall::Creat { path } => handle_creat(kernel, caller, path),
        Syscall::Open { path } => handle_open(kernel, caller, path),
        Syscall::Read { fd, buf } => handle_read(kernel, caller, fd, buf),
        Syscall::Write { fd, buf } => handle_write(kernel, caller, fd, buf),
        Syscall::Close { fd } => handle_close(kernel, caller, fd),
        Syscall::Unlink { path } => handle_unlink(kernel, path),
    }
}

/// The caller ends with `Exited(0)` before the machine stops, so a parent
/// blocked in `join` on it still gets a status.
fn handle_halt(kernel: &Arc<Kernel>, caller: ProcessId) -> SyscallResult {
    if let Err(err) = kernel.terminate(caller, ExitStatus::Exited(0)) {
        log::debug!("[SYSCALL] halt by {} without exit: {}", caller, err);
    }
    kernel.halt();
    Ok(0)
}

fn handle_exit(kernel: &Arc<Kernel>, caller: ProcessId, status: i32) -> SyscallResult {
    kernel.terminate(caller, ExitStatus::Exited(status))?;
    Ok(0)
}

/// Start `image`; returns the child's PID.
fn handle_exec(
    kernel: &Arc<Kernel>,
    caller: ProcessId,
    image: &str,
    args: &[&str],
    inherit: &[Fd],
) -> SyscallResult {
    let options = inherit
        .iter()
        .fold(ExecOptions::new(), |options, fd| options.inherit(*fd));
    let pid = kernel.exec(caller, image, args, &options)?;
    Ok(pid.as_raw())
}

/// Returns 1 for a normal exit and 0 for a fault; the slot gets the status
/// either way.
fn handle_join(kernel: &Arc<Kernel>, caller: ProcessId, pid: i32, status: &mut i32) -> SyscallResult {
    let target = ProcessId::from_raw(pid).ok_or(SyscallError::NotAChild(pid))?;
    let exit = kernel.join(caller, target)?;
    *status = exit.code();
    Ok(if exit.is_normal() { 1 } else { 0 })
}

fn handle_creat(kernel: &Arc<Kernel>, caller: ProcessId, path: &str) -> SyscallResult {
    Ok(kernel.create(caller, path)?)
}

fn handle_open(kernel: &Arc<Kernel>, caller: ProcessId, path: &str) -> SyscallResult {
    Ok(kernel.open(caller, path)?)
}

fn handle_read(kernel: &Arc<Kernel>, caller: ProcessId, fd: Fd, buf: &mut [u8]) -> SyscallResult {
    let limit = buf.len().min(i32::MAX as usize);
    let count = kernel.read(caller, fd, &mut buf[..limit])?;
    Ok(count as i32)
}

fn handle_write(kernel: &Arc<Kernel>, caller: ProcessId, fd: Fd, buf: &[u8]) -> SyscallResult {
    let limit = buf.len().min(i32::MAX as usize);
    let count = kernel.write(caller, fd, &buf[..limit])?;
    Ok(count as i32)
}

fn handle_close(kernel: &Arc<Kernel>, caller: ProcessId, fd: Fd) -> SyscallResult {
    kernel.close(caller, fd)?;
    Ok(0)
}

fn handle_unlink(kernel: &Arc<Kernel>, path: &str) -> SyscallResult {
    kernel.unlink(path)?;
    Ok(0)
}
