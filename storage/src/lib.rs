//! Storage subsystem for Joinix.
//!
//! The kernel's descriptor layer never touches a medium directly. It talks to a
//! [`StorageBackend`], which resolves names to [`FileHandle`]s and performs
//! positioned reads and writes on them. This crate provides:
//! - The backend trait and its error type
//! - Open flags shared with the kernel's descriptor layer
//! - [`RamFs`], a flat in-memory namespace used by the host kernel and tests

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod ramfs;

use alloc::string::String;
use core::fmt;

pub use ramfs::RamFs;

/// Maximum path length in bytes.
pub const MAX_PATH_LEN: usize = 256;

/// Largest file a backend is required to hold (4 GiB - 1).
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Storage subsystem error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No file with that name.
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// Empty path or path with an embedded NUL.
    #[error("invalid path")]
    InvalidPath,
    /// Path longer than [`MAX_PATH_LEN`].
    #[error("path longer than {} bytes", MAX_PATH_LEN)]
    NameTooLong,
    /// Handle was never issued or has been released.
    #[error("invalid file handle {0}")]
    InvalidHandle(FileHandle),
    /// Write would grow the file past [`MAX_FILE_SIZE`].
    #[error("file would exceed {} bytes", MAX_FILE_SIZE)]
    FileTooLarge,
}

/// Opaque reference to an opened file inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHandle(pub u64);

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags::bitflags! {
    /// Flags for opening files.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading.
        const READ = 0x0001;
        /// Open for writing.
        const WRITE = 0x0002;
        /// Create if not exists.
        const CREATE = 0x0004;
        /// Truncate to zero length.
        const TRUNCATE = 0x0008;
    }
}

impl OpenFlags {
    /// Flags used by the `open` syscall.
    pub const OPEN: Self = Self::READ.union(Self::WRITE);

    /// Flags used by the `creat` syscall.
    pub const CREAT: Self = Self::OPEN.union(Self::CREATE).union(Self::TRUNCATE);
}

/// A file store the kernel can open, read, write and unlink files in.
///
/// Every successful [`open`](Self::open) hands out a handle that stays valid
/// until it is passed to [`release`](Self::release), even if the name is
/// unlinked in between.
pub trait StorageBackend: Send + Sync {
    /// Open `path`, creating and/or truncating it as `flags` ask.
    fn open(&self, path: &str, flags: OpenFlags) -> Result<FileHandle, StorageError>;

    /// Read up to `buf.len()` bytes at `offset`. Returns 0 at end of file.
    fn read_at(&self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write `data` at `offset`, growing the file as needed.
    fn write_at(&self, handle: FileHandle, offset: u64, data: &[u8]) -> Result<usize, StorageError>;

    /// Current file length.
    fn len(&self, handle: FileHandle) -> Result<u64, StorageError>;

    /// Drop a handle obtained from `open`.
    fn release(&self, handle: FileHandle);

    /// Remove a name. Open handles keep the data alive.
    fn unlink(&self, path: &str) -> Result<(), StorageError>;

    /// Whether a name currently exists.
    fn exists(&self, path: &str) -> bool;

    /// Open an existing file for reading and writing.
    fn resolve(&self, path: &str) -> Result<FileHandle, StorageError> {
        self.open(path, OpenFlags::OPEN)
    }

    /// Create `path` if missing and truncate it to zero length.
    fn create(&self, path: &str) -> Result<FileHandle, StorageError> {
        self.open(path, OpenFlags::CREAT)
    }
}

/// Check a path against the namespace rules shared by all backends.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || path.contains('\0') {
        return Err(StorageError::InvalidPath);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(StorageError::NameTooLong);
    }
    Ok(())
}
