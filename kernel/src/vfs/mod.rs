//! Virtual File System
//!
//! Per-process descriptor tables over a shared [`StorageBackend`]. Syscall
//! handlers go through [`Vfs`], which resolves names, manages the open file
//! objects and routes the standard streams to the [`Console`].
//!
//! Table locks are held only long enough to look up or (un)bind an entry;
//! the I/O itself runs on a cloned `Arc<OpenFile>`.

pub mod console;
pub mod fd;
pub mod file;

use alloc::string::String;
use alloc::sync::Arc;
use spin::Mutex;
use storage::{OpenFlags, StorageBackend, StorageError};

pub use console::Console;
pub use fd::{FdEntry, FdTable};
pub use file::OpenFile;

/// Descriptor number as seen by user programs.
pub type Fd = i32;

/// Console input descriptor.
pub const STDIN: Fd = 0;

/// Console output descriptor.
pub const STDOUT: Fd = 1;

/// VFS error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("no such file: {0}")]
    NotFound(String),
    #[error("bad file descriptor {0}")]
    InvalidFd(Fd),
    #[error("descriptor {0} is not open for reading")]
    NotReadable(Fd),
    #[error("descriptor {0} is not open for writing")]
    NotWritable(Fd),
    #[error("descriptor {0} is a standard stream")]
    Protected(Fd),
    #[error("descriptor table full")]
    TooManyOpenFiles,
    #[error("invalid path")]
    InvalidPath,
    #[error("storage: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for VfsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileNotFound(path) => VfsError::NotFound(path),
            StorageError::InvalidPath | StorageError::NameTooLong => VfsError::InvalidPath,
            other => VfsError::Storage(other),
        }
    }
}

/// Descriptor operations over one storage backend and console.
pub struct Vfs {
    storage: Arc<dyn StorageBackend>,
    console: Arc<Console>,
    max_files: usize,
}

impl Vfs {
    pub fn new(storage: Arc<dyn StorageBackend>, console: Arc<Console>, max_files: usize) -> Self {
        Self {
            storage,
            console,
            max_files,
        }
    }

    /// Fresh table with only the standard streams bound.
    pub fn new_table(&self) -> FdTable {
        FdTable::new(self.max_files)
    }

    /// Fresh table that additionally shares `fds` with `parent`, under the
    /// same numbers. Only bound regular files can be shared.
    pub fn inherit(&self, parent: &Mutex<FdTable>, fds: &[Fd]) -> Result<FdTable, VfsError> {
        let mut table = self.new_table();
        if fds.is_empty() {
            return Ok(table);
        }

        let parent = parent.lock();
        for &fd in fds {
            match parent.get(fd)? {
                FdEntry::File(file) => table.install_at(fd, Arc::clone(file))?,
                FdEntry::Stdin | FdEntry::Stdout => return Err(VfsError::InvalidFd(fd)),
            }
        }
        Ok(table)
    }

    /// Resolve `path` and bind it to the lowest free descriptor of `files`.
    pub fn open(&self, files: &Mutex<FdTable>, path: &str, flags: OpenFlags) -> Result<Fd, VfsError> {
        let file = OpenFile::open(Arc::clone(&self.storage), path, flags)?;
        // On a full table `file` is dropped here, releasing the handle.
        let fd = files.lock().install(file)?;
        log::debug!("[VFS] open {} -> fd {}", path, fd);
        Ok(fd)
    }

    /// Read from `fd` at its cursor.
    pub fn read(&self, files: &Mutex<FdTable>, fd: Fd, buf: &mut [u8]) -> Result<usize, VfsError> {
        let entry = files.lock().get(fd)?.clone();
        match entry {
            FdEntry::Stdin => Ok(self.console.read(buf)),
            FdEntry::Stdout => Err(VfsError::NotReadable(fd)),
            FdEntry::File(file) if !file.is_readable() => Err(VfsError::NotReadable(fd)),
            FdEntry::File(file) => Ok(file.read(buf)?),
        }
    }

    /// Write to `fd` at its cursor.
    pub fn write(&self, files: &Mutex<FdTable>, fd: Fd, data: &[u8]) -> Result<usize, VfsError> {
        let entry = files.lock().get(fd)?.clone();
        match entry {
            FdEntry::Stdout => Ok(self.console.write(data)),
            FdEntry::Stdin => Err(VfsError::NotWritable(fd)),
            FdEntry::File(file) if !file.is_writable() => Err(VfsError::NotWritable(fd)),
            FdEntry::File(file) => Ok(file.write(data)?),
        }
    }

    /// Unbind `fd`.
    pub fn close(&self, files: &Mutex<FdTable>, fd: Fd) -> Result<(), VfsError> {
        let file = files.lock().close(fd)?;
        log::debug!(
            "[VFS] close fd {} ({}, {} refs left)",
            fd,
            file.path(),
            OpenFile::refcount(&file) - 1
        );
        Ok(())
    }

    /// Remove a name from storage; open descriptors keep the data.
    pub fn unlink(&self, path: &str) -> Result<(), VfsError> {
        self.storage.unlink(path)?;
        log::debug!("[VFS] unlink {}", path);
        Ok(())
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use storage::RamFs;

    fn vfs_with(fs: RamFs) -> (Vfs, Arc<RamFs>) {
        let fs = Arc::new(fs);
        let vfs = Vfs::new(fs.clone(), Arc::new(Console::new()), 16);
        (vfs, fs)
    }

    #[test]
    fn test_open_read_until_eof() {
        let (vfs, _) = vfs_with(RamFs::new().with_file("test.txt", b"line one\nline two\n").unwrap());
        let files = Mutex::new(vfs.new_table());

        let fd = vfs.open(&files, "test.txt", OpenFlags::OPEN).unwrap();
        assert_eq!(fd, 2);

        let mut collected = Vec::new();
        let mut buf = [0u8; 5];
        loop {
            let n = vfs.read(&files, fd, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(collected, b"line one\nline two\n");

        vfs.close(&files, fd).unwrap();
        assert_eq!(vfs.read(&files, fd, &mut buf), Err(VfsError::InvalidFd(fd)));
        assert_eq!(vfs.write(&files, fd, b"x"), Err(VfsError::InvalidFd(fd)));
        assert_eq!(vfs.close(&files, fd), Err(VfsError::InvalidFd(fd)));
    }

    #[test]
    fn test_open_missing_binds_nothing() {
        let (vfs, fs) = vfs_with(RamFs::new());
        let files = Mutex::new(vfs.new_table());
        assert_eq!(
            vfs.open(&files, "missing.txt", OpenFlags::OPEN),
            Err(VfsError::NotFound("missing.txt".into()))
        );
        assert_eq!(files.lock().descriptors(), [0, 1]);
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_full_table_releases_handle() {
        let fs = Arc::new(RamFs::new().with_file("f", b"").unwrap());
        let vfs = Vfs::new(fs.clone(), Arc::new(Console::new()), 3);
        let files = Mutex::new(vfs.new_table());

        vfs.open(&files, "f", OpenFlags::OPEN).unwrap();
        assert_eq!(vfs.open(&files, "f", OpenFlags::OPEN), Err(VfsError::TooManyOpenFiles));
        assert_eq!(fs.open_handles(), 1);
    }

    #[test]
    fn test_standard_streams() {
        let (vfs, _) = vfs_with(RamFs::new());
        let files = Mutex::new(vfs.new_table());
        vfs.console().push_input(b"in");

        let mut buf = [0u8; 8];
        assert_eq!(vfs.read(&files, STDIN, &mut buf).unwrap(), 2);
        assert_eq!(vfs.read(&files, STDIN, &mut buf).unwrap(), 0);
        assert_eq!(vfs.write(&files, STDOUT, b"out").unwrap(), 3);
        assert_eq!(vfs.console().output_string(), "out");

        assert_eq!(vfs.write(&files, STDIN, b"x"), Err(VfsError::NotWritable(STDIN)));
        assert_eq!(vfs.read(&files, STDOUT, &mut buf), Err(VfsError::NotReadable(STDOUT)));
        assert_eq!(vfs.close(&files, STDOUT), Err(VfsError::Protected(STDOUT)));
    }

    #[test]
    fn test_read_only_file_rejects_write() {
        let (vfs, _) = vfs_with(RamFs::new().with_file("ro", b"data").unwrap());
        let files = Mutex::new(vfs.new_table());
        let fd = vfs.open(&files, "ro", OpenFlags::READ).unwrap();
        assert_eq!(vfs.write(&files, fd, b"x"), Err(VfsError::NotWritable(fd)));
    }

    #[test]
    fn test_inherit_shares_cursor() {
        let (vfs, _) = vfs_with(RamFs::new().with_file("shared", b"abcdef").unwrap());
        let parent = Mutex::new(vfs.new_table());
        let fd = vfs.open(&parent, "shared", OpenFlags::OPEN).unwrap();

        let child = Mutex::new(vfs.inherit(&parent, &[fd]).unwrap());
        let mut buf = [0u8; 3];
        vfs.read(&child, fd, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        vfs.read(&parent, fd, &mut buf).unwrap();
        assert_eq!(&buf, b"def");

        assert_eq!(vfs.inherit(&parent, &[9]).unwrap_err(), VfsError::InvalidFd(9));
        assert_eq!(vfs.inherit(&parent, &[STDOUT]).unwrap_err(), VfsError::InvalidFd(STDOUT));
    }

    #[test]
    fn test_unlink_keeps_open_data() {
        let (vfs, fs) = vfs_with(RamFs::new().with_file("tmp", b"keep").unwrap());
        let files = Mutex::new(vfs.new_table());
        let fd = vfs.open(&files, "tmp", OpenFlags::OPEN).unwrap();

        vfs.unlink("tmp").unwrap();
        assert!(matches!(vfs.open(&files, "tmp", OpenFlags::OPEN), Err(VfsError::NotFound(_))));

        let mut buf = [0u8; 8];
        assert_eq!(vfs.read(&files, fd, &mut buf).unwrap(), 4);
        vfs.close(&files, fd).unwrap();
        assert_eq!(fs.inode_count(), 0);
        assert_eq!(vfs.unlink("tmp"), Err(VfsError::NotFound("tmp".into())));
    }

    #[test]
    fn test_storage_error_mapping() {
        assert_eq!(VfsError::from(StorageError::NameTooLong), VfsError::InvalidPath);
        assert_eq!(
            VfsError::from(StorageError::FileTooLarge),
            VfsError::Storage(StorageError::FileTooLarge)
        );
    }
}
