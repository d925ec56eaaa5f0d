//! File Descriptor Table
//!
//! Maps small integer descriptors to open files. Every process owns exactly
//! one table; descriptors 0 and 1 are bound to the console from creation and
//! cannot be closed.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::file::OpenFile;
use super::{Fd, VfsError, STDIN, STDOUT};

/// Slots taken by the standard streams.
const STANDARD_STREAMS: usize = 2;

/// What a descriptor refers to.
#[derive(Debug, Clone)]
pub enum FdEntry {
    /// Console input.
    Stdin,
    /// Console output.
    Stdout,
    /// Regular file, possibly shared with other tables.
    File(Arc<OpenFile>),
}

impl FdEntry {
    /// Whether this is one of the standard streams.
    pub fn is_standard(&self) -> bool {
        matches!(self, FdEntry::Stdin | FdEntry::Stdout)
    }
}

/// Per-process descriptor table.
#[derive(Debug)]
pub struct FdTable {
    entries: BTreeMap<Fd, FdEntry>,
    capacity: usize,
}

impl FdTable {
    /// Table with `capacity` slots and the standard streams pre-bound.
    pub fn new(capacity: usize) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(STDIN, FdEntry::Stdin);
        entries.insert(STDOUT, FdEntry::Stdout);
        Self {
            entries,
            capacity: capacity.max(STANDARD_STREAMS),
        }
    }

    /// Entry bound to `fd`.
    pub fn get(&self, fd: Fd) -> Result<&FdEntry, VfsError> {
        self.entries.get(&fd).ok_or(VfsError::InvalidFd(fd))
    }

    /// Bind `file` to the lowest free descriptor.
    pub fn install(&mut self, file: Arc<OpenFile>) -> Result<Fd, VfsError> {
        let fd = self.lowest_free().ok_or(VfsError::TooManyOpenFiles)?;
        self.entries.insert(fd, FdEntry::File(file));
        Ok(fd)
    }

    /// Bind `file` to a specific descriptor, which must be free.
    pub fn install_at(&mut self, fd: Fd, file: Arc<OpenFile>) -> Result<(), VfsError> {
        if fd < 0 || fd as usize >= self.capacity || self.entries.contains_key(&fd) {
            return Err(VfsError::InvalidFd(fd));
        }
        self.entries.insert(fd, FdEntry::File(file));
        Ok(())
    }

    /// Unbind a regular-file descriptor and hand back its file.
    ///
    /// The file's refcount drops when the returned `Arc` does.
    pub fn close(&mut self, fd: Fd) -> Result<Arc<OpenFile>, VfsError> {
        match self.entries.get(&fd) {
            None => Err(VfsError::InvalidFd(fd)),
            Some(entry) if entry.is_standard() => Err(VfsError::Protected(fd)),
            Some(_) => match self.entries.remove(&fd) {
                Some(FdEntry::File(file)) => Ok(file),
                _ => Err(VfsError::InvalidFd(fd)),
            },
        }
    }

    /// Unbind every regular file, leaving the standard streams.
    pub fn close_all(&mut self) -> Vec<Arc<OpenFile>> {
        let fds: Vec<Fd> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_standard())
            .map(|(fd, _)| *fd)
            .collect();
        fds.into_iter()
            .filter_map(|fd| match self.entries.remove(&fd) {
                Some(FdEntry::File(file)) => Some(file),
                _ => None,
            })
            .collect()
    }

    /// Number of regular files bound.
    pub fn open_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_standard()).count()
    }

    /// All bound descriptors, ascending.
    pub fn descriptors(&self) -> Vec<Fd> {
        self.entries.keys().copied().collect()
    }

    /// Slot count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lowest_free(&self) -> Option<Fd> {
        (0..self.capacity)
            .filter_map(|slot| Fd::try_from(slot).ok())
            .find(|fd| !self.entries.contains_key(fd))
    }
}
