//! In-memory filesystem.
//!
//! A flat namespace of byte vectors. Names map to inodes; an inode lives until
//! it is both unlinked and no longer open.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;
use spin::RwLock;

use crate::{validate_path, FileHandle, OpenFlags, StorageBackend, StorageError, MAX_FILE_SIZE};

struct Inode {
    data: Vec<u8>,
    /// Handles currently issued for this inode.
    open_count: usize,
    /// Whether a name still points at this inode.
    linked: bool,
}

struct RamFsInner {
    names: BTreeMap<String, u64>,
    inodes: HashMap<u64, Inode>,
    /// Issued handle -> inode number.
    handles: HashMap<FileHandle, u64>,
    next_ino: u64,
    next_handle: u64,
}

impl RamFsInner {
    fn alloc_inode(&mut self, data: Vec<u8>) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.inodes.insert(
            ino,
            Inode {
                data,
                open_count: 0,
                linked: true,
            },
        );
        ino
    }

    fn inode(&self, handle: FileHandle) -> Result<&Inode, StorageError> {
        self.handles
            .get(&handle)
            .and_then(|ino| self.inodes.get(ino))
            .ok_or(StorageError::InvalidHandle(handle))
    }

    fn inode_mut(&mut self, handle: FileHandle) -> Result<&mut Inode, StorageError> {
        let ino = *self
            .handles
            .get(&handle)
            .ok_or(StorageError::InvalidHandle(handle))?;
        self.inodes
            .get_mut(&ino)
            .ok_or(StorageError::InvalidHandle(handle))
    }
}

/// In-memory storage backend.
pub struct RamFs {
    inner: RwLock<RamFsInner>,
}

impl RamFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RamFsInner {
                names: BTreeMap::new(),
                inodes: HashMap::new(),
                handles: HashMap::new(),
                next_ino: 1,
                next_handle: 1,
            }),
        }
    }

    /// Builder-style [`insert`](Self::insert) for seeding fixtures.
    pub fn with_file(self, path: &str, data: &[u8]) -> Result<Self, StorageError> {
        self.insert(path, data)?;
        Ok(self)
    }

    /// Create `path` or replace its contents.
    pub fn insert(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        validate_path(path)?;
        let mut inner = self.inner.write();
        match inner.names.get(path).copied() {
            Some(ino) => {
                if let Some(inode) = inner.inodes.get_mut(&ino) {
                    inode.data = data.to_vec();
                }
            }
            None => {
                let ino = inner.alloc_inode(data.to_vec());
                inner.names.insert(path.to_string(), ino);
            }
        }
        Ok(())
    }

    /// Snapshot of the contents stored under `path`.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        let ino = inner.names.get(path)?;
        inner.inodes.get(ino).map(|inode| inode.data.clone())
    }

    /// Number of inodes alive, including unlinked ones that are still open.
    pub fn inode_count(&self) -> usize {
        self.inner.read().inodes.len()
    }

    /// Number of handles currently issued.
    pub fn open_handles(&self) -> usize {
        self.inner.read().handles.len()
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for RamFs {
    fn open(&self, path: &str, flags: OpenFlags) -> Result<FileHandle, StorageError> {
        validate_path(path)?;
        let mut inner = self.inner.write();

        let ino = match inner.names.get(path).copied() {
            Some(ino) => ino,
            None if flags.contains(OpenFlags::CREATE) => {
                let ino = inner.alloc_inode(Vec::new());
                inner.names.insert(path.to_string(), ino);
                log::debug!("[RAMFS] created {}", path);
                ino
            }
            None => return Err(StorageError::FileNotFound(path.to_string())),
        };

        let inode = inner
            .inodes
            .get_mut(&ino)
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))?;
        if flags.contains(OpenFlags::TRUNCATE) {
            inode.data.clear();
        }
        inode.open_count += 1;

        let handle = FileHandle(inner.next_handle);
        inner.next_handle += 1;
        inner.handles.insert(handle, ino);
        Ok(handle)
    }

    fn read_at(&self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        let inner = self.inner.read();
        let data = &inner.inode(handle)?.data;

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(buf.len()).min(data.len());
        let count = end - start;
        buf[..count].copy_from_slice(&data[start..end]);
        Ok(count)
    }

    fn write_at(&self, handle: FileHandle, offset: u64, data: &[u8]) -> Result<usize, StorageError> {
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or(StorageError::FileTooLarge)?;

        let mut inner = self.inner.write();
        let inode = inner.inode_mut(handle)?;

        let (start, end) = (offset as usize, end as usize);
        if inode.data.len() < end {
            inode.data.resize(end, 0);
        }
        inode.data[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn len(&self, handle: FileHandle) -> Result<u64, StorageError> {
        let inner = self.inner.read();
        Ok(inner.inode(handle)?.data.len() as u64)
    }

    fn release(&self, handle: FileHandle) {
        let mut inner = self.inner.write();
        let Some(ino) = inner.handles.remove(&handle) else {
            log::warn!("[RAMFS] release of unknown handle {}", handle);
            return;
        };

        let drop_inode = match inner.inodes.get_mut(&ino) {
            Some(inode) => {
                inode.open_count = inode.open_count.saturating_sub(1);
                inode.open_count == 0 && !inode.linked
            }
            None => false,
        };
        if drop_inode {
            inner.inodes.remove(&ino);
            log::debug!("[RAMFS] inode {} freed after last close", ino);
        }
    }

    fn unlink(&self, path: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        let mut inner = self.inner.write();
        let ino = inner
            .names
            .remove(path)
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))?;

        let still_open = match inner.inodes.get_mut(&ino) {
            Some(inode) => {
                inode.linked = false;
                inode.open_count > 0
            }
            None => false,
        };
        if !still_open {
            inner.inodes.remove(&ino);
        }
        log::debug!("[RAMFS] unlinked {} (open: {})", path, still_open);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.inner.read().names.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let fs = RamFs::new();
        assert_eq!(
            fs.resolve("missing.txt"),
            Err(StorageError::FileNotFound("missing.txt".into()))
        );
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_create_write_read() {
        let fs = RamFs::new();
        let h = fs.open("out.txt", OpenFlags::CREAT).unwrap();

        assert_eq!(fs.write_at(h, 0, b"hello").unwrap(), 5);
        assert_eq!(fs.write_at(h, 5, b" world").unwrap(), 6);
        assert_eq!(fs.len(h).unwrap(), 11);

        let mut buf = [0u8; 8];
        assert_eq!(fs.read_at(h, 0, &mut buf).unwrap(), 8);
        assert_eq!(&buf, b"hello wo");
        assert_eq!(fs.read_at(h, 8, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"rld");
        assert_eq!(fs.read_at(h, 11, &mut buf).unwrap(), 0);
        assert_eq!(fs.read_at(h, 500, &mut buf).unwrap(), 0);

        fs.release(h);
        assert_eq!(fs.contents("out.txt").unwrap(), b"hello world");
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let fs = RamFs::new().with_file("gap.bin", b"ab").unwrap();
        let h = fs.resolve("gap.bin").unwrap();
        fs.write_at(h, 4, b"z").unwrap();
        assert_eq!(fs.contents("gap.bin").unwrap(), b"ab\0\0z");
    }

    #[test]
    fn test_creat_truncates() {
        let fs = RamFs::new().with_file("t.txt", b"old data").unwrap();
        let h = fs.open("t.txt", OpenFlags::CREAT).unwrap();
        assert_eq!(fs.len(h).unwrap(), 0);
    }

    #[test]
    fn test_unlink_defers_until_last_release() {
        let fs = RamFs::new().with_file("doomed.txt", b"still here").unwrap();
        let h1 = fs.resolve("doomed.txt").unwrap();
        let h2 = fs.resolve("doomed.txt").unwrap();

        fs.unlink("doomed.txt").unwrap();
        assert!(!fs.exists("doomed.txt"));
        assert!(fs.resolve("doomed.txt").is_err());

        let mut buf = [0u8; 32];
        let n = fs.read_at(h1, 0, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"still here");

        fs.release(h1);
        assert_eq!(fs.inode_count(), 1);
        fs.release(h2);
        assert_eq!(fs.inode_count(), 0);
        assert_eq!(fs.read_at(h2, 0, &mut buf), Err(StorageError::InvalidHandle(h2)));
    }

    #[test]
    fn test_unlink_missing() {
        let fs = RamFs::new();
        assert!(matches!(fs.unlink("nope"), Err(StorageError::FileNotFound(_))));
    }

    #[test]
    fn test_write_too_large() {
        let fs = RamFs::new();
        let h = fs.open("big", OpenFlags::CREAT).unwrap();
        assert_eq!(fs.write_at(h, MAX_FILE_SIZE, b"x"), Err(StorageError::FileTooLarge));
    }
}
