//! Open file objects.
//!
//! An [`OpenFile`] is shared by every descriptor bound to it (`Arc` strong
//! count is the refcount). The backing handle is released to storage when the
//! last reference drops.

use alloc::string::String;
use alloc::sync::Arc;
use spin::Mutex;
use storage::{FileHandle, OpenFlags, StorageBackend, StorageError};

/// A resolved file plus its read/write cursor.
pub struct OpenFile {
    path: String,
    handle: FileHandle,
    flags: OpenFlags,
    cursor: Mutex<u64>,
    storage: Arc<dyn StorageBackend>,
}

impl OpenFile {
    /// Resolve `path` in `storage` and wrap the handle with a cursor at 0.
    pub fn open(
        storage: Arc<dyn StorageBackend>,
        path: &str,
        flags: OpenFlags,
    ) -> Result<Arc<Self>, StorageError> {
        let handle = storage.open(path, flags)?;
        Ok(Arc::new(Self {
            path: String::from(path),
            handle,
            flags,
            cursor: Mutex::new(0),
            storage,
        }))
    }

    /// Path the file was opened under.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_readable(&self) -> bool {
        self.flags.contains(OpenFlags::READ)
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(OpenFlags::WRITE)
    }

    /// Current cursor.
    pub fn position(&self) -> u64 {
        *self.cursor.lock()
    }

    /// Read at the cursor and advance it by the amount read.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut cursor = self.cursor.lock();
        let count = self.storage.read_at(self.handle, *cursor, buf)?;
        *cursor += count as u64;
        Ok(count)
    }

    /// Write at the cursor and advance it by the amount written.
    pub fn write(&self, data: &[u8]) -> Result<usize, StorageError> {
        let mut cursor = self.cursor.lock();
        let count = self.storage.write_at(self.handle, *cursor, data)?;
        *cursor += count as u64;
        Ok(count)
    }

    /// Current file length.
    pub fn len(&self) -> Result<u64, StorageError> {
        self.storage.len(self.handle)
    }

    /// Number of descriptors (and in-flight operations) referencing `file`.
    pub fn refcount(file: &Arc<Self>) -> usize {
        Arc::strong_count(file)
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        log::trace!("[VFS] releasing {} ({})", self.path, self.handle);
        self.storage.release(self.handle);
    }
}

impl core::fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OpenFile")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .field("flags", &self.flags)
            .field("cursor", &self.position())
            .finish()
    }
}
