//! In-memory image registry.
//!
//! Maps image names to Rust entry points. This is the loader used on hosted
//! builds: "loading" an image is a name lookup.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::RwLock;

use super::{validate_request, ExecutionContext, LoadError, Loader, ProgramEntry};
use crate::config::EXECUTABLE_SUFFIX;
use crate::syscall::UserContext;

/// Name-to-entry-point table.
pub struct ImageRegistry {
    images: RwLock<BTreeMap<String, ProgramEntry>>,
    suffix: String,
}

impl ImageRegistry {
    /// Empty registry requiring the default executable suffix.
    pub fn new() -> Self {
        Self::with_suffix(EXECUTABLE_SUFFIX)
    }

    /// Empty registry requiring a custom suffix.
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            images: RwLock::new(BTreeMap::new()),
            suffix: String::from(suffix),
        }
    }

    /// Register (or replace) an image.
    pub fn register<F>(&self, name: &str, entry: F)
    where
        F: Fn(&UserContext) -> i32 + Send + Sync + 'static,
    {
        self.images.write().insert(String::from(name), Arc::new(entry));
        log::debug!("[LOADER] registered {}", name);
    }

    /// Remove an image; returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        self.images.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.read().contains_key(name)
    }

    /// Registered image names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.images.read().keys().cloned().collect()
    }
}

impl Default for ImageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for ImageRegistry {
    fn load(&self, image: &str, args: &[String]) -> Result<ExecutionContext, LoadError> {
        validate_request(image, args, &self.suffix)?;
        let entry = self
            .images
            .read()
            .get(image)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(String::from(image)))?;
        log::debug!("[LOADER] loaded {} ({} args)", image, args.len());
        Ok(ExecutionContext::new(image, args.to_vec(), entry))
    }
}
