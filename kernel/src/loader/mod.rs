//! Executable Loader
//!
//! Turns an image name plus argument vector into an [`ExecutionContext`]
//! the scheduler can run. Binary formats are the loader's business; the
//! kernel only sees the [`Loader`] trait.
//!
//! # Validation
//!
//! Every request is checked before any lookup:
//! - name non-empty, no NUL, at most `MAX_PATH_LEN` bytes
//! - name ends with the executable suffix
//! - at most `MAX_ARGS` arguments of at most `MAX_ARG_LEN` bytes each

pub mod registry;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::config::{MAX_ARGS, MAX_ARG_LEN, MAX_PATH_LEN};
use crate::syscall::UserContext;

pub use registry::ImageRegistry;

/// Program entry point. Receives the process's syscall context and returns
/// its exit code.
pub type ProgramEntry = Arc<dyn Fn(&UserContext) -> i32 + Send + Sync>;

/// Image load error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("not an executable image: {0}")]
    NotExecutable(String),
    #[error("image name too long")]
    NameTooLong,
    #[error("invalid image name")]
    InvalidName,
    #[error("too many arguments ({0})")]
    TooManyArgs(usize),
    #[error("argument {0} too long")]
    ArgTooLong(usize),
}

/// A loaded image, ready to be handed to the scheduler.
#[derive(Clone)]
pub struct ExecutionContext {
    image: String,
    args: Arc<[String]>,
    entry: ProgramEntry,
}

impl ExecutionContext {
    pub fn new(image: impl Into<String>, args: Vec<String>, entry: ProgramEntry) -> Self {
        Self {
            image: image.into(),
            args: args.into(),
            entry,
        }
    }

    /// Image the context was loaded from.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Argument vector.
    pub fn args(&self) -> &Arc<[String]> {
        &self.args
    }

    /// Entry point.
    pub fn entry(&self) -> &ProgramEntry {
        &self.entry
    }
}

impl core::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("image", &self.image)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Builds execution contexts from image names.
pub trait Loader: Send + Sync {
    /// Load `image` with `args`. Must not have side effects on failure.
    fn load(&self, image: &str, args: &[String]) -> Result<ExecutionContext, LoadError>;
}

/// Check an exec request against the name and argument limits.
pub fn validate_request(image: &str, args: &[String], suffix: &str) -> Result<(), LoadError> {
    if image.is_empty() || image.contains('\0') {
        return Err(LoadError::InvalidName);
    }
    if image.len() > MAX_PATH_LEN {
        return Err(LoadError::NameTooLong);
    }
    if !image.ends_with(suffix) || image.len() == suffix.len() {
        return Err(LoadError::NotExecutable(String::from(image)));
    }
    if args.len() > MAX_ARGS {
        return Err(LoadError::TooManyArgs(args.len()));
    }
    if let Some(index) = args.iter().position(|arg| arg.len() > MAX_ARG_LEN) {
        return Err(LoadError::ArgTooLong(index));
    }
    Ok(())
}
