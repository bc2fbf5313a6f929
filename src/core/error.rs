//! Defines the custom error type for the `core` module.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// This enum encapsulates all possible errors that can occur while walking a
/// directory tree, evaluating filters and executing commands.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] io::Error, PathBuf),

    /// The root of a walk does not exist.
    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// The pattern could not be compiled.
    #[error("Invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// A capture group selector does not resolve to a group of the pattern.
    #[error("Group '{0}' does not exist in the pattern")]
    InvalidGroup(String),

    /// A computed file name contains characters that are not allowed.
    #[error("Invalid file name '{name}' for path {path}")]
    InvalidName { name: String, path: PathBuf },

    /// A computed file name is empty or consists of white-space only.
    #[error("New file name for path {0} is empty or white-space")]
    EmptyName(PathBuf),

    /// File content cannot be processed safely.
    #[error("Invalid data in {path}: {message}")]
    InvalidData { path: PathBuf, message: String },

    /// The options handed to a search or command are inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Represents a user-initiated cancellation of an operation.
    #[error("Operation was cancelled by the user")]
    Cancelled,
}

/// Convenience alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// How a failure affects the run that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Affects one entry only; it is reported and the run continues.
    Recoverable,
    /// The run stops cleanly, already completed work stays intact.
    Cancelled,
    /// The run aborts.
    Fatal,
}

impl CoreError {
    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(err: io::Error, path: impl AsRef<Path>) -> Self {
        CoreError::Io(err, path.as_ref().to_path_buf())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Io(..)
            | CoreError::InvalidName { .. }
            | CoreError::EmptyName(_)
            | CoreError::InvalidData { .. } => ErrorKind::Recoverable,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::NotFound(_)
            | CoreError::NotADirectory(_)
            | CoreError::Regex(_)
            | CoreError::InvalidGroup(_)
            | CoreError::Config(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Recoverable
    }

    /// The path the error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            CoreError::Io(_, path)
            | CoreError::NotFound(path)
            | CoreError::NotADirectory(path)
            | CoreError::EmptyName(path) => Some(path),
            CoreError::InvalidName { path, .. } | CoreError::InvalidData { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

/// Extension trait to attach a path to an `io::Result`.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl AsRef<Path>) -> CoreResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> CoreResult<T> {
        self.map_err(|e| CoreError::io(e, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_recoverable() {
        let err = CoreError::io(io::Error::from(io::ErrorKind::PermissionDenied), "/locked");
        assert_eq!(err.kind(), ErrorKind::Recoverable);
        assert_eq!(err.path(), Some(Path::new("/locked")));
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert_eq!(CoreError::InvalidGroup("x".into()).kind(), ErrorKind::Fatal);
        assert_eq!(
            CoreError::NotFound(PathBuf::from("/missing")).kind(),
            ErrorKind::Fatal
        );
    }

    #[test]
    fn cancellation_has_its_own_kind() {
        assert_eq!(CoreError::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(!CoreError::Cancelled.is_recoverable());
    }
}
