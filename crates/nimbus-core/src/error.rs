//! Error types shared by every backend
//!
//! [`Error`] is the single error vocabulary the core hands back to callers.
//! Backends convert their wire-level failures into it so that filesystem
//! operations can react to the kind (not found, is a file, transient, ...)
//! without knowing which provider produced it.

use std::time::Duration;

use thiserror::Error;

/// Boxed error from a backend adapter, kept as the source of [`Error::Backend`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in core and backend operations
#[derive(Debug, Error)]
pub enum Error {
    /// An object is absent
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A directory is absent
    #[error("Directory not found: {0}")]
    DirNotFound(String),

    /// A directory-scoped operation found a file at the path
    ///
    /// Not fatal: the caller re-scopes the operation to the single file.
    #[error("Is a file, not a directory: {0}")]
    IsFile(String),

    /// The target directory already exists
    #[error("Directory already exists: {0}")]
    DirExists(String),

    /// The directory still has children
    #[error("Directory not empty: {0}")]
    DirNotEmpty(String),

    /// Rate limiting or a transient server failure that outlived the retry budget
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Configuration or contract violation; never retried
    #[error("Fatal: {0}")]
    Fatal(String),

    /// An operation did not finish before its deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend cannot perform the operation
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Local I/O failure (e.g. reading the upload stream)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure reported by a backend adapter
    #[error("Backend error: {0}")]
    Backend(#[source] BoxError),
}

impl Error {
    /// Wraps an adapter error as [`Error::Backend`]
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Error::Backend(err.into())
    }

    /// Returns true for the `NotFound`/`DirNotFound` kinds
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::DirNotFound(_))
    }

    /// Returns true if the error belongs to the transient class
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
