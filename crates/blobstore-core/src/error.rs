//! Error types for the blobstore core library.

use thiserror::Error;

use crate::model::EmptyResult;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The failure taxonomy every backend is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Requested key does not exist
    NotFound,
    /// Caller violated a precondition
    InvalidInput,
    /// Transport, disk, permission or protocol failure
    IoFailure,
    /// Aborted through the operation's cancellation token
    Cancelled,
}

/// Main error type for the blobstore library.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An empty operation failed part-way; `deleted` lists what was removed
    /// before the failure.
    #[error("Empty aborted after deleting {} object(s): {source}", .deleted.len())]
    EmptyAborted {
        deleted: EmptyResult,
        #[source]
        source: Box<Error>,
    },
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Invalid key, payload or continuation token
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Storage backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Classify this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Serialization(_) => ErrorKind::InvalidInput,
            Error::Storage(e) => e.kind(),
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::IoFailure,
            Error::EmptyAborted { source, .. } => source.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    pub(crate) fn not_found(key: &str) -> Self {
        Error::Storage(StorageError::NotFound(key.to_string()))
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::Storage(StorageError::InvalidInput(message.into()))
    }

    pub(crate) fn backend(message: impl Into<String>) -> Self {
        Error::Storage(StorageError::Backend(message.into()))
    }
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::InvalidInput(_) => ErrorKind::InvalidInput,
            StorageError::PermissionDenied(_) | StorageError::Backend(_) => ErrorKind::IoFailure,
            StorageError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
