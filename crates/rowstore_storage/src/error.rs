//! Error types for the storage crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the file layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another handle holds the exclusive lock on the file.
    #[error("table file locked: {path}")]
    Locked {
        /// Path of the locked file.
        path: PathBuf,
    },
}
