//! Error types for rowstore core.

use rowstore_codec::CodecError;
use rowstore_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in rowstore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Null, empty, or invalid-shaped input.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid input.
        message: String,
    },

    /// Operation attempted in an illegal state, such as a disposed
    /// channel or a mutation of an assigned record identity.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state violation.
        message: String,
    },

    /// A record lookup missed where the operation requires a hit.
    #[error("record {id} not found in table {table}")]
    NotFound {
        /// Table that was searched.
        table: String,
        /// Identity that was not found.
        id: i64,
    },

    /// The container file violates the framing format. Fatal for the
    /// read; no partial row list is returned.
    #[error("corrupt container: {message}")]
    CorruptContainer {
        /// Description of the framing violation.
        message: String,
    },

    /// A referential-integrity constraint failed. Raised before any
    /// bytes are written; the container file is left unmodified.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation {
        /// Description of the violated relationship.
        message: String,
    },

    /// Another channel holds the exclusive lock on the table file.
    #[error("table file locked: {path}")]
    TableLocked {
        /// Path of the locked container file.
        path: PathBuf,
    },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Codec error other than container corruption.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates the invalid state error for a disposed resource.
    pub fn disposed(what: impl Into<String>) -> Self {
        Self::InvalidState {
            message: format!("{} has been closed", what.into()),
        }
    }

    /// Creates a not found error.
    pub fn not_found(table: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            table: table.into(),
            id,
        }
    }

    /// Creates a corrupt container error.
    pub fn corrupt_container(message: impl Into<String>) -> Self {
        Self::CorruptContainer {
            message: message.into(),
        }
    }

    /// Creates a foreign key violation error.
    pub fn foreign_key_violation(message: impl Into<String>) -> Self {
        Self::ForeignKeyViolation {
            message: message.into(),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Locked { path } => Self::TableLocked { path },
            other => Self::Storage(other),
        }
    }
}

impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::CorruptContainer { message } => Self::CorruptContainer { message },
            other => Self::Codec(other),
        }
    }
}
