//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during container encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The container bytes violate the framing format.
    ///
    /// This is fatal for the read: no partial row list is recoverable.
    #[error("corrupt container: {message}")]
    CorruptContainer {
        /// Description of the framing violation.
        message: String,
    },

    /// Row serialization or deserialization failed.
    #[error("row serialization failed: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// Payload compression or decompression failed.
    #[error("compression failed: {message}")]
    Compression {
        /// Description of the compression error.
        message: String,
    },
}

impl CodecError {
    /// Creates a corrupt container error.
    pub fn corrupt_container(message: impl Into<String>) -> Self {
        Self::CorruptContainer {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a compression error.
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }
}
