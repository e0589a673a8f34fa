//! Error types for STL codec operations.

use thiserror::Error;

/// Result type for STL codec operations.
pub type StlResult<T> = Result<T, StlError>;

/// Errors that can occur while decoding or encoding STL.
#[derive(Debug, Error)]
pub enum StlError {
    /// The content is not parseable as STL.
    #[error("invalid STL: {message}")]
    InvalidFormat {
        /// Description of what was malformed.
        message: String,
    },

    /// I/O error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StlError {
    /// Create an `InvalidFormat` error with the given message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}
