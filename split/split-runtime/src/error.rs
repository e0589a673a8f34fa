//! Error types for the job runtime.

use thiserror::Error;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors from queue, worker, and configuration handling.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A submitted payload failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// What was rejected.
        message: String,
    },

    /// Bad or missing configuration at startup.
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },

    /// The broker refused or lost an operation.
    #[error("broker error: {message}")]
    Broker {
        /// What failed.
        message: String,
    },

    /// Object storage failure.
    #[error(transparent)]
    Store(#[from] split_store::StoreError),

    /// Engine failure (also carries cancellation and timeout).
    #[error(transparent)]
    Engine(#[from] split_engine::SplitError),

    /// Payload encoding failure on the broker wire.
    #[error("payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Filesystem failure around working directories.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Create a `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a `Broker` error.
    #[must_use]
    pub fn broker(message: impl Into<String>) -> Self {
        Self::Broker {
            message: message.into(),
        }
    }
}
