//! Error types for the split pipeline.

use split_csg::SolidStatus;
use split_stl::StlError;
use thiserror::Error;

/// Result type for split pipeline operations.
pub type SplitResult<T> = Result<T, SplitError>;

/// Errors that can end a split job.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The input is not parseable as STL.
    #[error("invalid STL: {message}")]
    InvalidFormat {
        /// What was malformed.
        message: String,
    },

    /// The input mesh is not a closed 2-manifold solid.
    #[error("model is not a closed manifold solid")]
    NonManifoldInput,

    /// A kernel operation reported a failure status.
    #[error("solid operation failed: {status:?}")]
    CsgFailure {
        /// Status reported by the kernel.
        status: SolidStatus,
    },

    /// The kernel ran out of headroom on an intermediate result.
    #[error("solid operation exceeded complexity limits")]
    CsgMemoryExhaustion,

    /// No grid cell produced a non-empty part.
    #[error("no part contained any geometry")]
    EmptyResult,

    /// Storage, temp-directory, or archive failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive construction failure.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The job was cancelled cooperatively.
    #[error("Job was cancelled")]
    Cancelled,

    /// The job exceeded its hard deadline.
    #[error("job timed out")]
    Timeout,

    /// A request parameter was out of range.
    #[error("validation failed: {message}")]
    Validation {
        /// What was rejected.
        message: String,
    },
}

impl SplitError {
    /// Create a `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Wrap a non-ok kernel status, folding complexity blowups into
    /// [`SplitError::CsgMemoryExhaustion`].
    #[must_use]
    pub fn from_status(status: SolidStatus) -> Self {
        match status {
            SolidStatus::ResultTooComplex => Self::CsgMemoryExhaustion,
            other => Self::CsgFailure { status: other },
        }
    }

    /// Message suitable for end users.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFormat { .. } => {
                "The uploaded file could not be read as an STL model.".to_string()
            }
            Self::NonManifoldInput => {
                "The model is not watertight. Repair the mesh and try again.".to_string()
            }
            Self::CsgFailure { .. } | Self::CsgMemoryExhaustion => {
                "The model is too large or complex to process.".to_string()
            }
            Self::EmptyResult => "The model lies outside the cutting bounds.".to_string(),
            Self::Cancelled => "Job was cancelled".to_string(),
            Self::Timeout => "The job exceeded the processing time limit.".to_string(),
            Self::Validation { message } => message.clone(),
            Self::Io(_) | Self::Zip(_) => "An internal storage error occurred.".to_string(),
        }
    }
}

impl From<StlError> for SplitError {
    fn from(err: StlError) -> Self {
        match err {
            StlError::InvalidFormat { message } => Self::InvalidFormat { message },
            StlError::Io(io) => Self::Io(io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            SplitError::from_status(SolidStatus::ResultTooComplex),
            SplitError::CsgMemoryExhaustion
        ));
        assert!(matches!(
            SplitError::from_status(SolidStatus::NonManifold),
            SplitError::CsgFailure { .. }
        ));
    }

    #[test]
    fn cancelled_message_is_stable() {
        // The runtime stores this string as the job failure reason
        assert_eq!(SplitError::Cancelled.to_string(), "Job was cancelled");
    }

    #[test]
    fn user_messages_hide_internals() {
        let err = SplitError::CsgMemoryExhaustion;
        assert!(err.user_message().contains("too large or complex"));
    }
}
