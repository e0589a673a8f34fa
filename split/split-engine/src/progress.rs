//! Progress publication.

/// Sink for `(percent, message)` progress milestones.
///
/// The engine is the single writer; implementations fan the value out to
/// whoever is watching (a job progress cell, a log line, a test recorder).
/// Publishing must be cheap and must not block the pipeline.
pub trait ProgressSink: Send + Sync {
    /// Record a progress milestone.
    fn publish(&self, percent: u8, message: &str);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn publish(&self, _percent: u8, _message: &str) {}
}
