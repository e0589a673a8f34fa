//! Shared progress cells.

use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use serde::Serialize;
use split_engine::ProgressSink;
use tracing::debug;
use uuid::Uuid;

/// A `(percent, message)` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Progress {
    /// Percent complete, 0-100.
    pub percent: u8,
    /// Human-readable stage description.
    pub message: String,
}

/// Single-writer, many-reader progress record for one job.
///
/// The worker writes through the [`ProgressSink`] impl; the status endpoint
/// reads snapshots. Percent never moves backwards: late or out-of-order
/// publishes keep the highest value seen.
#[derive(Debug, Default)]
pub struct ProgressCell {
    inner: Mutex<Progress>,
}

impl ProgressCell {
    /// Create a cell at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Progress {
        self.inner.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ProgressSink for ProgressCell {
    fn publish(&self, percent: u8, message: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if percent >= inner.percent {
                inner.percent = percent.min(100);
                inner.message = message.to_string();
            }
        }
        debug!(percent, message, "progress");
    }
}

/// Progress cells for all in-flight jobs, keyed by job id.
#[derive(Debug, Default)]
pub struct ProgressBoard {
    cells: Mutex<HashMap<Uuid, Arc<ProgressCell>>>,
}

impl ProgressBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell for a job, created on first use.
    #[must_use]
    pub fn cell(&self, job_id: Uuid) -> Arc<ProgressCell> {
        match self.cells.lock() {
            Ok(mut cells) => Arc::clone(cells.entry(job_id).or_default()),
            Err(_) => Arc::new(ProgressCell::new()),
        }
    }

    /// Snapshot for a job, if one is tracked.
    #[must_use]
    pub fn get(&self, job_id: Uuid) -> Option<Progress> {
        self.cells
            .lock()
            .ok()
            .and_then(|cells| cells.get(&job_id).map(|c| c.snapshot()))
    }

    /// Drop a job's cell once it reaches a terminal state.
    pub fn remove(&self, job_id: Uuid) {
        if let Ok(mut cells) = self.cells.lock() {
            cells.remove(&job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_monotonic() {
        let cell = ProgressCell::new();
        cell.publish(30, "carving");
        cell.publish(20, "late echo");
        let snap = cell.snapshot();
        assert_eq!(snap.percent, 30);
        assert_eq!(snap.message, "carving");

        cell.publish(30, "still carving");
        assert_eq!(cell.snapshot().message, "still carving");
    }

    #[test]
    fn percent_caps_at_100() {
        let cell = ProgressCell::new();
        cell.publish(250, "overshoot");
        assert_eq!(cell.snapshot().percent, 100);
    }

    #[test]
    fn board_tracks_and_forgets() {
        let board = ProgressBoard::new();
        let id = Uuid::new_v4();
        assert!(board.get(id).is_none());

        board.cell(id).publish(10, "download");
        assert_eq!(board.get(id).map(|p| p.percent), Some(10));

        board.remove(id);
        assert!(board.get(id).is_none());
    }
}
