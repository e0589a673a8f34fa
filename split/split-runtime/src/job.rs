//! Job payloads, records, and read models.

use std::time::SystemTime;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use split_engine::{HoleSpec, SplitParams};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

/// Current payload schema version.
pub const PAYLOAD_VERSION: u32 = 1;

const fn default_version() -> u32 {
    PAYLOAD_VERSION
}

/// Requested maximum piece size per axis, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Maximum size along X.
    pub x: f64,
    /// Maximum size along Y.
    pub y: f64,
    /// Maximum size along Z.
    pub z: f64,
}

impl From<Dimensions> for Vector3<f64> {
    fn from(d: Dimensions) -> Self {
        Self::new(d.x, d.y, d.z)
    }
}

impl From<Vector3<f64>> for Dimensions {
    fn from(v: Vector3<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

/// A validated split job submission.
///
/// This is the broker wire format: a typed, versioned record rather than a
/// free-form JSON blob, so malformed submissions die at the API boundary
/// instead of inside a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// Payload schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Externally supplied job id.
    pub job_id: Uuid,
    /// Object-store key of the uploaded model.
    pub file_id: String,
    /// Original upload file name.
    pub file_name: String,
    /// Maximum piece size per axis.
    pub dimensions: Dimensions,
    /// Reserved flag; accepted and recorded, no engine semantics.
    #[serde(default)]
    pub smart_boundaries: bool,
    /// Equalize piece sizes instead of leaving a sliver row.
    #[serde(default)]
    pub balanced_cutting: bool,
    /// Alignment-hole configuration.
    #[serde(default)]
    pub alignment_holes: HoleSpec,
    /// Cooperative cancellation flag, set by the cancel endpoint and read
    /// by the worker at its checkpoints.
    #[serde(rename = "_cancelled", default)]
    pub cancelled: bool,
}

impl JobPayload {
    /// Build a payload with default flags.
    #[must_use]
    pub fn new(job_id: Uuid, file_id: impl Into<String>, file_name: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            job_id,
            file_id: file_id.into(),
            file_name: file_name.into(),
            dimensions,
            smart_boundaries: false,
            balanced_cutting: false,
            alignment_holes: HoleSpec::default(),
            cancelled: false,
        }
    }

    /// Validate the payload at the submission boundary.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Validation`] for empty identifiers,
    /// non-positive dimensions, or out-of-range hole settings.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.version != PAYLOAD_VERSION {
            return Err(RuntimeError::validation(format!(
                "unsupported payload version {}",
                self.version
            )));
        }
        if self.file_id.trim().is_empty() {
            return Err(RuntimeError::validation("fileId must not be empty"));
        }
        if self.file_name.trim().is_empty() {
            return Err(RuntimeError::validation("fileName must not be empty"));
        }
        self.split_params().validate().map_err(|e| {
            RuntimeError::validation(e.user_message())
        })
    }

    /// Engine parameters for this payload.
    #[must_use]
    pub fn split_params(&self) -> SplitParams {
        SplitParams {
            max_dims: self.dimensions.into(),
            balanced_cutting: self.balanced_cutting,
            smart_boundaries: self.smart_boundaries,
            holes: self.alignment_holes,
        }
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Queued, not yet picked up.
    Waiting,
    /// Being processed by a worker.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished with an error (including cancellation and timeout).
    Failed,
}

impl JobState {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Reference to one stored part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRef {
    /// Part file name.
    pub name: String,
    /// Object-store key.
    pub key: String,
    /// 1-based grid cell indices.
    pub section: (u32, u32, u32),
}

/// Stored result of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultData {
    /// Stored parts in cell order.
    pub parts: Vec<PartRef>,
    /// Object-store key of the bundle archive.
    pub zip_key: String,
    /// Number of parts.
    pub total_parts: usize,
    /// Grid section counts.
    pub sections: (u32, u32, u32),
    /// Input model extent in millimeters.
    pub original_dimensions: Dimensions,
}

/// One job as tracked by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// The submission payload.
    pub payload: JobPayload,
    /// Lifecycle state.
    pub state: JobState,
    /// Result, present once completed.
    pub result: Option<JobResultData>,
    /// Failure reason, present once failed.
    pub error: Option<String>,
    /// Submission time.
    pub created_at: SystemTime,
    /// Time a worker picked the job up.
    pub processed_at: Option<SystemTime>,
    /// Time the job reached a terminal state.
    pub finished_at: Option<SystemTime>,
    /// Stall strikes against this job.
    pub stalls: u32,
}

impl JobRecord {
    /// A fresh waiting record for a payload.
    #[must_use]
    pub fn waiting(payload: JobPayload) -> Self {
        Self {
            payload,
            state: JobState::Waiting,
            result: None,
            error: None,
            created_at: SystemTime::now(),
            processed_at: None,
            finished_at: None,
            stalls: 0,
        }
    }

    /// Job id shortcut.
    #[inline]
    #[must_use]
    pub fn job_id(&self) -> Uuid {
        self.payload.job_id
    }

    /// Wall-clock processing duration, when both timestamps exist.
    #[must_use]
    pub fn processing_duration(&self) -> Option<std::time::Duration> {
        let start = self.processed_at?;
        let end = self.finished_at?;
        end.duration_since(start).ok()
    }
}

/// Read model returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Job id.
    pub id: Uuid,
    /// Lifecycle state.
    pub state: JobState,
    /// Progress percent, 0-100.
    pub progress: u8,
    /// Last progress message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    /// Result of a completed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResultData>,
    /// Failure reason of a failed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read model returned by the queue-position endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePosition {
    /// Lifecycle state.
    pub state: JobState,
    /// 1-based position among waiting jobs, when waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Number of waiting jobs in the queue.
    pub total_waiting: usize,
    /// Estimated wait in seconds.
    pub estimated_wait_time: u64,
}
