//! Job handlers and the split handler.

use std::path::Path;
use std::sync::Arc;

use split_engine::{bundle_parts, split_model, ProgressSink, SplitError};
use split_store::ObjectStore;
use tracing::info;
use uuid::Uuid;

use crate::broker::Broker;
use crate::error::RuntimeResult;
use crate::job::{JobPayload, JobResultData, PartRef};

/// Cooperative cancellation probe for one job.
///
/// Reads the cancellation flag from the broker; the handler calls
/// [`check`](Self::check) at its defined checkpoints only, so a flag set
/// mid-computation is observed at the next checkpoint.
pub struct CancelProbe {
    broker: Arc<dyn Broker>,
    queue: &'static str,
    job_id: Uuid,
}

impl CancelProbe {
    /// Probe for a job on a queue.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, queue: &'static str, job_id: Uuid) -> Self {
        Self {
            broker,
            queue,
            job_id,
        }
    }

    /// Fail with [`SplitError::Cancelled`] when the flag is set.
    ///
    /// # Errors
    ///
    /// [`SplitError::Cancelled`] on an observed flag. Broker read failures
    /// are treated as "not cancelled": the job keeps running and the stall
    /// handling picks it up if the broker stays away.
    pub fn check(&self) -> Result<(), SplitError> {
        let flagged = self
            .broker
            .is_cancelled(self.queue, self.job_id)
            .unwrap_or(false);
        if flagged {
            info!(job = %self.job_id, "cancellation observed at checkpoint");
            return Err(SplitError::Cancelled);
        }
        Ok(())
    }
}

/// Everything a handler gets for one job execution.
pub struct JobContext<'a> {
    /// The job submission.
    pub payload: &'a JobPayload,
    /// Exclusive scratch directory, removed after the job on every path.
    pub workdir: &'a Path,
    /// Progress sink for this job.
    pub progress: &'a dyn ProgressSink,
    /// Cancellation probe.
    pub probe: &'a CancelProbe,
}

/// One queue's processing logic.
pub trait JobHandler: Send + Sync {
    /// Process one job to completion.
    ///
    /// # Errors
    ///
    /// Any error fails the job; the runtime never retries.
    fn run(&self, ctx: &JobContext<'_>) -> RuntimeResult<JobResultData>;
}

/// Handler for the split queue: download, split, upload, bundle.
pub struct SplitHandler {
    store: Arc<dyn ObjectStore>,
}

impl SplitHandler {
    /// Handler writing through the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

impl JobHandler for SplitHandler {
    fn run(&self, ctx: &JobContext<'_>) -> RuntimeResult<JobResultData> {
        let payload = ctx.payload;
        let job_id = payload.job_id;

        ctx.probe.check()?;
        ctx.progress.publish(10, "Downloading model");
        let input = self.store.get(&payload.file_id)?;
        // Keep a scratch copy next to any other per-job files
        std::fs::write(ctx.workdir.join("input.stl"), &input)?;
        ctx.progress.publish(20, "Download complete");
        ctx.probe.check()?;

        let output = split_model(&input, &payload.split_params(), ctx.progress)?;
        ctx.probe.check()?;

        let total = output.parts.len();
        let mut parts = Vec::with_capacity(total);
        for (index, part) in output.parts.iter().enumerate() {
            let key = format!("results/{job_id}/{}", part.name);
            self.store.put(&key, &part.bytes)?;
            #[allow(clippy::cast_possible_truncation)]
            let percent = 75 + ((15 * (index as u64 + 1)) / total.max(1) as u64) as u8;
            ctx.progress.publish(percent.min(90), "Uploading parts");
            parts.push(PartRef {
                name: part.name.clone(),
                key,
                section: part.section,
            });
        }

        ctx.progress.publish(90, "Building archive");
        let archive = bundle_parts(&output.parts)?;
        let zip_key = format!("results/{job_id}/all-parts.zip");
        self.store.put(&zip_key, &archive)?;
        ctx.progress.publish(95, "Finalizing");

        info!(
            job = %job_id,
            parts = total,
            sections = ?output.sections,
            "split job stored"
        );
        Ok(JobResultData {
            parts,
            zip_key,
            total_parts: output.total_parts,
            sections: output.sections,
            original_dimensions: output.original_dimensions.into(),
        })
    }
}
