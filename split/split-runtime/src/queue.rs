//! Queue policies and the job queue service.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::broker::{Broker, QueueCounts};
use crate::error::RuntimeResult;
use crate::job::{JobPayload, JobRecord, JobState, JobStatus, QueuePosition};
use crate::progress::ProgressBoard;

/// Name of the split queue.
pub const SPLIT_QUEUE: &str = "split";

/// Name of the repair queue.
pub const REPAIR_QUEUE: &str = "repair";

/// TTL of the worker restart flag.
pub const RESTART_TTL: Duration = Duration::from_secs(60);

/// Fallback per-job processing estimate when no completions exist yet.
const DEFAULT_JOB_ESTIMATE: Duration = Duration::from_secs(120);

/// Completion samples considered by the wait estimator.
const ETA_SAMPLES: usize = 20;

/// Scheduling and retention policy for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// Processing attempts per job. Failures are terminal at 1.
    pub attempts: u32,
    /// Hard wall-clock limit for one job.
    pub job_timeout: Duration,
    /// Worker lock duration; must exceed `job_timeout`.
    pub lock_duration: Duration,
    /// How often an active job's lock is renewed.
    pub lock_renewal: Duration,
    /// How often stalled jobs are checked for.
    pub stall_check: Duration,
    /// Lock-lapse strikes at which a job is failed. At 1, the first lapse
    /// is terminal; below that count a lapse regrants the lock.
    pub max_stalls: u32,
    /// Retention for completed jobs.
    pub retention_completed: Duration,
    /// Retention for failed jobs.
    pub retention_failed: Duration,
}

impl QueuePolicy {
    /// Policy of the split queue.
    ///
    /// One attempt only: the typical failure is a malformed model, which
    /// retrying cannot fix.
    #[must_use]
    pub const fn split() -> Self {
        Self {
            attempts: 1,
            job_timeout: Duration::from_secs(15 * 60),
            lock_duration: Duration::from_secs(16 * 60),
            lock_renewal: Duration::from_secs(30),
            stall_check: Duration::from_secs(60),
            max_stalls: 1,
            retention_completed: Duration::from_secs(48 * 3600),
            retention_failed: Duration::from_secs(7 * 24 * 3600),
        }
    }

    /// Policy of the repair queue: same shape, tighter deadlines.
    #[must_use]
    pub const fn repair() -> Self {
        Self {
            job_timeout: Duration::from_secs(5 * 60),
            lock_duration: Duration::from_secs(6 * 60),
            ..Self::split()
        }
    }
}

/// What the cancel endpoint did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still waiting and has been removed.
    Removed,
    /// The job is active; its cancellation flag is now set.
    Flagged,
    /// The job is already in a terminal state.
    AlreadyFinished,
    /// No such job.
    NotFound,
}

/// Submission, inspection, and admin surface of one queue.
///
/// Thin facade over the broker plus the progress board; the worker side
/// lives in [`Worker`](crate::Worker).
pub struct JobQueue {
    name: &'static str,
    policy: QueuePolicy,
    broker: Arc<dyn Broker>,
    board: Arc<ProgressBoard>,
}

impl JobQueue {
    /// Create a queue facade.
    #[must_use]
    pub fn new(
        name: &'static str,
        policy: QueuePolicy,
        broker: Arc<dyn Broker>,
        board: Arc<ProgressBoard>,
    ) -> Self {
        Self {
            name,
            policy,
            broker,
            board,
        }
    }

    /// The split queue with its standard policy.
    #[must_use]
    pub fn split(broker: Arc<dyn Broker>, board: Arc<ProgressBoard>) -> Self {
        Self::new(SPLIT_QUEUE, QueuePolicy::split(), broker, board)
    }

    /// The repair queue with its standard policy.
    #[must_use]
    pub fn repair(broker: Arc<dyn Broker>, board: Arc<ProgressBoard>) -> Self {
        Self::new(REPAIR_QUEUE, QueuePolicy::repair(), broker, board)
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue policy.
    #[must_use]
    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Validate and enqueue a submission.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Validation`] on a bad payload, broker errors
    /// otherwise.
    pub fn submit(&self, payload: JobPayload) -> RuntimeResult<Uuid> {
        payload.validate()?;
        let record = JobRecord::waiting(payload);
        let id = record.job_id();
        self.broker.enqueue(self.name, &record)?;
        info!(queue = self.name, job = %id, "job submitted");
        Ok(id)
    }

    /// Status read model for one job.
    ///
    /// # Errors
    ///
    /// Broker errors only; an unknown id is `Ok(None)`.
    pub fn status(&self, job_id: Uuid) -> RuntimeResult<Option<JobStatus>> {
        let Some(record) = self.broker.get(self.name, job_id)? else {
            return Ok(None);
        };

        let progress = self.board.get(job_id);
        let percent = match record.state {
            JobState::Completed => 100,
            JobState::Waiting => 0,
            _ => progress.as_ref().map_or(0, |p| p.percent),
        };
        Ok(Some(JobStatus {
            id: job_id,
            state: record.state,
            progress: percent,
            progress_message: progress.map(|p| p.message),
            result: record.result,
            error: record.error,
        }))
    }

    /// Cancel a job: remove it while waiting, flag it while active.
    ///
    /// # Errors
    ///
    /// Broker errors only.
    pub fn cancel(&self, job_id: Uuid) -> RuntimeResult<CancelOutcome> {
        if self.broker.remove_waiting(self.name, job_id)? {
            info!(queue = self.name, job = %job_id, "waiting job removed");
            return Ok(CancelOutcome::Removed);
        }
        let Some(record) = self.broker.get(self.name, job_id)? else {
            return Ok(CancelOutcome::NotFound);
        };
        match record.state {
            JobState::Active => {
                self.broker.set_cancelled(self.name, job_id)?;
                info!(queue = self.name, job = %job_id, "cancellation requested");
                Ok(CancelOutcome::Flagged)
            }
            JobState::Completed | JobState::Failed => Ok(CancelOutcome::AlreadyFinished),
            // remove_waiting above already handled the waiting case
            JobState::Waiting => Ok(CancelOutcome::NotFound),
        }
    }

    /// Queue position and wait estimate for one job.
    ///
    /// # Errors
    ///
    /// Broker errors only; an unknown id is `Ok(None)`.
    pub fn position(&self, job_id: Uuid) -> RuntimeResult<Option<QueuePosition>> {
        let Some(record) = self.broker.get(self.name, job_id)? else {
            return Ok(None);
        };

        let waiting = self.broker.waiting_ids(self.name)?;
        let total_waiting = waiting.len();
        let rank = waiting.iter().position(|&id| id == job_id);

        let estimated_wait_time = match (record.state, rank) {
            (JobState::Waiting, Some(rank)) => self.estimate_wait(rank)?.as_secs(),
            _ => 0,
        };

        Ok(Some(QueuePosition {
            state: record.state,
            position: rank.map(|r| r + 1),
            total_waiting,
            estimated_wait_time,
        }))
    }

    /// Expected wait for a job with `jobs_ahead` in front of it.
    fn estimate_wait(&self, jobs_ahead: usize) -> RuntimeResult<Duration> {
        let samples = self.broker.recent_durations(self.name, ETA_SAMPLES)?;
        let average = if samples.is_empty() {
            DEFAULT_JOB_ESTIMATE
        } else {
            samples.iter().sum::<Duration>() / samples.len() as u32
        };
        let active = self.broker.counts(self.name)?.active.max(1);
        Ok(average.mul_f64(jobs_ahead as f64 / active as f64))
    }

    /// Force an active job to failed immediately, without waiting for the
    /// worker to cooperate.
    ///
    /// # Errors
    ///
    /// Broker errors only.
    pub fn force_fail(&self, job_id: Uuid, reason: &str) -> RuntimeResult<bool> {
        let Some(mut record) = self.broker.get(self.name, job_id)? else {
            return Ok(false);
        };
        if record.state != JobState::Active {
            return Ok(false);
        }
        record.state = JobState::Failed;
        record.error = Some(reason.to_string());
        record.finished_at = Some(SystemTime::now());
        let moved = self.broker.finish(self.name, &record)?;
        if moved {
            self.board.remove(job_id);
            info!(queue = self.name, job = %job_id, reason, "job force-failed");
        }
        Ok(moved)
    }

    /// Drop all terminal records in `state`.
    ///
    /// # Errors
    ///
    /// Broker errors only.
    pub fn clean(&self, state: JobState) -> RuntimeResult<usize> {
        self.broker.clean(self.name, state)
    }

    /// Apply this queue's retention policy.
    ///
    /// # Errors
    ///
    /// Broker errors only.
    pub fn sweep_retention(&self) -> RuntimeResult<usize> {
        self.broker.sweep_finished(
            self.name,
            self.policy.retention_completed,
            self.policy.retention_failed,
        )
    }

    /// Per-state counts.
    ///
    /// # Errors
    ///
    /// Broker errors only.
    pub fn counts(&self) -> RuntimeResult<QueueCounts> {
        self.broker.counts(self.name)
    }

    /// Signal every worker to restart.
    ///
    /// # Errors
    ///
    /// Broker errors only.
    pub fn request_worker_restart(&self) -> RuntimeResult<()> {
        self.broker.request_restart(RESTART_TTL)
    }
}
