//! Queue broker contract and the in-memory implementation.
//!
//! The broker only ever sees serialized job records: every operation is
//! expressible against a key/value + list transport, so a networked broker
//! can implement the same trait without new semantics. [`MemoryBroker`]
//! keeps the serialized form internally for the same reason.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use hashbrown::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::job::{JobRecord, JobState};

/// Per-state job counts for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    /// Jobs waiting to be picked up.
    pub waiting: usize,
    /// Jobs being processed.
    pub active: usize,
    /// Jobs finished successfully.
    pub completed: usize,
    /// Jobs finished with an error.
    pub failed: usize,
}

/// Queue transport shared by the submission path and the workers.
///
/// Implementations must be safe to share across threads. All job payloads
/// cross this boundary serialized.
pub trait Broker: Send + Sync {
    /// Append a waiting record to a queue.
    ///
    /// # Errors
    ///
    /// Transport failures, or a duplicate job id in the queue.
    fn enqueue(&self, queue: &str, record: &JobRecord) -> RuntimeResult<()>;

    /// Pop the oldest waiting record, marking it active under a lock.
    ///
    /// # Errors
    ///
    /// Transport failures only; an empty queue returns `Ok(None)`.
    fn take_next(&self, queue: &str, lock: Duration) -> RuntimeResult<Option<JobRecord>>;

    /// Extend the lock on an active job. Returns false when the job is no
    /// longer active.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn renew_lock(&self, queue: &str, job_id: Uuid, lock: Duration) -> RuntimeResult<bool>;

    /// Move an active job to its terminal record. Returns false when the
    /// job is no longer active (already failed or force-failed).
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn finish(&self, queue: &str, record: &JobRecord) -> RuntimeResult<bool>;

    /// Fetch a job record in any state.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn get(&self, queue: &str, job_id: Uuid) -> RuntimeResult<Option<JobRecord>>;

    /// Remove a waiting job. Returns false when it is not waiting.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn remove_waiting(&self, queue: &str, job_id: Uuid) -> RuntimeResult<bool>;

    /// Set the cooperative cancellation flag on a waiting or active job.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn set_cancelled(&self, queue: &str, job_id: Uuid) -> RuntimeResult<bool>;

    /// Read the cancellation flag of a waiting or active job.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn is_cancelled(&self, queue: &str, job_id: Uuid) -> RuntimeResult<bool>;

    /// Ids of waiting jobs in queue order.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn waiting_ids(&self, queue: &str) -> RuntimeResult<Vec<Uuid>>;

    /// Per-state counts.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn counts(&self, queue: &str) -> RuntimeResult<QueueCounts>;

    /// Records currently active.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn active_records(&self, queue: &str) -> RuntimeResult<Vec<JobRecord>>;

    /// Ids of active jobs whose lock has lapsed.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn expired_active(&self, queue: &str) -> RuntimeResult<Vec<Uuid>>;

    /// Record a lock lapse against an active job and grant it a fresh lock
    /// window. Returns false when the job is no longer active.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn record_stall(&self, queue: &str, job_id: Uuid, lock: Duration) -> RuntimeResult<bool>;

    /// Processing durations of the most recently completed jobs.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn recent_durations(&self, queue: &str, limit: usize) -> RuntimeResult<Vec<Duration>>;

    /// Drop all terminal records in `state`, returning how many.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn clean(&self, queue: &str, state: JobState) -> RuntimeResult<usize>;

    /// Drop terminal records past their retention, returning how many.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn sweep_finished(
        &self,
        queue: &str,
        completed_ttl: Duration,
        failed_ttl: Duration,
    ) -> RuntimeResult<usize>;

    /// Ask every worker process to exit at its next poll.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn request_restart(&self, ttl: Duration) -> RuntimeResult<()>;

    /// Whether a restart request is pending.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    fn restart_requested(&self) -> RuntimeResult<bool>;
}

struct ActiveEntry {
    json: String,
    lock_until: Instant,
}

#[derive(Default)]
struct QueueStateStore {
    waiting: VecDeque<String>,
    active: HashMap<Uuid, ActiveEntry>,
    finished: HashMap<Uuid, String>,
}

/// In-process broker used by tests and single-node deployments.
#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, QueueStateStore>>,
    restart_until: Mutex<Option<Instant>>,
}

fn encode(record: &JobRecord) -> RuntimeResult<String> {
    Ok(serde_json::to_string(record)?)
}

fn decode(json: &str) -> RuntimeResult<JobRecord> {
    Ok(serde_json::from_str(json)?)
}

impl MemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> RuntimeResult<std::sync::MutexGuard<'_, HashMap<String, QueueStateStore>>> {
        self.queues
            .lock()
            .map_err(|_| RuntimeError::broker("broker lock poisoned"))
    }

    /// Run `f` over the record of a waiting or active job, writing back the
    /// mutated form. Returns false when the job is in neither state.
    fn mutate_live(
        &self,
        queue: &str,
        job_id: Uuid,
        f: impl Fn(&mut JobRecord),
    ) -> RuntimeResult<bool> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();

        for slot in &mut state.waiting {
            let mut record = decode(slot)?;
            if record.job_id() == job_id {
                f(&mut record);
                *slot = encode(&record)?;
                return Ok(true);
            }
        }
        if let Some(entry) = state.active.get_mut(&job_id) {
            let mut record = decode(&entry.json)?;
            f(&mut record);
            entry.json = encode(&record)?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl Broker for MemoryBroker {
    fn enqueue(&self, queue: &str, record: &JobRecord) -> RuntimeResult<()> {
        let json = encode(record)?;
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();

        let id = record.job_id();
        let duplicate = state.active.contains_key(&id)
            || state.finished.contains_key(&id)
            || state
                .waiting
                .iter()
                .any(|j| decode(j).map(|r| r.job_id() == id).unwrap_or(false));
        if duplicate {
            return Err(RuntimeError::broker(format!("duplicate job id {id}")));
        }

        state.waiting.push_back(json);
        debug!(queue, job = %id, "job enqueued");
        Ok(())
    }

    fn take_next(&self, queue: &str, lock: Duration) -> RuntimeResult<Option<JobRecord>> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();

        let Some(json) = state.waiting.pop_front() else {
            return Ok(None);
        };
        let mut record = decode(&json)?;
        record.state = JobState::Active;
        record.processed_at = Some(SystemTime::now());

        state.active.insert(
            record.job_id(),
            ActiveEntry {
                json: encode(&record)?,
                lock_until: Instant::now() + lock,
            },
        );
        Ok(Some(record))
    }

    fn renew_lock(&self, queue: &str, job_id: Uuid, lock: Duration) -> RuntimeResult<bool> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        match state.active.get_mut(&job_id) {
            Some(entry) => {
                entry.lock_until = Instant::now() + lock;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn finish(&self, queue: &str, record: &JobRecord) -> RuntimeResult<bool> {
        let json = encode(record)?;
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        let id = record.job_id();
        if state.active.remove(&id).is_none() {
            return Ok(false);
        }
        state.finished.insert(id, json);
        debug!(queue, job = %id, state = record.state.as_str(), "job finished");
        Ok(true)
    }

    fn get(&self, queue: &str, job_id: Uuid) -> RuntimeResult<Option<JobRecord>> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();

        if let Some(entry) = state.active.get(&job_id) {
            return Ok(Some(decode(&entry.json)?));
        }
        if let Some(json) = state.finished.get(&job_id) {
            return Ok(Some(decode(json)?));
        }
        for json in &state.waiting {
            let record = decode(json)?;
            if record.job_id() == job_id {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn remove_waiting(&self, queue: &str, job_id: Uuid) -> RuntimeResult<bool> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        let before = state.waiting.len();
        let mut kept = VecDeque::with_capacity(before);
        for json in state.waiting.drain(..) {
            if decode(&json)?.job_id() == job_id {
                continue;
            }
            kept.push_back(json);
        }
        state.waiting = kept;
        Ok(state.waiting.len() != before)
    }

    fn set_cancelled(&self, queue: &str, job_id: Uuid) -> RuntimeResult<bool> {
        self.mutate_live(queue, job_id, |record| {
            record.payload.cancelled = true;
        })
    }

    fn is_cancelled(&self, queue: &str, job_id: Uuid) -> RuntimeResult<bool> {
        Ok(self
            .get(queue, job_id)?
            .is_some_and(|record| record.payload.cancelled))
    }

    fn waiting_ids(&self, queue: &str) -> RuntimeResult<Vec<Uuid>> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        state
            .waiting
            .iter()
            .map(|json| decode(json).map(|r| r.job_id()))
            .collect()
    }

    fn counts(&self, queue: &str) -> RuntimeResult<QueueCounts> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        let mut counts = QueueCounts {
            waiting: state.waiting.len(),
            active: state.active.len(),
            ..QueueCounts::default()
        };
        for json in state.finished.values() {
            match decode(json)?.state {
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
                JobState::Waiting | JobState::Active => {}
            }
        }
        Ok(counts)
    }

    fn active_records(&self, queue: &str) -> RuntimeResult<Vec<JobRecord>> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        state
            .active
            .values()
            .map(|entry| decode(&entry.json))
            .collect()
    }

    fn expired_active(&self, queue: &str) -> RuntimeResult<Vec<Uuid>> {
        let now = Instant::now();
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        Ok(state
            .active
            .iter()
            .filter(|(_, entry)| entry.lock_until < now)
            .map(|(id, _)| *id)
            .collect())
    }

    fn record_stall(&self, queue: &str, job_id: Uuid, lock: Duration) -> RuntimeResult<bool> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        let Some(entry) = state.active.get_mut(&job_id) else {
            return Ok(false);
        };
        let mut record = decode(&entry.json)?;
        record.stalls += 1;
        entry.json = encode(&record)?;
        entry.lock_until = Instant::now() + lock;
        debug!(queue, job = %job_id, stalls = record.stalls, "stall recorded");
        Ok(true)
    }

    fn recent_durations(&self, queue: &str, limit: usize) -> RuntimeResult<Vec<Duration>> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();

        let mut completed: Vec<JobRecord> = Vec::new();
        for json in state.finished.values() {
            let record = decode(json)?;
            if record.state == JobState::Completed {
                completed.push(record);
            }
        }
        completed.sort_by_key(|r| std::cmp::Reverse(r.finished_at));
        Ok(completed
            .iter()
            .take(limit)
            .filter_map(JobRecord::processing_duration)
            .collect())
    }

    fn clean(&self, queue: &str, state_filter: JobState) -> RuntimeResult<usize> {
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();
        let before = state.finished.len();
        let mut kept = HashMap::new();
        for (id, json) in state.finished.drain() {
            if decode(&json)?.state != state_filter {
                kept.insert(id, json);
            }
        }
        state.finished = kept;
        Ok(before - state.finished.len())
    }

    fn sweep_finished(
        &self,
        queue: &str,
        completed_ttl: Duration,
        failed_ttl: Duration,
    ) -> RuntimeResult<usize> {
        let now = SystemTime::now();
        let mut queues = self.locked()?;
        let state = queues.entry(queue.to_string()).or_default();

        let before = state.finished.len();
        let mut kept = HashMap::new();
        for (id, json) in state.finished.drain() {
            let record = decode(&json)?;
            let ttl = match record.state {
                JobState::Failed => failed_ttl,
                _ => completed_ttl,
            };
            let expired = record
                .finished_at
                .and_then(|t| now.duration_since(t).ok())
                .is_some_and(|age| age > ttl);
            if !expired {
                kept.insert(id, json);
            }
        }
        state.finished = kept;
        let removed = before - state.finished.len();
        if removed > 0 {
            debug!(queue, removed, "retention sweep");
        }
        Ok(removed)
    }

    fn request_restart(&self, ttl: Duration) -> RuntimeResult<()> {
        *self
            .restart_until
            .lock()
            .map_err(|_| RuntimeError::broker("broker lock poisoned"))? =
            Some(Instant::now() + ttl);
        Ok(())
    }

    fn restart_requested(&self) -> RuntimeResult<bool> {
        let guard = self
            .restart_until
            .lock()
            .map_err(|_| RuntimeError::broker("broker lock poisoned"))?;
        Ok(guard.is_some_and(|until| Instant::now() < until))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::job::{Dimensions, JobPayload};

    fn record() -> JobRecord {
        JobRecord::waiting(JobPayload::new(
            Uuid::new_v4(),
            "uploads/u/model.stl",
            "model.stl",
            Dimensions {
                x: 100.0,
                y: 100.0,
                z: 100.0,
            },
        ))
    }

    #[test]
    fn fifo_order() {
        let broker = MemoryBroker::new();
        let first = record();
        let second = record();
        broker.enqueue("split", &first).unwrap();
        broker.enqueue("split", &second).unwrap();

        let taken = broker
            .take_next("split", Duration::from_secs(60))
            .unwrap()
            .unwrap();
        assert_eq!(taken.job_id(), first.job_id());
        assert_eq!(taken.state, JobState::Active);
        assert!(taken.processed_at.is_some());

        assert_eq!(broker.waiting_ids("split").unwrap(), vec![second.job_id()]);
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let broker = MemoryBroker::new();
        let job = record();
        broker.enqueue("split", &job).unwrap();
        assert!(broker.enqueue("split", &job).is_err());
    }

    #[test]
    fn finish_moves_active_to_terminal() {
        let broker = MemoryBroker::new();
        let job = record();
        broker.enqueue("split", &job).unwrap();
        let mut taken = broker
            .take_next("split", Duration::from_secs(60))
            .unwrap()
            .unwrap();

        taken.state = JobState::Completed;
        taken.finished_at = Some(SystemTime::now());
        assert!(broker.finish("split", &taken).unwrap());
        // Second finish is a no-op: the job already left the active set
        assert!(!broker.finish("split", &taken).unwrap());

        let fetched = broker.get("split", job.job_id()).unwrap().unwrap();
        assert_eq!(fetched.state, JobState::Completed);

        let counts = broker.counts("split").unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.active, 0);
    }

    #[test]
    fn cancellation_flag_reaches_waiting_and_active_jobs() {
        let broker = MemoryBroker::new();
        let job = record();
        broker.enqueue("split", &job).unwrap();

        assert!(broker.set_cancelled("split", job.job_id()).unwrap());
        assert!(broker.is_cancelled("split", job.job_id()).unwrap());

        let taken = broker
            .take_next("split", Duration::from_secs(60))
            .unwrap()
            .unwrap();
        assert!(taken.payload.cancelled);
        // Still settable while active
        assert!(broker.set_cancelled("split", job.job_id()).unwrap());
    }

    #[test]
    fn expired_locks_are_reported() {
        let broker = MemoryBroker::new();
        let job = record();
        broker.enqueue("split", &job).unwrap();
        broker.take_next("split", Duration::ZERO).unwrap().unwrap();

        std::thread::sleep(Duration::from_millis(5));
        let expired = broker.expired_active("split").unwrap();
        assert_eq!(expired, vec![job.job_id()]);

        // A renewed lock stops being expired
        assert!(broker
            .renew_lock("split", job.job_id(), Duration::from_secs(60))
            .unwrap());
        assert!(broker.expired_active("split").unwrap().is_empty());
    }

    #[test]
    fn record_stall_increments_and_regrants_the_lock() {
        let broker = MemoryBroker::new();
        let job = record();
        broker.enqueue("split", &job).unwrap();
        broker.take_next("split", Duration::ZERO).unwrap().unwrap();

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(broker.expired_active("split").unwrap(), vec![job.job_id()]);

        assert!(broker
            .record_stall("split", job.job_id(), Duration::from_secs(60))
            .unwrap());
        assert!(broker.expired_active("split").unwrap().is_empty());
        let fetched = broker.get("split", job.job_id()).unwrap().unwrap();
        assert_eq!(fetched.stalls, 1);

        // Not recordable once the job leaves the active set
        let mut terminal = fetched;
        terminal.state = JobState::Failed;
        terminal.finished_at = Some(SystemTime::now());
        broker.finish("split", &terminal).unwrap();
        assert!(!broker
            .record_stall("split", job.job_id(), Duration::from_secs(60))
            .unwrap());
    }

    #[test]
    fn retention_sweep_by_state() {
        let broker = MemoryBroker::new();
        let old = SystemTime::now() - Duration::from_secs(3 * 3600);

        for state in [JobState::Completed, JobState::Failed] {
            let mut job = record();
            broker.enqueue("split", &job).unwrap();
            broker.take_next("split", Duration::from_secs(60)).unwrap();
            job.state = state;
            job.processed_at = Some(old);
            job.finished_at = Some(old);
            assert!(broker.finish("split", &job).unwrap());
        }

        // Completed expires after 2h here, failed only after 14h
        let removed = broker
            .sweep_finished(
                "split",
                Duration::from_secs(2 * 3600),
                Duration::from_secs(14 * 3600),
            )
            .unwrap();
        assert_eq!(removed, 1);
        let counts = broker.counts("split").unwrap();
        assert_eq!(counts.completed, 0);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn recent_durations_come_newest_first() {
        let broker = MemoryBroker::new();
        let now = SystemTime::now();

        for secs in [30u64, 60, 90] {
            let mut job = record();
            broker.enqueue("split", &job).unwrap();
            broker.take_next("split", Duration::from_secs(60)).unwrap();
            job.state = JobState::Completed;
            job.processed_at = Some(now - Duration::from_secs(secs));
            job.finished_at = Some(now - Duration::from_secs(secs) + Duration::from_secs(secs / 3));
            broker.finish("split", &job).unwrap();
        }

        let durations = broker.recent_durations("split", 2).unwrap();
        assert_eq!(durations.len(), 2);
        // Newest completion first: the 30s-ago job finished most recently
        assert_eq!(durations[0], Duration::from_secs(10));
    }

    #[test]
    fn restart_flag_expires() {
        let broker = MemoryBroker::new();
        assert!(!broker.restart_requested().unwrap());
        broker.request_restart(Duration::from_secs(60)).unwrap();
        assert!(broker.restart_requested().unwrap());

        broker.request_restart(Duration::ZERO).unwrap();
        assert!(!broker.restart_requested().unwrap());
    }
}
