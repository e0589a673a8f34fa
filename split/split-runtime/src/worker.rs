//! The worker loop: dispatch, lock renewal, stall recovery, retention.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use hashbrown::HashMap;
use split_engine::ProgressSink;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::Broker;
use crate::error::{RuntimeError, RuntimeResult};
use crate::handler::{CancelProbe, JobContext, JobHandler};
use crate::job::{JobRecord, JobState};
use crate::progress::ProgressBoard;
use crate::queue::QueuePolicy;

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Jobs processed concurrently by this process.
    pub concurrency: usize,
    /// Idle sleep between broker polls. Also bounds how quickly a restart
    /// signal is observed.
    pub poll_interval: Duration,
    /// Root under which per-job working directories are created.
    pub work_root: PathBuf,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll_interval: Duration::from_secs(1),
            work_root: std::env::temp_dir().join("split-work"),
        }
    }
}

struct QueueWorker {
    name: &'static str,
    policy: QueuePolicy,
    handler: Arc<dyn JobHandler>,
}

struct InFlight {
    queue: &'static str,
    policy: QueuePolicy,
    last_renewal: Instant,
}

/// A worker process: registered queues plus the supervision loop.
pub struct Worker {
    broker: Arc<dyn Broker>,
    board: Arc<ProgressBoard>,
    queues: Vec<QueueWorker>,
    options: WorkerOptions,
    in_flight: Mutex<HashMap<Uuid, InFlight>>,
}

impl Worker {
    /// Create a worker with no queues registered.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, board: Arc<ProgressBoard>, options: WorkerOptions) -> Self {
        Self {
            broker,
            board,
            queues: Vec::new(),
            options,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Register a queue with its policy and handler.
    pub fn register(
        &mut self,
        name: &'static str,
        policy: QueuePolicy,
        handler: Arc<dyn JobHandler>,
    ) {
        self.queues.push(QueueWorker {
            name,
            policy,
            handler,
        });
    }

    /// Run until a restart is requested through the broker.
    ///
    /// Spawns `concurrency` processing threads; the calling thread
    /// supervises: it dispatches jobs, renews locks, fails stalled and
    /// timed-out jobs, and applies retention. Returns cleanly (for the
    /// external supervisor to restart the process) when the restart flag is
    /// seen, within one poll interval.
    ///
    /// # Errors
    ///
    /// Broker transport failures abort the loop.
    pub fn run(&self) -> RuntimeResult<()> {
        let (tx, rx) =
            crossbeam_channel::bounded::<(usize, JobRecord)>(self.options.concurrency);
        let busy = AtomicUsize::new(0);

        std::thread::scope(|scope| -> RuntimeResult<()> {
            for _ in 0..self.options.concurrency {
                let thread_rx = rx.clone();
                let busy = &busy;
                scope.spawn(move || {
                    while let Ok((queue_index, record)) = thread_rx.recv() {
                        self.process(&self.queues[queue_index], record);
                        busy.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }

            let mut last_maintenance: HashMap<&'static str, Instant> = HashMap::new();
            let result = loop {
                match self.broker.restart_requested() {
                    Ok(true) => {
                        info!("restart requested, draining worker");
                        break Ok(());
                    }
                    Ok(false) => {}
                    Err(e) => break Err(e),
                }

                if let Err(e) = self.renew_locks() {
                    warn!(error = %e, "lock renewal failed");
                }
                for queue in &self.queues {
                    let due = last_maintenance
                        .get(queue.name)
                        .is_none_or(|at| at.elapsed() >= queue.policy.stall_check);
                    if due {
                        last_maintenance.insert(queue.name, Instant::now());
                        if let Err(e) = self.maintain(queue) {
                            warn!(queue = queue.name, error = %e, "maintenance failed");
                        }
                    }
                }

                let mut dispatched = false;
                for (queue_index, queue) in self.queues.iter().enumerate() {
                    if busy.load(Ordering::SeqCst) >= self.options.concurrency {
                        break;
                    }
                    match self.broker.take_next(queue.name, queue.policy.lock_duration) {
                        Ok(Some(record)) => {
                            busy.fetch_add(1, Ordering::SeqCst);
                            if tx.send((queue_index, record)).is_err() {
                                break;
                            }
                            dispatched = true;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(queue = queue.name, error = %e, "broker poll failed");
                        }
                    }
                }
                if !dispatched {
                    std::thread::sleep(self.options.poll_interval);
                }
            };

            drop(tx);
            result
        })
    }

    /// Synchronously process every waiting job, for tests and batch use.
    ///
    /// # Errors
    ///
    /// Broker transport failures.
    pub fn drain(&self) -> RuntimeResult<usize> {
        let mut processed = 0;
        loop {
            let mut any = false;
            for queue in &self.queues {
                while let Some(record) = self
                    .broker
                    .take_next(queue.name, queue.policy.lock_duration)?
                {
                    self.process(queue, record);
                    processed += 1;
                    any = true;
                }
            }
            if !any {
                return Ok(processed);
            }
        }
    }

    /// Process one job from pickup to terminal record.
    fn process(&self, queue: &QueueWorker, record: JobRecord) {
        let job_id = record.job_id();
        let workdir = self.options.work_root.join(job_id.to_string());
        info!(queue = queue.name, job = %job_id, "job started");

        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.insert(
                job_id,
                InFlight {
                    queue: queue.name,
                    policy: queue.policy,
                    last_renewal: Instant::now(),
                },
            );
        }

        let cell = self.board.cell(job_id);
        let probe = CancelProbe::new(Arc::clone(&self.broker), queue.name, job_id);
        let outcome = std::fs::create_dir_all(&workdir)
            .map_err(RuntimeError::from)
            .and_then(|()| {
                queue.handler.run(&JobContext {
                    payload: &record.payload,
                    workdir: &workdir,
                    progress: cell.as_ref(),
                    probe: &probe,
                })
            });

        // Working directory goes away on success, failure, and cancellation
        if let Err(e) = std::fs::remove_dir_all(&workdir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job = %job_id, error = %e, "working directory cleanup failed");
            }
        }
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&job_id);
        }

        let mut terminal = record;
        match outcome {
            Ok(result) => {
                cell.publish(100, "Completed");
                terminal.state = JobState::Completed;
                terminal.result = Some(result);
                info!(queue = queue.name, job = %job_id, "job completed");
            }
            Err(err) => {
                terminal.state = JobState::Failed;
                terminal.error = Some(failure_reason(&err));
                warn!(queue = queue.name, job = %job_id, error = %err, "job failed");
            }
        }
        terminal.finished_at = Some(SystemTime::now());

        match self.broker.finish(queue.name, &terminal) {
            // Force-failed or stall-failed while we were processing; the
            // terminal record stands, this result is dropped
            Ok(false) => {
                warn!(queue = queue.name, job = %job_id, "job finished elsewhere, result dropped");
            }
            Ok(true) => {}
            Err(e) => warn!(queue = queue.name, job = %job_id, error = %e, "finish failed"),
        }
        self.board.remove(job_id);
    }

    /// Renew locks of in-flight jobs on their renewal cadence.
    fn renew_locks(&self) -> RuntimeResult<()> {
        let due: Vec<(Uuid, &'static str, Duration)> = {
            let Ok(mut in_flight) = self.in_flight.lock() else {
                return Ok(());
            };
            in_flight
                .iter_mut()
                .filter(|(_, j)| j.last_renewal.elapsed() >= j.policy.lock_renewal)
                .map(|(id, j)| {
                    j.last_renewal = Instant::now();
                    (*id, j.queue, j.policy.lock_duration)
                })
                .collect()
        };
        for (job_id, queue, lock) in due {
            self.broker.renew_lock(queue, job_id, lock)?;
        }
        Ok(())
    }

    /// Fail stalled and timed-out jobs, then apply retention.
    fn maintain(&self, queue: &QueueWorker) -> RuntimeResult<()> {
        let expired = self.broker.expired_active(queue.name)?;
        let now = SystemTime::now();

        for record in self.broker.active_records(queue.name)? {
            let timed_out = record
                .processed_at
                .and_then(|t| now.duration_since(t).ok())
                .is_some_and(|age| age > queue.policy.job_timeout);
            let stalled = expired.contains(&record.job_id());
            if !timed_out && !stalled {
                continue;
            }

            // A lapsed lock is a strike; the job is only failed once its
            // strikes exhaust the policy budget (or its hard deadline hits)
            if stalled && !timed_out && record.stalls + 1 < queue.policy.max_stalls {
                let id = record.job_id();
                if self
                    .broker
                    .record_stall(queue.name, id, queue.policy.lock_duration)?
                {
                    warn!(
                        queue = queue.name,
                        job = %id,
                        strikes = record.stalls + 1,
                        "job stalled, lock regranted"
                    );
                }
                continue;
            }

            let mut terminal = record;
            terminal.state = JobState::Failed;
            terminal.stalls += u32::from(stalled);
            terminal.error = Some(if timed_out {
                "The job exceeded the processing time limit.".to_string()
            } else {
                "The job stalled and was abandoned.".to_string()
            });
            terminal.finished_at = Some(now);
            let id = terminal.job_id();
            if self.broker.finish(queue.name, &terminal)? {
                self.board.remove(id);
                warn!(queue = queue.name, job = %id, timed_out, stalled, "job recovered as failed");
            }
        }

        self.broker.sweep_finished(
            queue.name,
            queue.policy.retention_completed,
            queue.policy.retention_failed,
        )?;
        Ok(())
    }
}

/// User-facing failure reason for a terminal record.
fn failure_reason(err: &RuntimeError) -> String {
    match err {
        RuntimeError::Engine(e) => e.user_message(),
        RuntimeError::Store(_) | RuntimeError::Io(_) => {
            "An internal storage error occurred.".to_string()
        }
        other => other.to_string(),
    }
}
