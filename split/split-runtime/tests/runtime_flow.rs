//! End-to-end runtime flows against in-memory infrastructure.

use std::sync::Arc;
use std::time::Duration;

use split_runtime::{
    Broker, CancelOutcome, Dimensions, JobPayload, JobQueue, JobState, MemoryBroker, ProgressBoard,
    QueuePolicy, SplitHandler, Worker, WorkerOptions, REPAIR_QUEUE, SPLIT_QUEUE,
};
use split_stl::encode_stl;
use split_store::{MemoryStore, ObjectStore};
use split_types::{IndexedMesh, Point3};
use uuid::Uuid;

fn cube_stl(extent: f32) -> Vec<u8> {
    let p = |x: f32, y: f32, z: f32| Point3::new(x * extent, y * extent, z * extent);
    let positions = vec![
        p(0.0, 0.0, 0.0),
        p(1.0, 0.0, 0.0),
        p(1.0, 1.0, 0.0),
        p(0.0, 1.0, 0.0),
        p(0.0, 0.0, 1.0),
        p(1.0, 0.0, 1.0),
        p(1.0, 1.0, 1.0),
        p(0.0, 1.0, 1.0),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    encode_stl(&IndexedMesh::from_parts(positions, faces))
}

struct Harness {
    broker: Arc<MemoryBroker>,
    board: Arc<ProgressBoard>,
    store: Arc<MemoryStore>,
    queue: JobQueue,
    worker: Worker,
}

fn harness() -> Harness {
    let broker = Arc::new(MemoryBroker::new());
    let board = Arc::new(ProgressBoard::new());
    let store = Arc::new(MemoryStore::new());

    let queue = JobQueue::split(broker.clone(), board.clone());
    let workdir = tempfile::tempdir().unwrap();
    let mut worker = Worker::new(
        broker.clone(),
        board.clone(),
        WorkerOptions {
            concurrency: 2,
            poll_interval: Duration::from_millis(10),
            work_root: workdir.keep(),
        },
    );
    worker.register(
        SPLIT_QUEUE,
        QueuePolicy::split(),
        Arc::new(SplitHandler::new(store.clone())),
    );

    Harness {
        broker,
        board,
        store,
        queue,
        worker,
    }
}

fn submit_cube(h: &Harness, max_dim: f64) -> Uuid {
    let file_id = format!("uploads/{}/model.stl", Uuid::new_v4());
    h.store.put(&file_id, &cube_stl(100.0)).unwrap();
    h.queue
        .submit(JobPayload::new(
            Uuid::new_v4(),
            file_id,
            "model.stl",
            Dimensions {
                x: max_dim,
                y: max_dim,
                z: max_dim,
            },
        ))
        .unwrap()
}

#[test]
fn job_runs_to_completion_with_stored_artifacts() {
    let h = harness();
    let id = submit_cube(&h, 60.0);

    assert_eq!(h.worker.drain().unwrap(), 1);

    let status = h.queue.status(id).unwrap().unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.progress, 100);
    let result = status.result.unwrap();

    // 100 mm cube at 60 mm pieces: 2 sections per axis
    assert_eq!(result.sections, (2, 2, 2));
    assert_eq!(result.total_parts, 8);
    assert_eq!(result.parts.len(), 8);
    assert_eq!(result.parts[0].name, "part_1_1_1.stl");

    for part in &result.parts {
        assert!(h.store.exists(&part.key).unwrap(), "missing {}", part.key);
        assert!(part.key.starts_with(&format!("results/{id}/")));
    }
    assert!(h.store.exists(&result.zip_key).unwrap());
    assert_eq!(result.zip_key, format!("results/{id}/all-parts.zip"));

    // Progress cell is retired after the terminal state
    assert!(h.board.get(id).is_none());
}

#[test]
fn cancelled_job_fails_with_the_stable_reason() {
    let h = harness();
    let id = submit_cube(&h, 200.0);

    // Flag lands while the job is still waiting; the worker observes it at
    // the first checkpoint
    h.broker.set_cancelled(SPLIT_QUEUE, id).unwrap();
    h.worker.drain().unwrap();

    let status = h.queue.status(id).unwrap().unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.error.as_deref(), Some("Job was cancelled"));
    assert!(status.result.is_none());

    // Nothing was produced
    assert!(h.store.list(&format!("results/{id}/")).unwrap().is_empty());
}

#[test]
fn cancel_endpoint_semantics() {
    let h = harness();
    let id = submit_cube(&h, 200.0);

    // Waiting: removal
    assert_eq!(h.queue.cancel(id).unwrap(), CancelOutcome::Removed);
    assert!(h.queue.status(id).unwrap().is_none());

    // Completed: no-op
    let done = submit_cube(&h, 200.0);
    h.worker.drain().unwrap();
    assert_eq!(h.queue.cancel(done).unwrap(), CancelOutcome::AlreadyFinished);
}

#[test]
fn missing_input_fails_as_storage_error() {
    let h = harness();
    let id = h
        .queue
        .submit(JobPayload::new(
            Uuid::new_v4(),
            "uploads/nowhere/model.stl",
            "model.stl",
            Dimensions {
                x: 100.0,
                y: 100.0,
                z: 100.0,
            },
        ))
        .unwrap();

    h.worker.drain().unwrap();
    let status = h.queue.status(id).unwrap().unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert!(status.error.unwrap().contains("storage"));
}

#[test]
fn force_fail_preempts_a_running_job() {
    let h = harness();
    let id = submit_cube(&h, 60.0);

    // Simulate the admin racing an active worker: take the job, force-fail
    // it, then let the worker's own finish arrive late
    let record = h
        .broker
        .take_next(SPLIT_QUEUE, Duration::from_secs(60))
        .unwrap()
        .unwrap();
    assert_eq!(record.job_id(), id);
    assert!(h.queue.force_fail(id, "operator abort").unwrap());

    let status = h.queue.status(id).unwrap().unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.error.as_deref(), Some("operator abort"));

    // The worker's drain finds nothing waiting; the terminal record stands
    assert_eq!(h.worker.drain().unwrap(), 0);
    assert_eq!(
        h.queue.status(id).unwrap().unwrap().error.as_deref(),
        Some("operator abort")
    );
}

#[test]
fn restart_signal_stops_the_worker_loop() {
    let h = harness();
    h.broker.request_restart(Duration::from_secs(60)).unwrap();

    let started = std::time::Instant::now();
    h.worker.run().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn repair_queue_is_a_sibling_with_its_own_policy() {
    let broker = Arc::new(MemoryBroker::new());
    let board = Arc::new(ProgressBoard::new());
    let split = JobQueue::split(broker.clone(), board.clone());
    let repair = JobQueue::repair(broker.clone(), board.clone());

    assert_eq!(split.name(), SPLIT_QUEUE);
    assert_eq!(repair.name(), REPAIR_QUEUE);
    assert!(repair.policy().job_timeout < split.policy().job_timeout);

    // Same broker, separate queues: a split submission is invisible to repair
    let store = Arc::new(MemoryStore::new());
    let file_id = "uploads/u/m.stl";
    store.put(file_id, &cube_stl(50.0)).unwrap();
    let id = split
        .submit(JobPayload::new(
            Uuid::new_v4(),
            file_id,
            "m.stl",
            Dimensions {
                x: 100.0,
                y: 100.0,
                z: 100.0,
            },
        ))
        .unwrap();
    assert!(repair.status(id).unwrap().is_none());
    assert_eq!(split.counts().unwrap().waiting, 1);
    assert_eq!(repair.counts().unwrap().waiting, 0);
}
