//! Job runtime for the split service.
//!
//! Coordinates queued units of work against a shared broker and a shared
//! object store: durable submission, FIFO dispatch to worker threads,
//! per-job progress, cooperative cancellation, stall and timeout recovery,
//! retention, and a restart signal for rolling deploys.
//!
//! # Shape
//!
//! - [`JobPayload`] / [`JobRecord`] - typed, versioned job data; everything
//!   crosses the broker serialized
//! - [`Broker`] - the queue transport contract; [`MemoryBroker`] is the
//!   in-process implementation used by tests and single-node deployments
//! - [`JobQueue`] - submission, status, position/ETA, cancel, and admin
//!   operations for one queue ([`SPLIT_QUEUE`] or [`REPAIR_QUEUE`])
//! - [`Worker`] - the processing loop; handlers implement [`JobHandler`],
//!   with [`SplitHandler`] as the split queue's handler
//! - [`ProgressBoard`] - single-writer progress cells read by the HTTP
//!   surface
//! - [`RuntimeConfig`] - environment configuration, validated at startup
//!
//! # Wiring example
//!
//! ```
//! use std::sync::Arc;
//! use split_runtime::{
//!     JobQueue, MemoryBroker, ProgressBoard, QueuePolicy, SplitHandler, Worker,
//!     WorkerOptions, SPLIT_QUEUE,
//! };
//! use split_store::MemoryStore;
//!
//! let broker = Arc::new(MemoryBroker::new());
//! let board = Arc::new(ProgressBoard::new());
//! let store = Arc::new(MemoryStore::new());
//!
//! let queue = JobQueue::split(broker.clone(), board.clone());
//! let mut worker = Worker::new(broker, board, WorkerOptions::default());
//! worker.register(SPLIT_QUEUE, QueuePolicy::split(), Arc::new(SplitHandler::new(store)));
//! // queue.submit(payload)? ... worker.run() in the worker process
//! # let _ = queue;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

mod broker;
mod config;
mod error;
mod handler;
mod job;
mod progress;
mod queue;
mod worker;

pub use broker::{Broker, MemoryBroker, QueueCounts};
pub use config::{parse_size, RuntimeConfig, StoreConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use handler::{CancelProbe, JobContext, JobHandler, SplitHandler};
pub use job::{
    Dimensions, JobPayload, JobRecord, JobResultData, JobState, JobStatus, PartRef,
    QueuePosition, PAYLOAD_VERSION,
};
pub use progress::{Progress, ProgressBoard, ProgressCell};
pub use queue::{
    CancelOutcome, JobQueue, QueuePolicy, REPAIR_QUEUE, RESTART_TTL, SPLIT_QUEUE,
};
pub use worker::{Worker, WorkerOptions};
