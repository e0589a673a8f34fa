//! Complete toolkit for splitting oversized 3D models into printable parts.
//!
//! This umbrella crate re-exports the split crates under one roof, from the
//! STL codec up to the job runtime.
//!
//! # Quick Start
//!
//! ```no_run
//! use split::prelude::*;
//!
//! let stl = std::fs::read("model.stl")?;
//! let params = SplitParams::new(Vector3::new(200.0, 200.0, 180.0));
//! let output = split_model(&stl, &params, &NullProgress)?;
//! for part in &output.parts {
//!     std::fs::write(&part.name, &part.bytes)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Core data structures: `IndexedMesh`, `Aabb`, `VertexPool`
//! - [`stl`] - STL decoding and binary encoding
//! - [`csg`] - The solid modeling kernel behind an owned-handle surface
//! - [`engine`] - Grid planning, hole carving, and the split pipeline
//! - [`store`] - Object store contract and local implementations
//! - [`runtime`] - Queues, workers, progress, cancellation, retention

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub use split_csg as csg;
pub use split_engine as engine;
pub use split_runtime as runtime;
pub use split_stl as stl;
pub use split_store as store;
pub use split_types as types;

/// Convenient imports for the common pipeline.
pub mod prelude {
    pub use split_csg::{Solid, SolidStatus};
    pub use split_engine::{
        bundle_parts, split_model, GridPlan, HoleSpacing, HoleSpec, NullProgress, PartArtifact,
        ProgressSink, SplitError, SplitOutput, SplitParams,
    };
    pub use split_runtime::{
        Dimensions, JobPayload, JobQueue, JobState, MemoryBroker, ProgressBoard, QueuePolicy,
        SplitHandler, Worker, WorkerOptions,
    };
    pub use split_stl::{decode_stl, encode_stl, load_stl, save_stl};
    pub use split_store::{DirectoryStore, MemoryStore, ObjectStore};
    pub use split_types::{Aabb, Axis, IndexedMesh, Point3, Vector3};
}
