//! Model splitting for 3D printing.
//!
//! Takes an STL model and cuts it into a regular grid of printable pieces,
//! optionally drilling cylindrical alignment cavities on the cut planes so
//! the printed pieces can be pinned back together with filament.
//!
//! # Pipeline
//!
//! 1. Decode the STL ([`split_stl`]) and build a solid ([`split_csg`]);
//!    meshes that are not closed 2-manifolds are refused.
//! 2. Plan the cutting grid ([`GridPlan`]) from the model extent and the
//!    per-axis maximum piece size.
//! 3. When enabled and the grid has interior cut planes, carve alignment
//!    holes: per plane and per cell, probe the true material footprint,
//!    enumerate candidate positions, and keep only candidates that pass the
//!    volume and depth quality gates.
//! 4. Intersect the (carved) solid against each grid cell and emit one
//!    binary STL per cell that contains material.
//! 5. Bundle the emitted parts into a ZIP archive.
//!
//! Progress is published through a [`ProgressSink`]; all errors funnel into
//! [`SplitError`].
//!
//! # Example
//!
//! ```no_run
//! use split_engine::{split_model, NullProgress, SplitParams};
//! use split_types::Vector3;
//!
//! let stl = std::fs::read("model.stl")?;
//! let params = SplitParams::new(Vector3::new(200.0, 200.0, 180.0));
//! let output = split_model(&stl, &params, &NullProgress)?;
//! println!("{} parts", output.total_parts);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

mod bundle;
mod engine;
mod error;
mod grid;
mod holes;
mod progress;
mod result;

pub use bundle::bundle_parts;
pub use engine::{split_model, SplitParams};
pub use error::{SplitError, SplitResult};
pub use grid::{AxisPlan, GridPlan};
pub use holes::{CarveStats, HoleSpacing, HoleSpec};
pub use progress::{NullProgress, ProgressSink};
pub use result::{PartArtifact, SplitOutput};
