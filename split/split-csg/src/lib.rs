//! Solid modeling kernel for the split pipeline.
//!
//! This crate wraps a BSP-tree boolean engine behind a narrow, owned-handle
//! surface: [`Solid`]. The split engine only ever sees the surface —
//! constructors, affine transforms, `intersect`/`subtract`, `volume`,
//! `status`, and mesh conversion — so the engine code carries no knowledge
//! of how booleans are evaluated.
//!
//! # Ownership
//!
//! Every [`Solid`] is exclusively owned. Release is `Drop`, which makes
//! double-free and leaked handles unrepresentable; a process-wide live
//! counter ([`live_solids`]) exists so tests can assert that pipelines
//! return to their baseline handle count.
//!
//! # Status codes
//!
//! Operations never panic on bad geometry. A handle carries a
//! [`SolidStatus`]; anything other than [`SolidStatus::NoError`] poisons
//! downstream booleans, which propagate the first non-ok status they see.
//!
//! # Example
//!
//! ```
//! use split_csg::Solid;
//! use split_types::Vector3;
//!
//! let block = Solid::cube(Vector3::new(10.0, 10.0, 10.0));
//! let drill = Solid::cylinder(12.0, 2.0, 2.0, 32)
//!     .translate(Vector3::new(5.0, 5.0, 5.0));
//! let pocketed = block.subtract(&drill);
//! assert!(pocketed.volume() < block.volume());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Single-char names are standard in geometry code
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]

mod bsp;
mod plane;
mod polygon;
mod solid;
mod validate;

pub use plane::PLANE_EPSILON;
pub use solid::{live_solids, Solid, SolidStatus};
pub use validate::manifold_status;
