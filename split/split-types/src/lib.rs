//! Core mesh types for the split pipeline.
//!
//! This crate provides the foundational types shared by the STL codec, the
//! CSG kernel, and the split engine:
//!
//! - [`IndexedMesh`] - A triangle mesh with deduplicated, indexed vertices
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`VertexPool`] - Quantizing vertex deduplication table
//! - [`Axis`] - A coordinate axis selector
//!
//! # Units
//!
//! All coordinates are millimeters. Mesh positions are `f32` because STL
//! stores single-precision floats; geometric computation downstream promotes
//! to `f64`.
//!
//! # Coordinate System
//!
//! Right-handed, Z-up. Face winding is counter-clockwise when viewed from
//! outside; normals point outward by the right-hand rule.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod axis;
mod bounds;
mod mesh;
mod pool;

pub use axis::Axis;
pub use bounds::Aabb;
pub use mesh::IndexedMesh;
pub use pool::{VertexPool, DEFAULT_QUANTIZE_PRECISION};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
