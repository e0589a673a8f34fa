//! Indexed triangle mesh.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::Aabb;

/// An indexed triangle mesh with tracked bounds.
///
/// Positions are stored as `f32` (the STL wire precision); faces reference
/// positions by index, counter-clockwise when viewed from outside.
///
/// Invariants maintained by the codec and the kernel exporter:
/// - every face index is in range,
/// - positions are deduplicated under the quantization key of
///   [`VertexPool`](crate::VertexPool),
/// - `bounds` is the componentwise min/max over all referenced positions.
///
/// # Example
///
/// ```
/// use split_types::{IndexedMesh, Point3};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.positions.push(Point3::new(0.0, 0.0, 0.0));
/// mesh.positions.push(Point3::new(1.0, 0.0, 0.0));
/// mesh.positions.push(Point3::new(0.5, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.recompute_bounds();
///
/// assert_eq!(mesh.face_count(), 1);
/// assert_eq!(mesh.bounds.max.y, 1.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedMesh {
    /// Vertex positions.
    pub positions: Vec<Point3<f32>>,

    /// Triangle faces as indices into `positions`, CCW winding.
    pub faces: Vec<[u32; 3]>,

    /// Componentwise min/max over referenced positions.
    pub bounds: Aabb,
}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            faces: Vec::new(),
            bounds: Aabb::empty(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
            bounds: Aabb::empty(),
        }
    }

    /// Create a mesh from parts, computing bounds from the positions.
    #[must_use]
    pub fn from_parts(positions: Vec<Point3<f32>>, faces: Vec<[u32; 3]>) -> Self {
        let bounds = Aabb::from_points(positions.iter());
        Self {
            positions,
            faces,
            bounds,
        }
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangle faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh has no faces.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Check that every face index is in range.
    #[must_use]
    pub fn indices_in_range(&self) -> bool {
        let n = self.positions.len() as u32;
        self.faces
            .iter()
            .all(|f| f[0] < n && f[1] < n && f[2] < n)
    }

    /// Recompute `bounds` from the current positions.
    pub fn recompute_bounds(&mut self) {
        self.bounds = Aabb::from_points(self.positions.iter());
    }

    /// Corner positions of a face, or `None` if the index is out of range.
    #[must_use]
    pub fn triangle(&self, face: usize) -> Option<[Point3<f32>; 3]> {
        let [i0, i1, i2] = *self.faces.get(face)?;
        Some([
            *self.positions.get(i0 as usize)?,
            *self.positions.get(i1 as usize)?,
            *self.positions.get(i2 as usize)?,
        ])
    }
}

impl Default for IndexedMesh {
    fn default() -> Self {
        Self::new()
    }
}
