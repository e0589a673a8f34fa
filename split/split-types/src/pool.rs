//! Quantizing vertex deduplication.

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::{Aabb, IndexedMesh};

/// Decimal places used for the production deduplication key.
///
/// Part files must stay byte-compatible across releases, so this value is
/// fixed; tests may construct pools at other precisions.
pub const DEFAULT_QUANTIZE_PRECISION: usize = 6;

/// Deduplicating vertex table.
///
/// Vertices are keyed by their fixed-point decimal rendering (`{:.6}` per
/// component, half-to-even rounding), so positions that agree to the key
/// precision collapse to one index. The pool also tracks the componentwise
/// min/max of accepted vertices, which becomes the mesh bounds.
///
/// # Example
///
/// ```
/// use split_types::{Point3, VertexPool};
///
/// let mut pool = VertexPool::new();
/// let a = pool.insert(Point3::new(1.0, 2.0, 3.0));
/// let b = pool.insert(Point3::new(1.0, 2.0, 3.0));
/// assert_eq!(a, b);
/// assert_eq!(pool.len(), 1);
/// ```
#[derive(Debug)]
pub struct VertexPool {
    precision: usize,
    index: HashMap<String, u32>,
    positions: Vec<Point3<f32>>,
    bounds: Aabb,
}

impl VertexPool {
    /// Create a pool at the production precision.
    #[must_use]
    pub fn new() -> Self {
        Self::with_precision(DEFAULT_QUANTIZE_PRECISION)
    }

    /// Create a pool at an explicit quantization precision.
    #[must_use]
    pub fn with_precision(precision: usize) -> Self {
        Self {
            precision,
            index: HashMap::new(),
            positions: Vec::new(),
            bounds: Aabb::empty(),
        }
    }

    /// Create a pool with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(precision: usize, capacity: usize) -> Self {
        Self {
            precision,
            index: HashMap::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            bounds: Aabb::empty(),
        }
    }

    /// Insert a vertex, returning its (possibly shared) index.
    ///
    /// The first occurrence of a key wins: later near-duplicates reuse the
    /// original coordinates.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: vertex indices are u32, meshes with >4B vertices unsupported
    pub fn insert(&mut self, position: Point3<f32>) -> u32 {
        let p = self.precision;
        let key = format!(
            "{:.p$},{:.p$},{:.p$}",
            position.x, position.y, position.z
        );

        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }

        let id = self.positions.len() as u32;
        self.index.insert(key, id);
        self.positions.push(position);
        self.bounds.expand_to_include(&position);
        id
    }

    /// Number of distinct vertices accepted so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the pool is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Bounds over accepted vertices.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Consume the pool into a mesh with the given faces.
    #[must_use]
    pub fn into_mesh(self, faces: Vec<[u32; 3]>) -> IndexedMesh {
        IndexedMesh {
            positions: self.positions,
            faces,
            bounds: self.bounds,
        }
    }
}

impl Default for VertexPool {
    fn default() -> Self {
        Self::new()
    }
}
