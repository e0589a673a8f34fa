//! The owned solid handle and its operations.

use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::{Point3, Rotation3, Vector3};
use split_types::{IndexedMesh, VertexPool};
use tracing::debug;

use crate::bsp::Node;
use crate::polygon::Polygon;
use crate::validate::manifold_status;

/// Upper bound on polygons a boolean result may carry.
///
/// Exceeding it marks the result [`SolidStatus::ResultTooComplex`] instead
/// of letting tree sizes grow without bound.
const MAX_RESULT_POLYGONS: usize = 250_000;

/// Process-wide count of live [`Solid`] handles.
static LIVE_SOLIDS: AtomicUsize = AtomicUsize::new(0);

/// Number of currently live [`Solid`] handles.
///
/// Intended for tests that assert a pipeline releases everything it
/// allocates.
#[must_use]
pub fn live_solids() -> usize {
    LIVE_SOLIDS.load(Ordering::SeqCst)
}

/// Health of a solid handle.
///
/// Anything other than `NoError` poisons downstream booleans: operations on
/// a bad handle return a handle carrying the same status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidStatus {
    /// The solid is a usable closed volume.
    NoError,
    /// The source mesh is not a closed 2-manifold.
    NonManifold,
    /// Constructor parameters were out of range (non-positive size, too few
    /// facets).
    InvalidConstruction,
    /// A boolean result exceeded the polygon budget.
    ResultTooComplex,
}

impl SolidStatus {
    /// Check for `NoError`.
    #[inline]
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::NoError
    }
}

/// An exclusively-owned, closed solid volume.
///
/// Handles are created by constructors ([`cube`](Self::cube),
/// [`cylinder`](Self::cylinder), [`from_mesh`](Self::from_mesh)) and by
/// boolean operations. Dropping a handle releases it; the live-handle count
/// is visible through [`live_solids`].
#[derive(Debug)]
pub struct Solid {
    polygons: Vec<Polygon>,
    status: SolidStatus,
}

impl Solid {
    fn wrap(polygons: Vec<Polygon>, status: SolidStatus) -> Self {
        LIVE_SOLIDS.fetch_add(1, Ordering::SeqCst);
        Self { polygons, status }
    }

    fn poisoned(status: SolidStatus) -> Self {
        Self::wrap(Vec::new(), status)
    }

    /// Axis-aligned box spanning from the origin to `size`.
    ///
    /// Non-positive dimensions produce an
    /// [`InvalidConstruction`](SolidStatus::InvalidConstruction) handle.
    #[must_use]
    pub fn cube(size: Vector3<f64>) -> Self {
        if !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0) {
            return Self::poisoned(SolidStatus::InvalidConstruction);
        }

        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        let corners = [
            p(0.0, 0.0, 0.0),
            p(size.x, 0.0, 0.0),
            p(size.x, size.y, 0.0),
            p(0.0, size.y, 0.0),
            p(0.0, 0.0, size.z),
            p(size.x, 0.0, size.z),
            p(size.x, size.y, size.z),
            p(0.0, size.y, size.z),
        ];

        // CCW from outside
        let faces: [[usize; 4]; 6] = [
            [0, 3, 2, 1], // bottom, -Z
            [4, 5, 6, 7], // top, +Z
            [0, 1, 5, 4], // front, -Y
            [3, 7, 6, 2], // back, +Y
            [0, 4, 7, 3], // left, -X
            [1, 2, 6, 5], // right, +X
        ];

        let polygons = faces
            .iter()
            .filter_map(|idx| Polygon::new(idx.iter().map(|&i| corners[i]).collect()))
            .collect();
        Self::wrap(polygons, SolidStatus::NoError)
    }

    /// Right circular cylinder (or frustum) along Z, centered on the origin.
    ///
    /// Spans `z in [-length/2, length/2]` with `r_bottom` at the low end and
    /// `r_top` at the high end, approximated with `segments` flat facets.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cylinder(length: f64, r_bottom: f64, r_top: f64, segments: usize) -> Self {
        if length <= 0.0 || r_bottom <= 0.0 || r_top <= 0.0 || segments < 3 {
            return Self::poisoned(SolidStatus::InvalidConstruction);
        }

        let half = length / 2.0;
        let rim = |radius: f64, z: f64, i: usize| {
            let angle = std::f64::consts::TAU * (i % segments) as f64 / segments as f64;
            Point3::new(radius * angle.cos(), radius * angle.sin(), z)
        };
        let bottom_center = Point3::new(0.0, 0.0, -half);
        let top_center = Point3::new(0.0, 0.0, half);

        let mut polygons = Vec::with_capacity(segments * 3);
        for i in 0..segments {
            let b0 = rim(r_bottom, -half, i);
            let b1 = rim(r_bottom, -half, i + 1);
            let t0 = rim(r_top, half, i);
            let t1 = rim(r_top, half, i + 1);

            // Bottom cap winds clockwise seen from above (normal -Z)
            if let Some(cap) = Polygon::new(vec![bottom_center, b1, b0]) {
                polygons.push(cap);
            }
            if (r_bottom - r_top).abs() < f64::EPSILON {
                if let Some(side) = Polygon::new(vec![b0, b1, t1, t0]) {
                    polygons.push(side);
                }
            } else {
                // Frustum side quads are non-planar, keep them triangular
                for tri in [[b0, b1, t1], [b0, t1, t0]] {
                    if let Some(side) = Polygon::new(tri.to_vec()) {
                        polygons.push(side);
                    }
                }
            }
            if let Some(cap) = Polygon::new(vec![top_center, t0, t1]) {
                polygons.push(cap);
            }
        }

        Self::wrap(polygons, SolidStatus::NoError)
    }

    /// Build a solid from an indexed mesh.
    ///
    /// The mesh is validated as a closed 2-manifold; failures yield a handle
    /// with [`SolidStatus::NonManifold`].
    #[must_use]
    pub fn from_mesh(mesh: &IndexedMesh) -> Self {
        let status = manifold_status(mesh);
        if !status.is_ok() {
            return Self::poisoned(status);
        }

        let polygons = mesh
            .faces
            .iter()
            .filter_map(|&[a, b, c]| {
                let to_f64 = |i: u32| {
                    let p = mesh.positions[i as usize];
                    Point3::new(f64::from(p.x), f64::from(p.y), f64::from(p.z))
                };
                // Zero-area triangles carry no plane and are dropped
                Polygon::new(vec![to_f64(a), to_f64(b), to_f64(c)])
            })
            .collect();
        Self::wrap(polygons, SolidStatus::NoError)
    }

    /// Export the solid's boundary as an indexed mesh.
    ///
    /// Polygons are fan-triangulated and vertices deduplicated at the
    /// production quantization precision; bounds come from the accepted
    /// vertices.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: f64 kernel coordinates narrow to the f32 mesh precision
    pub fn to_mesh(&self) -> IndexedMesh {
        let mut pool = VertexPool::new();
        let mut faces = Vec::new();

        for polygon in &self.polygons {
            let indices: Vec<u32> = polygon
                .vertices
                .iter()
                .map(|v| pool.insert(Point3::new(v.x as f32, v.y as f32, v.z as f32)))
                .collect();
            for i in 1..indices.len().saturating_sub(1) {
                faces.push([indices[0], indices[i], indices[i + 1]]);
            }
        }

        pool.into_mesh(faces)
    }

    /// Translate by `v`, consuming the receiver.
    #[must_use]
    pub fn translate(mut self, v: Vector3<f64>) -> Self {
        for polygon in &mut self.polygons {
            for vertex in &mut polygon.vertices {
                *vertex += v;
            }
            polygon.plane.w += polygon.plane.normal.dot(&v);
        }
        self
    }

    /// Rotate by Euler angles in degrees (applied X, then Y, then Z),
    /// consuming the receiver.
    #[must_use]
    pub fn rotate(mut self, euler_deg: Vector3<f64>) -> Self {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), euler_deg.z.to_radians())
            * Rotation3::from_axis_angle(&Vector3::y_axis(), euler_deg.y.to_radians())
            * Rotation3::from_axis_angle(&Vector3::x_axis(), euler_deg.x.to_radians());

        for polygon in &mut self.polygons {
            for vertex in &mut polygon.vertices {
                *vertex = rotation * *vertex;
            }
            // Rigid rotation about the origin preserves the plane offset
            polygon.plane.normal = rotation * polygon.plane.normal;
        }
        self
    }

    /// Boolean intersection with `other`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        if let Err(status) = self.gate(other) {
            return Self::poisoned(status);
        }

        let mut a = Node::new(self.polygons.clone());
        let mut b = Node::new(other.polygons.clone());

        a.invert();
        b.clip_to(&a);
        b.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        a.build(b.all_polygons());
        a.invert();

        Self::finish(a.all_polygons(), "intersect")
    }

    /// Boolean difference: the receiver minus `other`.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        if let Err(status) = self.gate(other) {
            return Self::poisoned(status);
        }

        let mut a = Node::new(self.polygons.clone());
        let mut b = Node::new(other.polygons.clone());

        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(b.all_polygons());
        a.invert();

        Self::finish(a.all_polygons(), "subtract")
    }

    /// Signed enclosed volume by the divergence theorem.
    ///
    /// Positive for outward-wound closed solids; not meaningful for poisoned
    /// handles (returns 0.0).
    #[must_use]
    pub fn volume(&self) -> f64 {
        let mut total = 0.0;
        for polygon in &self.polygons {
            let v0 = polygon.vertices[0].coords;
            for i in 1..polygon.vertices.len() - 1 {
                let v1 = polygon.vertices[i].coords;
                let v2 = polygon.vertices[i + 1].coords;
                total += v0.dot(&v1.cross(&v2));
            }
        }
        total / 6.0
    }

    /// Status of this handle.
    #[inline]
    #[must_use]
    pub fn status(&self) -> SolidStatus {
        self.status
    }

    /// Check the handle is usable.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Number of boundary polygons (diagnostic).
    #[inline]
    #[must_use]
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Check both operands are usable and the combined size is in budget.
    fn gate(&self, other: &Self) -> Result<(), SolidStatus> {
        if !self.status.is_ok() {
            return Err(self.status);
        }
        if !other.status.is_ok() {
            return Err(other.status);
        }
        if self.polygons.len() + other.polygons.len() > MAX_RESULT_POLYGONS {
            return Err(SolidStatus::ResultTooComplex);
        }
        Ok(())
    }

    fn finish(polygons: Vec<Polygon>, op: &str) -> Self {
        if polygons.len() > MAX_RESULT_POLYGONS {
            debug!(op, polygons = polygons.len(), "boolean result over budget");
            return Self::poisoned(SolidStatus::ResultTooComplex);
        }
        Self::wrap(polygons, SolidStatus::NoError)
    }
}

impl Drop for Solid {
    fn drop(&mut self) {
        LIVE_SOLIDS.fetch_sub(1, Ordering::SeqCst);
    }
}
