//! Convex polygons carried by the BSP tree.

use nalgebra::Point3;

use crate::plane::Plane;

/// A planar convex polygon with three or more vertices.
///
/// Winding is counter-clockwise when viewed from the front side of its
/// plane. Split fragments inherit the parent polygon's plane rather than
/// re-deriving it from (possibly near-collinear) fragment vertices.
#[derive(Debug, Clone)]
pub(crate) struct Polygon {
    pub vertices: Vec<Point3<f64>>,
    pub plane: Plane,
}

impl Polygon {
    /// Build a polygon, deriving its plane from the first three vertices.
    ///
    /// Returns `None` when the vertices are too few or collinear.
    pub fn new(vertices: Vec<Point3<f64>>) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        let plane = Plane::from_points(&vertices[0], &vertices[1], &vertices[2])?;
        Some(Self { vertices, plane })
    }

    /// Build a polygon with an explicitly supplied plane.
    pub fn with_plane(vertices: Vec<Point3<f64>>, plane: Plane) -> Self {
        Self { vertices, plane }
    }

    /// Reverse orientation: vertex order and plane.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }
}
