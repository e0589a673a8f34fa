//! Cutting grid planning.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use split_types::Axis;

/// Per-axis slice of a [`GridPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisPlan {
    /// Number of grid sections along the axis (at least 1).
    pub sections: u32,
    /// Size of each section in millimeters.
    pub piece_size: f64,
}

/// A cutting grid: how many pieces along each axis and how big they are.
///
/// Planning is pure: the same extent and limits always produce the same
/// plan. `sections * piece_size >= extent` holds on every axis; in balanced
/// mode, when balancing triggers, it holds with equality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPlan {
    /// Plan along X.
    pub x: AxisPlan,
    /// Plan along Y.
    pub y: AxisPlan,
    /// Plan along Z.
    pub z: AxisPlan,
}

impl GridPlan {
    /// Plan the grid from a model extent and per-axis maximum piece sizes.
    ///
    /// Each axis is planned independently:
    /// `sections = max(1, ceil(extent / max_dim))`. With `balanced` set, a
    /// final sliver smaller than half a piece is avoided by shrinking all
    /// pieces to `extent / sections`; otherwise pieces keep the maximum
    /// size and the final row simply extends past the model.
    #[must_use]
    pub fn compute(extent: Vector3<f64>, max_dims: Vector3<f64>, balanced: bool) -> Self {
        Self {
            x: plan_axis(extent.x, max_dims.x, balanced),
            y: plan_axis(extent.y, max_dims.y, balanced),
            z: plan_axis(extent.z, max_dims.z, balanced),
        }
    }

    /// Plan along one axis.
    #[inline]
    #[must_use]
    pub const fn axis(&self, axis: Axis) -> AxisPlan {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Section counts as an `(x, y, z)` triple.
    #[inline]
    #[must_use]
    pub const fn sections(&self) -> (u32, u32, u32) {
        (self.x.sections, self.y.sections, self.z.sections)
    }

    /// Total number of grid cells.
    #[inline]
    #[must_use]
    pub const fn cell_count(&self) -> u64 {
        self.x.sections as u64 * self.y.sections as u64 * self.z.sections as u64
    }

    /// Whether any axis has more than one section.
    #[inline]
    #[must_use]
    pub const fn has_interior_cuts(&self) -> bool {
        self.x.sections > 1 || self.y.sections > 1 || self.z.sections > 1
    }

    /// Interior cut-plane offsets along `axis`, relative to the grid origin.
    ///
    /// A grid with `n` sections has `n - 1` interior planes at
    /// `piece_size, 2 * piece_size, ...`.
    pub fn interior_cuts(&self, axis: Axis) -> impl Iterator<Item = f64> {
        let plan = self.axis(axis);
        (1..plan.sections).map(move |i| f64::from(i) * plan.piece_size)
    }

    /// All grid cells in lexicographic `(x, y, z)` order, zero-based.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, u32)> {
        let (nx, ny, nz) = self.sections();
        (0..nx).flat_map(move |x| (0..ny).flat_map(move |y| (0..nz).map(move |z| (x, y, z))))
    }
}

fn plan_axis(extent: f64, max_dim: f64, balanced: bool) -> AxisPlan {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    // Truncation: section counts are far below u32::MAX for any real model
    let sections = ((extent / max_dim).ceil().max(1.0)) as u32;

    let remainder = extent % max_dim;
    let piece_size = if balanced && remainder > 0.0 && remainder < 0.5 * max_dim {
        extent / f64::from(sections)
    } else {
        max_dim
    };

    AxisPlan {
        sections,
        piece_size,
    }
}
