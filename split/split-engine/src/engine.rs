//! The split pipeline driver.

use nalgebra::{Point3, Vector3};
use split_csg::Solid;
use split_stl::{decode_stl, encode_stl};
use tracing::{debug, info};

use crate::error::{SplitError, SplitResult};
use crate::grid::GridPlan;
use crate::holes::{carve_alignment_holes, HoleSpec};
use crate::progress::ProgressSink;
use crate::result::{PartArtifact, SplitOutput};

/// Smallest part volume worth emitting, in mm³.
const MIN_PART_VOLUME: f64 = 1e-3;

/// Parameters for one split run.
#[derive(Debug, Clone)]
pub struct SplitParams {
    /// Maximum piece size on each axis, in millimeters.
    pub max_dims: Vector3<f64>,
    /// Shrink pieces to avoid a final sliver row.
    pub balanced_cutting: bool,
    /// Accepted for API compatibility; carries no engine semantics yet.
    pub smart_boundaries: bool,
    /// Alignment-hole configuration.
    pub holes: HoleSpec,
}

impl SplitParams {
    /// Parameters with the given piece limits and everything else off.
    #[must_use]
    pub fn new(max_dims: Vector3<f64>) -> Self {
        Self {
            max_dims,
            balanced_cutting: false,
            smart_boundaries: false,
            holes: HoleSpec::default(),
        }
    }

    /// Validate dimension and hole ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::Validation`] for non-positive or non-finite
    /// dimensions, or out-of-range hole settings.
    pub fn validate(&self) -> SplitResult<()> {
        for (value, axis) in [
            (self.max_dims.x, "x"),
            (self.max_dims.y, "y"),
            (self.max_dims.z, "z"),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SplitError::validation(format!(
                    "dimension {axis} must be positive, got {value}"
                )));
            }
        }
        self.holes.validate()
    }
}

/// Split an STL model into grid parts.
///
/// See the crate docs for the pipeline stages. Progress is published in the
/// 30-75 range; download/upload milestones around it belong to the caller.
///
/// # Errors
///
/// - [`SplitError::InvalidFormat`] - the bytes are not decodable STL
/// - [`SplitError::NonManifoldInput`] - the mesh is not a closed solid
/// - [`SplitError::CsgFailure`] / [`SplitError::CsgMemoryExhaustion`] - a
///   kernel operation failed
/// - [`SplitError::EmptyResult`] - no cell produced geometry
/// - [`SplitError::Validation`] - parameters out of range
pub fn split_model(
    stl_bytes: &[u8],
    params: &SplitParams,
    progress: &dyn ProgressSink,
) -> SplitResult<SplitOutput> {
    params.validate()?;

    let mesh = decode_stl(stl_bytes)?;
    info!(
        faces = mesh.face_count(),
        vertices = mesh.vertex_count(),
        "model decoded"
    );

    let original = Solid::from_mesh(&mesh);
    if !original.is_ok() {
        return Err(SplitError::NonManifoldInput);
    }

    let origin = Point3::new(
        f64::from(mesh.bounds.min.x),
        f64::from(mesh.bounds.min.y),
        f64::from(mesh.bounds.min.z),
    );
    let size = mesh.bounds.size();
    let extent = Vector3::new(f64::from(size.x), f64::from(size.y), f64::from(size.z));

    let plan = GridPlan::compute(extent, params.max_dims, params.balanced_cutting);
    info!(
        sections = ?plan.sections(),
        piece = ?(plan.x.piece_size, plan.y.piece_size, plan.z.piece_size),
        balanced = params.balanced_cutting,
        smart_boundaries = params.smart_boundaries,
        "grid planned"
    );
    progress.publish(30, "Preparing model");

    let working = if params.holes.enabled && plan.has_interior_cuts() {
        let (carved, stats) =
            carve_alignment_holes(&original, &plan, origin, extent, &params.holes, progress)?;
        info!(
            accepted = stats.accepted,
            rejected_volume = stats.rejected_volume,
            rejected_depth = stats.rejected_depth,
            "hole carving done"
        );
        carved
    } else {
        None
    };
    progress.publish(70, "Cutting parts");

    let current = working.as_ref().unwrap_or(&original);
    let piece = Vector3::new(plan.x.piece_size, plan.y.piece_size, plan.z.piece_size);
    let cell_total = plan.cell_count();

    let mut parts = Vec::new();
    for (done, (xi, yi, zi)) in plan.cells().enumerate() {
        let corner = Vector3::new(
            origin.x + f64::from(xi) * piece.x,
            origin.y + f64::from(yi) * piece.y,
            origin.z + f64::from(zi) * piece.z,
        );
        let cell = Solid::cube(piece).translate(corner);
        let part = current.intersect(&cell);
        if !part.is_ok() {
            return Err(SplitError::from_status(part.status()));
        }

        let volume = part.volume();
        if volume > MIN_PART_VOLUME {
            let part_mesh = part.to_mesh();
            let section = (xi + 1, yi + 1, zi + 1);
            debug!(
                section = ?section,
                volume = format!("{volume:.1}"),
                faces = part_mesh.face_count(),
                "part emitted"
            );
            parts.push(PartArtifact {
                name: PartArtifact::name_for(section),
                section,
                bytes: encode_stl(&part_mesh),
            });
        } else {
            debug!(cell = ?(xi, yi, zi), "cell is empty, skipped");
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = 70 + ((5 * (done as u64 + 1)) / cell_total.max(1)) as u8;
        progress.publish(percent.min(75), "Cutting parts");
    }

    if parts.is_empty() {
        return Err(SplitError::EmptyResult);
    }

    info!(parts = parts.len(), cells = cell_total, "split finished");
    Ok(SplitOutput {
        total_parts: parts.len(),
        sections: plan.sections(),
        original_dimensions: extent,
        parts,
    })
}
