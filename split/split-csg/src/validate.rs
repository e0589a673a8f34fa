//! Manifold validation for imported meshes.

use hashbrown::HashMap;
use split_types::IndexedMesh;
use tracing::debug;

use crate::solid::SolidStatus;

/// Classify a mesh as a closed 2-manifold or not.
///
/// A mesh passes when every undirected edge is used by exactly two faces,
/// once in each direction (consistent winding), no face repeats a vertex,
/// and every face index is in range. An empty mesh fails.
#[must_use]
pub fn manifold_status(mesh: &IndexedMesh) -> SolidStatus {
    if mesh.is_empty() || !mesh.indices_in_range() {
        return SolidStatus::NonManifold;
    }

    // (uses, winding balance) per undirected edge
    let mut edges: HashMap<(u32, u32), (u32, i32)> = HashMap::new();

    for &[a, b, c] in &mesh.faces {
        if a == b || b == c || a == c {
            return SolidStatus::NonManifold;
        }
        for (from, to) in [(a, b), (b, c), (c, a)] {
            let key = (from.min(to), from.max(to));
            let orientation = if from < to { 1 } else { -1 };
            let entry = edges.entry(key).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += orientation;
        }
    }

    let bad = edges
        .values()
        .filter(|&&(uses, balance)| uses != 2 || balance != 0)
        .count();
    if bad > 0 {
        debug!(bad_edges = bad, "mesh failed manifold check");
        return SolidStatus::NonManifold;
    }

    SolidStatus::NoError
}
