//! Split pipeline output types.

use nalgebra::Vector3;

/// One emitted printable part.
#[derive(Debug, Clone)]
pub struct PartArtifact {
    /// File name, `part_{x}_{y}_{z}.stl` with 1-based grid indices.
    pub name: String,
    /// 1-based grid cell indices of this part.
    pub section: (u32, u32, u32),
    /// Binary STL bytes.
    pub bytes: Vec<u8>,
}

impl PartArtifact {
    /// Build the canonical part name for a 1-based section triple.
    #[must_use]
    pub fn name_for(section: (u32, u32, u32)) -> String {
        format!("part_{}_{}_{}.stl", section.0, section.1, section.2)
    }
}

/// Result of splitting one model.
#[derive(Debug)]
pub struct SplitOutput {
    /// Emitted parts in lexicographic cell order.
    pub parts: Vec<PartArtifact>,
    /// Number of emitted parts.
    pub total_parts: usize,
    /// Grid section counts on each axis.
    pub sections: (u32, u32, u32),
    /// Extent of the input model in millimeters.
    pub original_dimensions: Vector3<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_names_are_one_based() {
        assert_eq!(PartArtifact::name_for((1, 1, 1)), "part_1_1_1.stl");
        assert_eq!(PartArtifact::name_for((2, 1, 3)), "part_2_1_3.stl");
    }
}
