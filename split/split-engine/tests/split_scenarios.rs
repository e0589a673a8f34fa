//! End-to-end split scenarios over synthetic STL fixtures.

use split_engine::{
    bundle_parts, split_model, HoleSpacing, HoleSpec, NullProgress, SplitError, SplitParams,
};
use split_stl::{decode_stl, encode_stl};
use split_types::{IndexedMesh, Point3, Vector3};

/// Axis-aligned closed box from `min` spanning `size`.
fn box_mesh(min: [f32; 3], size: [f32; 3]) -> IndexedMesh {
    let p = |dx: f32, dy: f32, dz: f32| {
        Point3::new(min[0] + dx * size[0], min[1] + dy * size[1], min[2] + dz * size[2])
    };
    let positions = vec![
        p(0.0, 0.0, 0.0),
        p(1.0, 0.0, 0.0),
        p(1.0, 1.0, 0.0),
        p(0.0, 1.0, 0.0),
        p(0.0, 0.0, 1.0),
        p(1.0, 0.0, 1.0),
        p(1.0, 1.0, 1.0),
        p(0.0, 1.0, 1.0),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    IndexedMesh::from_parts(positions, faces)
}

/// Closed box with flipped winding (an inner cavity wall).
fn cavity_mesh(min: [f32; 3], size: [f32; 3]) -> IndexedMesh {
    let mut mesh = box_mesh(min, size);
    for face in &mut mesh.faces {
        face.swap(1, 2);
    }
    mesh
}

fn solid_volume(mesh: &IndexedMesh) -> f64 {
    let solid = split_csg::Solid::from_mesh(mesh);
    assert!(solid.is_ok(), "part should re-import as a closed solid");
    solid.volume()
}

#[test]
fn trivial_single_piece() {
    let stl = encode_stl(&box_mesh([0.0; 3], [100.0; 3]));
    let params = SplitParams::new(Vector3::new(200.0, 200.0, 200.0));

    let output = split_model(&stl, &params, &NullProgress).unwrap();
    assert_eq!(output.sections, (1, 1, 1));
    assert_eq!(output.total_parts, 1);
    assert_eq!(output.parts[0].name, "part_1_1_1.stl");

    let part = decode_stl(&output.parts[0].bytes).unwrap();
    for (got, want) in [
        (f64::from(part.bounds.min.x), 0.0),
        (f64::from(part.bounds.max.x), 100.0),
        (f64::from(part.bounds.max.z), 100.0),
    ] {
        assert!((got - want).abs() < 1e-3, "bounds {got} != {want}");
    }

    let zip = bundle_parts(&output.parts).unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(zip)).unwrap();
    assert_eq!(archive.len(), 1);
}

#[test]
fn exact_two_by_one_grid() {
    let stl = encode_stl(&box_mesh([0.0; 3], [300.0, 100.0, 50.0]));
    let params = SplitParams::new(Vector3::new(150.0, 200.0, 200.0));

    let output = split_model(&stl, &params, &NullProgress).unwrap();
    assert_eq!(output.sections, (2, 1, 1));
    assert_eq!(output.total_parts, 2);
    assert_eq!(output.parts[0].name, "part_1_1_1.stl");
    assert_eq!(output.parts[1].name, "part_2_1_1.stl");

    let first = decode_stl(&output.parts[0].bytes).unwrap();
    let second = decode_stl(&output.parts[1].bytes).unwrap();

    let size_a = first.bounds.size();
    let size_b = second.bounds.size();
    for size in [size_a, size_b] {
        assert!((f64::from(size.x) - 150.0).abs() < 1e-3);
        assert!((f64::from(size.y) - 100.0).abs() < 1e-3);
        assert!((f64::from(size.z) - 50.0).abs() < 1e-3);
    }
    assert!((f64::from(first.bounds.min.x) - 0.0).abs() < 1e-3);
    assert!((f64::from(second.bounds.min.x) - 150.0).abs() < 1e-3);
}

#[test]
fn balanced_cutting_equalizes_pieces() {
    let stl = encode_stl(&box_mesh([0.0; 3], [250.0, 100.0, 50.0]));
    let mut params = SplitParams::new(Vector3::new(200.0, 200.0, 200.0));
    params.balanced_cutting = true;

    let output = split_model(&stl, &params, &NullProgress).unwrap();
    assert_eq!(output.sections, (2, 1, 1));

    // Remainder 50 < 100: both pieces shrink to 125
    let first = decode_stl(&output.parts[0].bytes).unwrap();
    assert!((f64::from(first.bounds.size().x) - 125.0).abs() < 1e-3);
}

#[test]
fn sparse_holes_drill_both_sides_of_the_cut() {
    let block = box_mesh([0.0; 3], [300.0, 100.0, 100.0]);
    let stl = encode_stl(&block);
    let mut params = SplitParams::new(Vector3::new(150.0, 200.0, 200.0));
    params.holes = HoleSpec {
        enabled: true,
        diameter_mm: 1.8,
        depth_mm: 3.0,
        spacing: HoleSpacing::Sparse,
    };

    let output = split_model(&stl, &params, &NullProgress).unwrap();
    assert_eq!(output.sections, (2, 1, 1));
    assert_eq!(output.total_parts, 2);

    // Five pockets on the single interior plane, split across both parts
    let drilled: f64 = output
        .parts
        .iter()
        .map(|p| solid_volume(&decode_stl(&p.bytes).unwrap()))
        .sum();
    let full = 300.0 * 100.0 * 100.0;
    let facet = 32.0 * 0.5 * 0.9 * 0.9 * (std::f64::consts::TAU / 32.0).sin();
    let expected_removed = 5.0 * facet * 6.0;
    let removed = full - drilled;
    assert!(
        (removed - expected_removed).abs() / expected_removed < 0.05,
        "removed {removed}, expected about {expected_removed}"
    );

    // Each part lost roughly half of every pocket
    for part in &output.parts {
        let volume = solid_volume(&decode_stl(&part.bytes).unwrap());
        let half = full / 2.0;
        assert!(volume < half);
        assert!(volume > half - expected_removed);
    }
}

#[test]
fn hollow_shell_splits_without_holes() {
    let mut shell = box_mesh([0.0; 3], [200.0; 3]);
    let inner = cavity_mesh([2.0; 3], [196.0; 3]);
    let offset = shell.positions.len() as u32;
    shell.positions.extend(inner.positions.iter().copied());
    for face in &inner.faces {
        shell
            .faces
            .push([face[0] + offset, face[1] + offset, face[2] + offset]);
    }
    shell.recompute_bounds();

    let stl = encode_stl(&shell);
    let mut params = SplitParams::new(Vector3::new(100.0, 100.0, 100.0));
    params.holes = HoleSpec {
        enabled: true,
        diameter_mm: 1.8,
        depth_mm: 3.0,
        spacing: HoleSpacing::Normal,
    };

    let output = split_model(&stl, &params, &NullProgress).unwrap();
    assert_eq!(output.sections, (2, 2, 2));
    assert_eq!(output.total_parts, 8);

    // Thin walls give no candidate a full-volume pocket: the shell volume
    // survives intact to within kernel tolerance
    let shell_volume = 200.0f64.powi(3) - 196.0f64.powi(3);
    let total: f64 = output
        .parts
        .iter()
        .map(|p| solid_volume(&decode_stl(&p.bytes).unwrap()))
        .sum();
    assert!(
        (total - shell_volume).abs() / shell_volume < 0.05,
        "total {total}, shell {shell_volume}"
    );
}

#[test]
fn model_with_no_geometry_in_any_cell_fails() {
    // Degenerate STL: parses, but not manifold
    let stl = b"solid empty\nendsolid empty\n";
    let params = SplitParams::new(Vector3::new(100.0, 100.0, 100.0));
    let err = split_model(stl, &params, &NullProgress).unwrap_err();
    assert!(matches!(err, SplitError::NonManifoldInput));
}

#[test]
fn parts_carry_positive_volume() {
    let stl = encode_stl(&box_mesh([0.0; 3], [120.0, 80.0, 40.0]));
    let params = SplitParams::new(Vector3::new(50.0, 50.0, 50.0));

    let output = split_model(&stl, &params, &NullProgress).unwrap();
    assert_eq!(output.sections, (3, 2, 1));
    for part in &output.parts {
        let mesh = decode_stl(&part.bytes).unwrap();
        assert!(solid_volume(&mesh) > 1e-3);
    }
}
