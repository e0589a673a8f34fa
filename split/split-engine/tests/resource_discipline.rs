//! Kernel handle accounting across whole split runs.
//!
//! A single test in its own binary so the process-wide handle counter is
//! undisturbed by other tests.

use split_csg::live_solids;
use split_engine::{split_model, HoleSpacing, HoleSpec, NullProgress, SplitParams};
use split_stl::encode_stl;
use split_types::{IndexedMesh, Point3, Vector3};

fn block_stl() -> Vec<u8> {
    let p = |x: f32, y: f32, z: f32| Point3::new(x * 300.0, y * 100.0, z * 100.0);
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
    encode_stl(&IndexedMesh::from_parts(positions, faces))
}

#[test]
fn split_runs_release_every_kernel_handle() {
    let stl = block_stl();
    let baseline = live_solids();

    // A successful run with hole carving
    let mut params = SplitParams::new(Vector3::new(150.0, 200.0, 200.0));
    params.holes = HoleSpec {
        enabled: true,
        diameter_mm: 1.8,
        depth_mm: 3.0,
        spacing: HoleSpacing::Sparse,
    };
    let output = split_model(&stl, &params, &NullProgress).unwrap();
    assert_eq!(output.total_parts, 2);
    assert_eq!(live_solids(), baseline);

    // A failed run releases everything too
    let bad = b"solid t\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendfacet\n";
    assert!(split_model(bad, &params, &NullProgress).is_err());
    assert_eq!(live_solids(), baseline);
}
