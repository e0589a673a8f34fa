//! Live-handle accounting across kernel operations.
//!
//! A single test in its own binary, so the process-wide handle counter is
//! not perturbed by unrelated tests on other threads.

use split_csg::{live_solids, Solid};
use split_types::Vector3;

#[test]
fn operations_release_every_handle() {
    let baseline = live_solids();

    {
        let block = Solid::cube(Vector3::new(20.0, 20.0, 20.0));
        let drill = Solid::cylinder(30.0, 1.0, 1.0, 32)
            .rotate(Vector3::new(0.0, 90.0, 0.0))
            .translate(Vector3::new(10.0, 10.0, 10.0));
        assert_eq!(live_solids(), baseline + 2);

        let pocketed = block.subtract(&drill);
        assert_eq!(live_solids(), baseline + 3);

        let cell = Solid::cube(Vector3::new(10.0, 20.0, 20.0));
        let part = pocketed.intersect(&cell);
        assert!(part.is_ok());
        assert_eq!(live_solids(), baseline + 5);

        // Mesh export is plain data, not a handle
        let mesh = part.to_mesh();
        assert!(!mesh.is_empty());
        assert_eq!(live_solids(), baseline + 5);
    }
    assert_eq!(live_solids(), baseline);

    // Poisoned handles are counted and released the same way
    {
        let bad = Solid::cube(Vector3::new(-1.0, 1.0, 1.0));
        let good = Solid::cube(Vector3::new(1.0, 1.0, 1.0));
        let result = good.subtract(&bad);
        assert!(!result.is_ok());
        assert_eq!(live_solids(), baseline + 3);
    }
    assert_eq!(live_solids(), baseline);
}
