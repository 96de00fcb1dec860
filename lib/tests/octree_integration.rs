//! Octree integration tests.
//!
//! These drive the public API end to end: structural invariants of built
//! trees, nearest-point equivalence with a brute-force scan, octant-array
//! growth, and determinism of repeated queries.

use glam::{Mat4, Vec3};
use raypick::{
    GeometryHandle, HitResult, LineOctree, MeshOctree, ModelHandle, OctreeBuildParams,
    OctreeShape, PointOctree, Ray, StaticOctree,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic pseudo-random value in [0, 1) from a seed.
fn hash01(seed: f32) -> f32 {
    let r = (seed.sin() * 43758.5453).abs();
    r - r.floor()
}

/// Deterministic pseudo-random point in the [-10, 10] cube.
fn random_point(i: u32) -> Vec3 {
    let f = i as f32;
    Vec3::new(
        hash01(f * 12.9898 + 78.233) * 20.0 - 10.0,
        hash01(f * 39.346 + 11.135) * 20.0 - 10.0,
        hash01(f * 7.21 + 3.17) * 20.0 - 10.0,
    )
}

/// A flat n-by-n quad grid on the z=0 plane, normals facing +z.
fn make_grid_mesh(n: u32) -> (Vec<Vec3>, Vec<u32>) {
    let mut positions = Vec::new();
    for y in 0..=n {
        for x in 0..=n {
            positions.push(Vec3::new(x as f32, y as f32, 0.0));
        }
    }
    let stride = n + 1;
    let mut indices = Vec::new();
    for y in 0..n {
        for x in 0..n {
            let i0 = y * stride + x;
            let i1 = i0 + 1;
            let i2 = i0 + stride;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i1, i3, i0, i3, i2]);
        }
    }
    (positions, indices)
}

/// Structural invariants every built tree must satisfy: each object's bound
/// is contained in its octant, each octant in its parent, and every object
/// is owned by exactly one octant.
fn assert_tree_invariants<S: OctreeShape>(octree: &StaticOctree<S>) {
    let mut owned = 0usize;
    octree.walk(|octant| {
        owned += octant.count();
        for entry in octree.objects_of(octant) {
            assert!(
                octant.bound.contains_box(&entry.bound),
                "object escapes its octant"
            );
        }
        if octant.parent >= 0 {
            let parent = octree.octant(octant.parent as usize).unwrap();
            assert!(
                parent.bound.contains_box(&octant.bound),
                "octant escapes its parent"
            );
        }
        true
    });
    assert_eq!(owned, octree.object_count(), "objects lost or duplicated");
}

fn hit_down(octree: &MeshOctree<'_>, origin: Vec3) -> Option<HitResult> {
    let mut hits = Vec::new();
    let hit = octree.hit_test(
        None,
        ModelHandle::default(),
        GeometryHandle::default(),
        Mat4::IDENTITY,
        &Ray::new(origin, Vec3::new(0.0, 0.0, -1.0)),
        0.0,
        &mut hits,
    );
    hit.then(|| hits[0])
}

#[test]
fn nearest_point_matches_brute_force() {
    init_logging();
    let points: Vec<Vec3> = (0..500).map(random_point).collect();
    let mut octree = PointOctree::from_points(&points, OctreeBuildParams::default());
    octree.build_tree();
    assert_tree_invariants(&octree);

    for i in 0..1000 {
        let query = random_point(10_000 + i) * 1.3;
        let expected = points
            .iter()
            .map(|p| p.distance(query))
            .fold(f32::MAX, f32::min);
        let found = octree
            .find_nearest_point_from_point(None, query, 1.0)
            .expect("a non-empty cloud always has a nearest point");
        assert!(
            (found.distance - expected).abs() < 1e-5,
            "query {i}: octree found {} but brute force found {expected}",
            found.distance
        );
    }
}

#[test]
fn octant_array_growth_preserves_indices() {
    init_logging();
    // A 16x16x16 grid split down to single-object leaves forces the octant
    // array through several capacity doublings.
    let mut points = Vec::new();
    for x in 0..16 {
        for y in 0..16 {
            for z in 0..16 {
                points.push(Vec3::new(x as f32, y as f32, z as f32));
            }
        }
    }
    let params = OctreeBuildParams {
        min_objects_to_split: 1,
        ..OctreeBuildParams::default()
    };
    let mut octree = PointOctree::from_points(&points, params);
    octree.build_tree();

    // At least three doublings past the initial capacity of 16.
    assert!(
        octree.octant_count() > 128,
        "expected deep subdivision, got {} octants",
        octree.octant_count()
    );
    assert_tree_invariants(&octree);

    // Parent/child links still resolve after growth and compaction.
    let nearest = octree
        .find_nearest_point_from_point(None, Vec3::new(7.2, 7.9, 8.1), 1.0)
        .unwrap();
    assert_eq!(nearest.point, Vec3::new(7.0, 8.0, 8.0));
}

#[test]
fn mesh_grid_picks_the_right_cell() {
    init_logging();
    let (positions, indices) = make_grid_mesh(32);
    let mut octree =
        MeshOctree::from_buffers(&positions, &indices, OctreeBuildParams::default()).unwrap();
    octree.build_tree();
    assert_tree_invariants(&octree);
    assert_eq!(octree.object_count(), 32 * 32 * 2);

    let hit = hit_down(&octree, Vec3::new(13.4, 21.6, 5.0)).unwrap();
    assert!((hit.point - Vec3::new(13.4, 21.6, 0.0)).length() < 1e-4);
    assert!((hit.distance - 5.0).abs() < 1e-4);
    assert!((hit.normal - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);

    // Off the grid entirely.
    assert!(hit_down(&octree, Vec3::new(-3.0, 5.0, 5.0)).is_none());
}

#[test]
fn repeated_hit_tests_are_identical() {
    init_logging();
    let (positions, indices) = make_grid_mesh(16);
    let mut octree =
        MeshOctree::from_buffers(&positions, &indices, OctreeBuildParams::default()).unwrap();
    octree.build_tree();

    for i in 0..50 {
        let origin = Vec3::new(
            hash01(i as f32 * 3.7) * 16.0,
            hash01(i as f32 * 9.1) * 16.0,
            4.0,
        );
        let a = hit_down(&octree, origin);
        let b = hit_down(&octree, origin);
        assert_eq!(a, b, "query {i} was not deterministic");
    }
}

#[test]
fn zero_object_trees_answer_quietly() {
    init_logging();
    let positions: Vec<Vec3> = Vec::new();
    let indices: Vec<u32> = Vec::new();

    let mut mesh =
        MeshOctree::from_buffers(&positions, &indices, OctreeBuildParams::default()).unwrap();
    mesh.build_tree();
    assert!(hit_down(&mesh, Vec3::new(0.5, 0.5, 5.0)).is_none());
    assert!(mesh
        .find_nearest_point_from_point(None, Vec3::ZERO, 1.0)
        .is_none());

    let mut lines =
        LineOctree::from_buffers(&positions, &indices, OctreeBuildParams::default()).unwrap();
    lines.build_tree();
    assert!(lines
        .find_nearest_point_from_point(None, Vec3::ZERO, 1.0)
        .is_none());

    let mut cloud = PointOctree::from_points(&positions, OctreeBuildParams::default());
    cloud.build_tree();
    assert!(cloud
        .find_nearest_point_from_point(None, Vec3::ZERO, 1.0)
        .is_none());
}

#[test]
fn heuristic_factor_still_finds_a_candidate() {
    init_logging();
    let points: Vec<Vec3> = (0..200).map(random_point).collect();
    let mut octree = PointOctree::from_points(&points, OctreeBuildParams::default());
    octree.build_tree();

    // An aggressive factor may prune ties but must still return something
    // no farther than what an exact search finds by more than the pruning
    // allows; a factor of 1.0 is exact.
    let query = Vec3::new(0.5, -0.25, 0.75);
    let exact = octree
        .find_nearest_point_from_point(None, query, 1.0)
        .unwrap();
    let pruned = octree
        .find_nearest_point_from_point(None, query, 0.1)
        .unwrap();
    assert!(pruned.distance >= exact.distance - 1e-6);
}
