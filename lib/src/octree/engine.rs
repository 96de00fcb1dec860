//! Generic static octree engine.
//!
//! [`StaticOctree`] owns the octant arena and the shared objects array and
//! implements everything that is not geometry-specific: the lazy subdividing
//! build, the iterative traversal, the ray hit-test driver, and the
//! nearest-point search. A geometry variant plugs in through the
//! [`OctreeShape`] trait, which supplies object collection, per-object
//! bounds, and the two leaf-level tests.
//!
//! The tree is built once with [`StaticOctree::build_tree`] and is immutable
//! afterwards; queries take `&self` and may run concurrently against a built
//! tree.

use crate::geometry::{BoundingBox, BoundingSphere, Ray};
use crate::octree::config::OctreeBuildParams;
use crate::octree::octant::{Octant, OctantArray};
use crate::query::{
    closer, GeometryHandle, HitResult, ModelHandle, NearestResult, PickContext, RayQuery,
};
use glam::{Mat4, Vec3};
use log::debug;
use std::fmt;
use std::sync::Mutex;

/// One leaf object: an opaque key plus the bound that places it in the tree.
#[derive(Debug, Clone, Copy)]
pub struct ObjectEntry<K> {
    /// Geometry-specific key (triangle index, segment index, ...).
    pub key: K,
    /// Bound used for tree placement.
    pub bound: BoundingBox,
}

/// Extension points a geometry variant supplies to the engine.
///
/// A single-level strategy implementation per geometry kind is all that is
/// required; the engine never needs anything deeper than these five
/// operations.
pub trait OctreeShape {
    /// Key identifying one leaf object.
    type Key: Copy + fmt::Debug;

    /// Leaf object keys, in input order.
    fn keys(&self) -> Vec<Self::Key>;

    /// Bound used to place one object in the tree.
    fn bound_of(&self, key: Self::Key) -> BoundingBox;

    /// Bound enclosing every object. The default merges the entry bounds;
    /// variants with a cheaper source may override it.
    fn max_bound(&self, objects: &[ObjectEntry<Self::Key>]) -> BoundingBox {
        let mut bound = BoundingBox::empty();
        for entry in objects {
            bound.extend_box(&entry.bound);
        }
        bound
    }

    /// Ray-test the objects owned directly by `octant` (children excluded),
    /// refining `best` with any closer hit.
    ///
    /// Returns whether the octant's own bound was intersected; the engine
    /// descends into children only in that case, whether or not a leaf hit
    /// occurred; an overlapping child may still hold the true closest hit.
    fn hit_test_node(
        &self,
        octant: &Octant,
        objects: &[ObjectEntry<Self::Key>],
        query: &RayQuery<'_>,
        best: &mut Option<HitResult>,
    ) -> bool;

    /// Sphere-test the objects owned directly by `octant`, refining `best`
    /// with the closest point on any primitive inside the sphere.
    ///
    /// Returns whether the octant's bound overlaps the sphere.
    fn nearest_in_node(
        &self,
        octant: &Octant,
        objects: &[ObjectEntry<Self::Key>],
        context: Option<&PickContext>,
        sphere: &BoundingSphere,
        best: &mut Option<NearestResult>,
    ) -> bool;
}

/// Bounded pool of traversal stacks reused across queries, so steady-state
/// picking does not allocate.
#[derive(Debug, Default)]
struct StackPool {
    stacks: Mutex<Vec<Vec<usize>>>,
}

impl StackPool {
    const MAX_POOLED: usize = 10;

    fn acquire(&self) -> Vec<usize> {
        match self.stacks.lock() {
            Ok(mut pool) => pool.pop().unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn release(&self, mut stack: Vec<usize>) {
        stack.clear();
        if let Ok(mut pool) = self.stacks.lock() {
            if pool.len() < Self::MAX_POOLED {
                pool.push(stack);
            }
        }
    }
}

/// A static octree over the objects of one geometry shape.
///
/// Objects live in a single flat array, partitioned in place during build so
/// each octant owns one contiguous slice. An object belongs to the smallest
/// octant whose region fully contains its bound; objects straddling a split
/// plane stay with the parent.
#[derive(Debug)]
pub struct StaticOctree<S: OctreeShape> {
    shape: S,
    params: OctreeBuildParams,
    octants: OctantArray,
    objects: Vec<ObjectEntry<S::Key>>,
    built: bool,
    hit_path_bounds: Mutex<Vec<BoundingBox>>,
    stack_pool: StackPool,
}

impl<S: OctreeShape> StaticOctree<S> {
    /// Create an engine over `shape`. The tree is not built until
    /// [`build_tree`](Self::build_tree) is called.
    pub fn new(shape: S, params: OctreeBuildParams) -> Self {
        Self {
            shape,
            params,
            octants: OctantArray::new(),
            objects: Vec::new(),
            built: false,
            hit_path_bounds: Mutex::new(Vec::new()),
            stack_pool: StackPool::default(),
        }
    }

    /// The geometry shape this tree was created over.
    #[inline]
    pub fn shape(&self) -> &S {
        &self.shape
    }

    /// Build parameters in effect.
    #[inline]
    pub fn params(&self) -> &OctreeBuildParams {
        &self.params
    }

    /// Whether [`build_tree`](Self::build_tree) has completed.
    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of octants in the built tree.
    #[inline]
    pub fn octant_count(&self) -> usize {
        self.octants.len()
    }

    /// Number of leaf objects in the built tree.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Get an octant by index.
    #[inline]
    pub fn octant(&self, index: usize) -> Option<&Octant> {
        self.octants.get(index)
    }

    /// The root octant of a built tree.
    pub fn root(&self) -> Option<&Octant> {
        if self.built {
            self.octants.get(0)
        } else {
            None
        }
    }

    /// The objects owned directly by `octant` (children excluded).
    #[inline]
    pub fn objects_of(&self, octant: &Octant) -> &[ObjectEntry<S::Key>] {
        &self.objects[octant.start..octant.end]
    }

    /// Build the tree. Idempotent: calling it on a built tree is a no-op.
    ///
    /// Subdivision is iterative (explicit stack) and lazy: a child octant is
    /// materialized only when at least one object is fully contained in its
    /// region. Nodes stop splitting below `min_octant_size`, at or below
    /// `min_objects_to_split` objects, or when the octant array refuses to
    /// grow further.
    pub fn build_tree(&mut self) {
        if self.built {
            return;
        }
        self.objects = self
            .shape
            .keys()
            .into_iter()
            .map(|key| ObjectEntry {
                key,
                bound: self.shape.bound_of(key),
            })
            .collect();

        let mut bound = self.shape.max_bound(&self.objects);
        if bound.is_empty() {
            bound = BoundingBox::new(Vec3::ZERO, Vec3::ZERO);
        }
        if self.params.cubify {
            bound = bound.cubified();
        }

        self.octants = OctantArray::with_capacity(OctantArray::DEFAULT_CAPACITY);
        let root = self.octants.push_root(bound, self.objects.len());

        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            self.subdivide(index, &mut stack);
        }

        self.octants.compact();
        self.objects.shrink_to_fit();
        self.built = true;
        debug!(
            "octree built: {} octants over {} objects",
            self.octants.len(),
            self.objects.len()
        );
    }

    /// Attempt one subdivision step for the octant at `index`, pushing any
    /// newly created children onto the build stack.
    fn subdivide(&mut self, index: usize, stack: &mut Vec<usize>) {
        let (bound, start, end) = {
            let octant = &self.octants[index];
            if octant.is_built {
                return;
            }
            (octant.bound, octant.start, octant.end)
        };

        let count = end - start;
        if count <= self.params.min_objects_to_split
            || bound.largest_dimension() < self.params.min_octant_size
        {
            self.octants[index].is_built = true;
            return;
        }

        let child_bounds = bound.octant_split();
        let mut parent_end = end;
        for (slot, child_bound) in child_bounds.iter().enumerate() {
            // Scan the remaining range back to front, swapping objects fully
            // contained in this child region into a contiguous tail slice.
            let mut migrated = 0usize;
            let mut i = parent_end;
            while i > start {
                i -= 1;
                if child_bound.contains_box(&self.objects[i].bound) {
                    self.objects.swap(i, parent_end - 1 - migrated);
                    migrated += 1;
                }
            }
            if migrated == 0 {
                // Empty children are never materialized.
                continue;
            }
            match self.octants.add(index, slot, *child_bound) {
                Some(child_index) => {
                    let child = &mut self.octants[child_index];
                    child.start = parent_end - migrated;
                    child.end = parent_end;
                    parent_end -= migrated;
                    stack.push(child_index);
                }
                None => {
                    // Capacity exhausted: the swapped objects stay inside the
                    // parent's range and this branch remains unsplit.
                    break;
                }
            }
        }

        let octant = &mut self.octants[index];
        octant.end = parent_end;
        octant.is_built = true;
    }

    /// Depth-first pre-order walk over the built tree.
    ///
    /// `visit` returns whether to descend into the octant's children. This
    /// is the one traversal protocol shared by the hit-test and
    /// nearest-point drivers; only the visitor differs.
    pub fn walk<F: FnMut(&Octant) -> bool>(&self, mut visit: F) {
        if !self.built || self.octants.is_empty() {
            return;
        }
        let mut stack = self.stack_pool.acquire();
        stack.push(0);
        while let Some(index) = stack.pop() {
            let octant = &self.octants[index];
            if visit(octant) {
                // Enumerate populated slots through the occupancy mask, high
                // slot first so low slots pop first.
                let mut mask = octant.child_mask();
                while mask != 0 {
                    let slot = (7 - mask.leading_zeros()) as usize;
                    mask &= !(1u8 << slot);
                    if let Some(child) = octant.child(slot) {
                        stack.push(child);
                    }
                }
            }
        }
        self.stack_pool.release(stack);
    }

    /// Ray hit-test against the built tree.
    ///
    /// The world ray is transformed into the geometry's local space once
    /// through the inverse of `model_matrix`; a non-invertible matrix is a
    /// recoverable "no hit", not an error. `hits` keeps at most one best
    /// result at slot 0 across calls: a closer hit from this call replaces
    /// an existing entry, a farther one leaves it alone. The return value
    /// reports whether *this* call hit anything.
    #[allow(clippy::too_many_arguments)]
    pub fn hit_test(
        &self,
        context: Option<&PickContext>,
        model: ModelHandle,
        geometry: GeometryHandle,
        model_matrix: Mat4,
        ray: &Ray,
        hit_thickness: f32,
        hits: &mut Vec<HitResult>,
    ) -> bool {
        if !self.built || self.objects.is_empty() {
            return false;
        }
        let det = model_matrix.determinant();
        if !det.is_finite() || det.abs() <= f32::EPSILON {
            return false;
        }
        let ray_ls = ray.transformed(&model_matrix.inverse());
        let query = RayQuery::new(context, model, geometry, model_matrix, *ray, ray_ls, hit_thickness);

        let record = self.params.record_hit_path_bounds;
        let mut path = Vec::new();
        let mut best: Option<HitResult> = None;
        self.walk(|octant| {
            let is_intersect =
                self.shape
                    .hit_test_node(octant, self.objects_of(octant), &query, &mut best);
            if is_intersect && record {
                path.push(octant.bound);
            }
            is_intersect
        });
        if record {
            if let Ok(mut bounds) = self.hit_path_bounds.lock() {
                *bounds = path;
            }
        }

        match best {
            Some(hit) => {
                match hits.first_mut() {
                    Some(first) => {
                        if closer(hit.distance, first.distance) {
                            *first = hit;
                        }
                    }
                    None => hits.push(hit),
                }
                true
            }
            None => false,
        }
    }

    /// Find the closest primitive point inside `sphere`.
    ///
    /// `results` follows the same slot-0 convention as
    /// [`hit_test`](Self::hit_test); the return value reports whether this
    /// call found anything. The search runs in the geometry's local space.
    pub fn find_nearest_point_by_sphere(
        &self,
        context: Option<&PickContext>,
        sphere: &BoundingSphere,
        results: &mut Vec<NearestResult>,
    ) -> bool {
        match self.nearest_core(context, *sphere, None) {
            Some(found) => {
                match results.first_mut() {
                    Some(first) => {
                        if closer(found.distance, first.distance) {
                            *first = found;
                        }
                    }
                    None => results.push(found),
                }
                true
            }
            None => false,
        }
    }

    /// Find the closest primitive point to `point`.
    ///
    /// Seeds a sphere of effectively infinite radius, then shrinks the
    /// search radius to `best_distance * heuristic_search_factor` (clamped
    /// to `[0.1, 1.0]`) whenever a candidate improves, giving adaptive best-first
    /// pruning without a priority queue. Factors below 1.0 trade exactness
    /// for speed.
    pub fn find_nearest_point_from_point(
        &self,
        context: Option<&PickContext>,
        point: Vec3,
        heuristic_search_factor: f32,
    ) -> Option<NearestResult> {
        let factor = heuristic_search_factor.clamp(0.1, 1.0);
        self.nearest_core(context, BoundingSphere::new(point, f32::MAX), Some(factor))
    }

    fn nearest_core(
        &self,
        context: Option<&PickContext>,
        mut sphere: BoundingSphere,
        shrink_factor: Option<f32>,
    ) -> Option<NearestResult> {
        if !self.built || self.objects.is_empty() {
            return None;
        }
        let mut best: Option<NearestResult> = None;
        self.walk(|octant| {
            let is_intersect = self.shape.nearest_in_node(
                octant,
                self.objects_of(octant),
                context,
                &sphere,
                &mut best,
            );
            if let (Some(factor), Some(found)) = (shrink_factor, best.as_ref()) {
                let radius = found.distance * factor;
                if radius < sphere.radius {
                    sphere.radius = radius;
                }
            }
            is_intersect
        });
        best
    }

    /// Bounds of the octants the most recent recorded hit test descended
    /// through. Empty unless `record_hit_path_bounds` is set.
    pub fn hit_path_bounds(&self) -> Vec<BoundingBox> {
        match self.hit_path_bounds.lock() {
            Ok(bounds) => bounds.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Check the structural invariants of a built tree; used by tests.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let mut owned = 0usize;
        self.walk(|octant| {
            owned += octant.count();
            for entry in self.objects_of(octant) {
                assert!(
                    octant.bound.contains_box(&entry.bound),
                    "object {:?} escapes octant {}",
                    entry.key,
                    octant.index
                );
            }
            if octant.parent >= 0 {
                let parent = &self.octants[octant.parent as usize];
                assert!(
                    parent.bound.contains_box(&octant.bound),
                    "octant {} escapes its parent",
                    octant.index
                );
            }
            true
        });
        assert_eq!(owned, self.objects.len(), "objects lost or duplicated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::points::PointShape;

    fn grid_points(n: usize, spacing: f32) -> Vec<Vec3> {
        let mut points = Vec::new();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    points.push(Vec3::new(
                        x as f32 * spacing,
                        y as f32 * spacing,
                        z as f32 * spacing,
                    ));
                }
            }
        }
        points
    }

    #[test]
    fn test_build_partitions_all_objects() {
        let points = grid_points(4, 1.0);
        let mut octree = StaticOctree::new(PointShape::new(&points), OctreeBuildParams::default());
        octree.build_tree();

        assert!(octree.is_built());
        assert!(octree.octant_count() > 1);
        assert_eq!(octree.object_count(), points.len());
        octree.assert_invariants();
    }

    #[test]
    fn test_build_is_idempotent() {
        let points = grid_points(3, 1.0);
        let mut octree = StaticOctree::new(PointShape::new(&points), OctreeBuildParams::default());
        octree.build_tree();
        let octants = octree.octant_count();
        octree.build_tree();
        assert_eq!(octree.octant_count(), octants);
    }

    #[test]
    fn test_build_over_nothing() {
        let points: Vec<Vec3> = Vec::new();
        let mut octree = StaticOctree::new(PointShape::new(&points), OctreeBuildParams::default());
        octree.build_tree();

        assert!(octree.is_built());
        assert_eq!(octree.octant_count(), 1);
        assert!(octree
            .find_nearest_point_from_point(None, Vec3::ZERO, 1.0)
            .is_none());
        let mut hits = Vec::new();
        let hit = octree.hit_test(
            None,
            ModelHandle::default(),
            GeometryHandle::default(),
            Mat4::IDENTITY,
            &Ray::new(Vec3::new(0.5, 0.5, 5.0), Vec3::new(0.0, 0.0, -1.0)),
            0.0,
            &mut hits,
        );
        assert!(!hit);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_min_objects_to_split_keeps_leaf() {
        let points = grid_points(4, 1.0);
        let params = OctreeBuildParams {
            min_objects_to_split: points.len(),
            ..OctreeBuildParams::default()
        };
        let mut octree = StaticOctree::new(PointShape::new(&points), params);
        octree.build_tree();
        assert_eq!(octree.octant_count(), 1);
        assert_eq!(octree.root().unwrap().count(), points.len());
    }

    #[test]
    fn test_min_octant_size_limits_depth() {
        let points = grid_points(4, 0.001);
        let params = OctreeBuildParams {
            min_octant_size: 1.0,
            ..OctreeBuildParams::default()
        };
        let mut octree = StaticOctree::new(PointShape::new(&points), params);
        octree.build_tree();
        // Root extent is well under the minimum, so nothing splits.
        assert_eq!(octree.octant_count(), 1);
    }

    #[test]
    fn test_cubify_root() {
        let mut points = grid_points(2, 1.0);
        points.push(Vec3::new(9.0, 0.0, 0.0));
        let params = OctreeBuildParams {
            cubify: true,
            ..OctreeBuildParams::default()
        };
        let mut octree = StaticOctree::new(PointShape::new(&points), params);
        octree.build_tree();
        let size = octree.root().unwrap().bound.size();
        assert!((size.x - size.y).abs() < 1e-5);
        assert!((size.y - size.z).abs() < 1e-5);
        octree.assert_invariants();
    }

    #[test]
    fn test_walk_visits_every_octant_once() {
        let points = grid_points(4, 1.0);
        let mut octree = StaticOctree::new(PointShape::new(&points), OctreeBuildParams::default());
        octree.build_tree();

        let mut seen = vec![0usize; octree.octant_count()];
        octree.walk(|octant| {
            seen[octant.index as usize] += 1;
            true
        });
        assert!(seen.iter().all(|&n| n == 1));
    }
}
