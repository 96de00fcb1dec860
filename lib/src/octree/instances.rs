//! Instanced-geometry octree.
//!
//! Leaf objects are indices into a caller-provided array of per-instance
//! (or per-sub-geometry) transforms. The tree is built over the underlying
//! geometry's bound mapped through each instance matrix; hit testing defers
//! to the underlying mesh octree with the composed transform and stamps the
//! instance index on the result.

use crate::geometry::{BoundingBox, BoundingSphere};
use crate::octree::config::OctreeBuildParams;
use crate::octree::engine::{ObjectEntry, OctreeShape, StaticOctree};
use crate::octree::mesh::MeshOctree;
use crate::octree::octant::Octant;
use crate::query::{closer, HitResult, NearestResult, PickContext, RayQuery};
use glam::Mat4;

/// Leaf shape over an array of instance transforms, sharing one mesh octree.
#[derive(Debug, Clone, Copy)]
pub struct InstanceShape<'a, 'b> {
    mesh: &'a MeshOctree<'b>,
    transforms: &'a [Mat4],
    geometry_bound: BoundingBox,
}

impl<'a, 'b> InstanceShape<'a, 'b> {
    /// Create an instance shape over `transforms`, each placing a copy of
    /// the geometry indexed by `mesh`. The mesh octree must be built before
    /// hit tests are issued.
    pub fn new(mesh: &'a MeshOctree<'b>, transforms: &'a [Mat4]) -> Self {
        let geometry_bound = BoundingBox::from_points(mesh.shape().positions());
        Self {
            mesh,
            transforms,
            geometry_bound,
        }
    }

    /// Number of instances.
    #[inline]
    pub fn instance_count(&self) -> usize {
        self.transforms.len()
    }

    /// Bound of the underlying geometry in its own local space.
    #[inline]
    pub fn geometry_bound(&self) -> BoundingBox {
        self.geometry_bound
    }
}

impl OctreeShape for InstanceShape<'_, '_> {
    type Key = u32;

    fn keys(&self) -> Vec<u32> {
        (0..self.transforms.len() as u32).collect()
    }

    fn bound_of(&self, key: u32) -> BoundingBox {
        self.geometry_bound
            .transformed(&self.transforms[key as usize])
    }

    fn hit_test_node(
        &self,
        octant: &Octant,
        objects: &[ObjectEntry<u32>],
        query: &RayQuery<'_>,
        best: &mut Option<HitResult>,
    ) -> bool {
        if !octant.bound.intersects_ray(&query.ray_ls) {
            return false;
        }
        for entry in objects {
            if !entry.bound.intersects_ray(&query.ray_ls) {
                continue;
            }
            let composed = query.model_matrix * self.transforms[entry.key as usize];
            let mut inner_hits = Vec::new();
            if !self.mesh.hit_test(
                query.context,
                query.model,
                query.geometry,
                composed,
                &query.ray_ws,
                query.hit_thickness,
                &mut inner_hits,
            ) {
                continue;
            }
            let Some(mut inner) = inner_hits.first().copied() else {
                continue;
            };
            inner.instance = Some(entry.key);
            if best
                .as_ref()
                .map_or(true, |found| closer(inner.distance, found.distance))
            {
                *best = Some(inner);
            }
        }
        true
    }

    /// Nearest-point search is not supported through instances; the search
    /// space would need the inverse of every instance transform. Reports
    /// "nothing found".
    fn nearest_in_node(
        &self,
        _octant: &Octant,
        _objects: &[ObjectEntry<u32>],
        _context: Option<&PickContext>,
        _sphere: &BoundingSphere,
        _best: &mut Option<NearestResult>,
    ) -> bool {
        false
    }
}

/// Octree over instanced copies of one mesh.
pub type InstanceOctree<'a, 'b> = StaticOctree<InstanceShape<'a, 'b>>;

impl<'a, 'b> InstanceOctree<'a, 'b> {
    /// Create an unbuilt instance octree.
    pub fn from_instances(
        mesh: &'a MeshOctree<'b>,
        transforms: &'a [Mat4],
        params: OctreeBuildParams,
    ) -> Self {
        StaticOctree::new(InstanceShape::new(mesh, transforms), params)
    }
}
