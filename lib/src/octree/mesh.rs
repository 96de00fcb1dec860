//! Triangle-mesh octree.
//!
//! Leaf objects are triangle indices into a caller-provided index buffer.
//! Ray tests use Möller–Trumbore in local space; hit points, normals, and
//! distances are reported in world space. Sliver triangles get a precision
//! fix: when the shortest edge falls below a squared-length threshold the
//! test runs at a larger uniform scale and the distance is divided back out.

use crate::geometry::{
    closest_point_on_triangle, ray_triangle_intersect, BoundingBox, BoundingSphere,
};
use crate::octree::config::OctreeBuildParams;
use crate::octree::engine::{ObjectEntry, OctreeShape, StaticOctree};
use crate::octree::octant::Octant;
use crate::query::{closer, HitDetail, HitResult, NearestResult, PickContext, RayQuery};
use crate::{Error, Result};
use glam::Vec3;

/// Determinant epsilon for the ray/triangle test.
const RAY_TRIANGLE_EPS: f32 = 1e-6;
/// Squared edge length below which a triangle is treated as a sliver.
const SMALL_EDGE_SQ: f32 = 1e-8;
/// Uniform upscale applied to sliver triangles before intersection.
const SMALL_TRIANGLE_SCALE: f32 = 1.0e4;

/// Leaf shape over an indexed triangle list.
///
/// Borrows the caller's buffers; indices come in triples.
#[derive(Debug, Clone, Copy)]
pub struct MeshShape<'a> {
    positions: &'a [Vec3],
    indices: &'a [u32],
    small_edge_sq: f32,
    small_triangle_scale: f32,
}

impl<'a> MeshShape<'a> {
    /// Create a mesh shape, validating the buffer contract: the index count
    /// must be a multiple of three and every index must be in range.
    pub fn new(positions: &'a [Vec3], indices: &'a [u32]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(Error::MalformedIndices {
                len: indices.len(),
                arity: 3,
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(Error::IndexOutOfRange {
                index,
                count: positions.len(),
            });
        }
        Ok(Self {
            positions,
            indices,
            small_edge_sq: SMALL_EDGE_SQ,
            small_triangle_scale: SMALL_TRIANGLE_SCALE,
        })
    }

    /// Override the sliver-triangle precision parameters.
    pub fn with_precision(mut self, small_edge_sq: f32, scale: f32) -> Self {
        self.small_edge_sq = small_edge_sq;
        self.small_triangle_scale = scale;
        self
    }

    /// The borrowed position buffer.
    #[inline]
    pub fn positions(&self) -> &'a [Vec3] {
        self.positions
    }

    /// Number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle(&self, key: u32) -> ([u32; 3], [Vec3; 3]) {
        let base = key as usize * 3;
        let indices = [
            self.indices[base],
            self.indices[base + 1],
            self.indices[base + 2],
        ];
        let vertices = [
            self.positions[indices[0] as usize],
            self.positions[indices[1] as usize],
            self.positions[indices[2] as usize],
        ];
        (indices, vertices)
    }
}

impl OctreeShape for MeshShape<'_> {
    type Key = u32;

    fn keys(&self) -> Vec<u32> {
        (0..self.triangle_count() as u32).collect()
    }

    fn bound_of(&self, key: u32) -> BoundingBox {
        let (_, [v0, v1, v2]) = self.triangle(key);
        BoundingBox::from_triangle(v0, v1, v2)
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
            let (indices, [mut v0, mut v1, mut v2]) = self.triangle(entry.key);

            let mut ray = query.ray_ls;
            let mut scale = 1.0f32;
            let min_edge_sq = (v1 - v0)
                .length_squared()
                .min((v2 - v1).length_squared())
                .min((v0 - v2).length_squared());
            if min_edge_sq < self.small_edge_sq {
                // Sliver: intersect at a larger scale, correct the distance after.
                scale = self.small_triangle_scale;
                v0 *= scale;
                v1 *= scale;
                v2 *= scale;
                ray.origin *= scale;
            }

            let Some((t, _, _)) = ray_triangle_intersect(&ray, v0, v1, v2, RAY_TRIANGLE_EPS)
            else {
                continue;
            };
            let t = t / scale;

            let point = query.model_matrix.transform_point3(query.ray_ls.point_at(t));
            let distance = point.distance(query.ray_ws.origin);
            if best.as_ref().map_or(true, |found| closer(distance, found.distance)) {
                let normal_ls = (v1 - v0).cross(v2 - v0).normalize_or_zero();
                let normal = query
                    .model_matrix
                    .transform_vector3(normal_ls)
                    .normalize_or_zero();
                *best = Some(HitResult {
                    model: query.model,
                    geometry: query.geometry,
                    point,
                    normal,
                    distance,
                    detail: HitDetail::Triangle { indices },
                    instance: None,
                });
            }
        }
        true
    }

    fn nearest_in_node(
        &self,
        octant: &Octant,
        objects: &[ObjectEntry<u32>],
        _context: Option<&PickContext>,
        sphere: &BoundingSphere,
        best: &mut Option<NearestResult>,
    ) -> bool {
        if !octant.bound.intersects_sphere(sphere) {
            return false;
        }
        for entry in objects {
            let (indices, [v0, v1, v2]) = self.triangle(entry.key);
            let point = closest_point_on_triangle(sphere.center, v0, v1, v2);
            let distance = point.distance(sphere.center);
            if distance <= sphere.radius
                && best.as_ref().map_or(true, |found| closer(distance, found.distance))
            {
                *best = Some(NearestResult {
                    point,
                    distance,
                    detail: HitDetail::Triangle { indices },
                });
            }
        }
        true
    }
}

/// Octree over an indexed triangle list.
pub type MeshOctree<'a> = StaticOctree<MeshShape<'a>>;

impl<'a> MeshOctree<'a> {
    /// Create an unbuilt mesh octree from raw buffers.
    pub fn from_buffers(
        positions: &'a [Vec3],
        indices: &'a [u32],
        params: OctreeBuildParams,
    ) -> Result<Self> {
        Ok(StaticOctree::new(MeshShape::new(positions, indices)?, params))
    }
}
