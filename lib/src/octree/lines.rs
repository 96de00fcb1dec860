//! Line-segment octree with screen-space thickness picking.
//!
//! Leaf objects are segment indices into a caller-provided index buffer
//! (two indices per segment). Picking a 1D primitive with a 3D ray needs a
//! tolerance, and a tolerance in world units behaves badly across zoom
//! levels, so the closest-approach points are projected through the pick
//! context and the threshold is applied in pixels.

use crate::geometry::{closest_point_on_segment, ray_segment_closest, BoundingBox, BoundingSphere};
use crate::octree::config::OctreeBuildParams;
use crate::octree::engine::{ObjectEntry, OctreeShape, StaticOctree};
use crate::octree::octant::Octant;
use crate::query::{closer, HitDetail, HitResult, NearestResult, PickContext, RayQuery};
use crate::{Error, Result};
use glam::Vec3;

/// Leaf shape over an indexed segment list.
#[derive(Debug, Clone, Copy)]
pub struct LineShape<'a> {
    positions: &'a [Vec3],
    indices: &'a [u32],
}

impl<'a> LineShape<'a> {
    /// Create a line shape, validating the buffer contract: the index count
    /// must be a multiple of two and every index must be in range.
    pub fn new(positions: &'a [Vec3], indices: &'a [u32]) -> Result<Self> {
        if indices.len() % 2 != 0 {
            return Err(Error::MalformedIndices {
                len: indices.len(),
                arity: 2,
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(Error::IndexOutOfRange {
                index,
                count: positions.len(),
            });
        }
        Ok(Self { positions, indices })
    }

    /// Number of segments.
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.indices.len() / 2
    }

    fn segment(&self, key: u32) -> (Vec3, Vec3) {
        let base = key as usize * 2;
        (
            self.positions[self.indices[base] as usize],
            self.positions[self.indices[base + 1] as usize],
        )
    }
}

impl OctreeShape for LineShape<'_> {
    type Key = u32;

    fn keys(&self) -> Vec<u32> {
        (0..self.segment_count() as u32).collect()
    }

    fn bound_of(&self, key: u32) -> BoundingBox {
        let (a, b) = self.segment(key);
        BoundingBox::new(a.min(b), a.max(b))
    }

    fn hit_test_node(
        &self,
        octant: &Octant,
        objects: &[ObjectEntry<u32>],
        query: &RayQuery<'_>,
        best: &mut Option<HitResult>,
    ) -> bool {
        // Screen-space thickness needs the view state; without it there is
        // nothing to pick.
        let Some(context) = query.context else {
            return false;
        };
        // Inflate by the tolerance so rays grazing a flat node (collinear
        // segments have zero-thickness bounds) still descend into it.
        if !octant
            .bound
            .inflated(query.hit_thickness)
            .intersects_ray(&query.ray_ls)
        {
            return false;
        }
        let Some(view_projection) = query.view_projection() else {
            return false;
        };

        for entry in objects {
            let (a, b) = self.segment(entry.key);
            let a_ws = query.model_matrix.transform_point3(a);
            let b_ws = query.model_matrix.transform_point3(b);

            let approach = ray_segment_closest(&query.ray_ws, a_ws, b_ws);
            let (Some(on_ray), Some(on_segment)) = (
                context.project_with(&view_projection, approach.point_on_ray),
                context.project_with(&view_projection, approach.point_on_segment),
            ) else {
                continue;
            };
            if on_ray.distance(on_segment) > query.hit_thickness {
                continue;
            }

            let distance = approach.ray_t;
            if best.as_ref().map_or(true, |found| closer(distance, found.distance)) {
                let offset = approach.point_on_ray - approach.point_on_segment;
                let normal = if offset.length_squared() > f32::EPSILON {
                    offset.normalize()
                } else {
                    -query.ray_ws.direction
                };
                *best = Some(HitResult {
                    model: query.model,
                    geometry: query.geometry,
                    point: approach.point_on_segment,
                    normal,
                    distance,
                    detail: HitDetail::Segment { index: entry.key },
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
            let (a, b) = self.segment(entry.key);
            let point = closest_point_on_segment(sphere.center, a, b);
            let distance = point.distance(sphere.center);
            if distance <= sphere.radius
                && best.as_ref().map_or(true, |found| closer(distance, found.distance))
            {
                *best = Some(NearestResult {
                    point,
                    distance,
                    detail: HitDetail::Segment { index: entry.key },
                });
            }
        }
        true
    }
}

/// Octree over an indexed segment list.
pub type LineOctree<'a> = StaticOctree<LineShape<'a>>;

impl<'a> LineOctree<'a> {
    /// Create an unbuilt line octree from raw buffers.
    pub fn from_buffers(
        positions: &'a [Vec3],
        indices: &'a [u32],
        params: OctreeBuildParams,
    ) -> Result<Self> {
        Ok(StaticOctree::new(LineShape::new(positions, indices)?, params))
    }
}
