//! Point-cloud octree with screen-space picking.
//!
//! Leaf objects are indices into the position buffer; each point's bound is
//! the point inflated by a small epsilon so containment-based placement
//! works on dimensionless primitives. Picking projects candidates through
//! the model-view-projection matrix and measures pixel distance to the
//! clicked pixel (the projection of the pick ray's origin); both the matrix
//! and the click point are computed once per query.

use crate::geometry::{BoundingBox, BoundingSphere};
use crate::octree::config::OctreeBuildParams;
use crate::octree::engine::{ObjectEntry, OctreeShape, StaticOctree};
use crate::octree::octant::Octant;
use crate::query::{closer, HitDetail, HitResult, NearestResult, PickContext, RayQuery};
use glam::Vec3;

/// Half-extent of the bound assigned to each point.
const POINT_BOUND_EPS: f32 = 1e-3;

/// Leaf shape over a raw point buffer.
#[derive(Debug, Clone, Copy)]
pub struct PointShape<'a> {
    positions: &'a [Vec3],
}

impl<'a> PointShape<'a> {
    /// Create a point shape. A bare position buffer has no index contract to
    /// violate, so construction is infallible.
    pub fn new(positions: &'a [Vec3]) -> Self {
        Self { positions }
    }

    /// Number of points.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.positions.len()
    }
}

impl OctreeShape for PointShape<'_> {
    type Key = u32;

    fn keys(&self) -> Vec<u32> {
        (0..self.positions.len() as u32).collect()
    }

    fn bound_of(&self, key: u32) -> BoundingBox {
        BoundingBox::from_point(self.positions[key as usize]).inflated(POINT_BOUND_EPS)
    }

    fn hit_test_node(
        &self,
        octant: &Octant,
        objects: &[ObjectEntry<u32>],
        query: &RayQuery<'_>,
        best: &mut Option<HitResult>,
    ) -> bool {
        // Point picking is a screen-space operation; no context, no hit.
        let Some(context) = query.context else {
            return false;
        };
        if !octant
            .bound
            .inflated(query.hit_thickness)
            .intersects_ray(&query.ray_ls)
        {
            return false;
        }
        let Some(click) = query.click_point() else {
            return false;
        };
        let Some(view_projection) = query.view_projection() else {
            return false;
        };

        for entry in objects {
            let world = query
                .model_matrix
                .transform_point3(self.positions[entry.key as usize]);
            let Some(screen) = context.project_with(&view_projection, world) else {
                continue;
            };
            if screen.distance(click) > query.hit_thickness {
                continue;
            }

            let distance = world.distance(query.ray_ws.origin);
            if best.as_ref().map_or(true, |found| closer(distance, found.distance)) {
                *best = Some(HitResult {
                    model: query.model,
                    geometry: query.geometry,
                    point: world,
                    normal: Vec3::ZERO,
                    distance,
                    detail: HitDetail::Point { index: entry.key },
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
            let point = self.positions[entry.key as usize];
            let distance = point.distance(sphere.center);
            if distance <= sphere.radius
                && best.as_ref().map_or(true, |found| closer(distance, found.distance))
            {
                *best = Some(NearestResult {
                    point,
                    distance,
                    detail: HitDetail::Point { index: entry.key },
                });
            }
        }
        true
    }
}

/// Octree over a raw point buffer.
pub type PointOctree<'a> = StaticOctree<PointShape<'a>>;

impl<'a> PointOctree<'a> {
    /// Create an unbuilt point octree.
    pub fn from_points(positions: &'a [Vec3], params: OctreeBuildParams) -> Self {
        StaticOctree::new(PointShape::new(positions), params)
    }
}
