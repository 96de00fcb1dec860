//! Query inputs and outputs for octree picking.
//!
//! The octree core does not know about cameras, scene graphs, or devices.
//! Everything it needs from the host viewer crosses this boundary: a
//! [`PickContext`] with the view/projection state for screen-space tests,
//! opaque [`ModelHandle`]/[`GeometryHandle`] values echoed back in results,
//! and the [`HitResult`]/[`NearestResult`] records it produces.

use crate::geometry::Ray;
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::cmp::Ordering;

/// Opaque handle identifying the caller's model; never interpreted, only
/// echoed back in hit results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModelHandle(pub u64);

/// Opaque handle identifying the caller's geometry; never interpreted, only
/// echoed back in hit results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GeometryHandle(pub u64);

/// View/projection state needed for resolution-aware picking.
///
/// Line and point octrees measure pick tolerances in pixels, so they need
/// the camera matrices and the viewport size in pixels. Mesh picking works
/// purely in 3D and ignores the context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickContext {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub projection: Mat4,
    /// Viewport size in pixels.
    pub viewport: Vec2,
}

impl PickContext {
    /// Create a new pick context.
    pub fn new(view: Mat4, projection: Mat4, viewport: Vec2) -> Self {
        Self {
            view,
            projection,
            viewport,
        }
    }

    /// Combined view-projection matrix.
    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Project a world-space point to pixel coordinates.
    ///
    /// Returns `None` for points at or behind the eye plane.
    pub fn project_to_screen(&self, world: Vec3) -> Option<Vec2> {
        self.project_with(&self.view_projection(), world)
    }

    /// Project through a precomputed view-projection matrix; lets callers
    /// reuse the matrix across a sweep of points.
    pub fn project_with(&self, view_projection: &Mat4, world: Vec3) -> Option<Vec2> {
        let clip = *view_projection * world.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }
}

/// Geometry-specific payload of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitDetail {
    /// Mesh hit: the triangle's three vertex indices.
    Triangle {
        /// Vertex indices into the position buffer.
        indices: [u32; 3],
    },
    /// Line hit: index of the segment.
    Segment {
        /// Segment index (pair offset into the index buffer).
        index: u32,
    },
    /// Point hit: index of the point.
    Point {
        /// Index into the position buffer.
        index: u32,
    },
}

/// One pick result.
///
/// A result's presence implies validity; queries that find nothing leave the
/// output untouched and return `false`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    /// Handle of the model that was hit, as passed by the caller.
    pub model: ModelHandle,
    /// Handle of the geometry that was hit, as passed by the caller.
    pub geometry: GeometryHandle,
    /// World-space hit position.
    pub point: Vec3,
    /// World-space surface normal; zero for point hits.
    pub normal: Vec3,
    /// Distance from the world ray origin to the hit.
    pub distance: f32,
    /// Geometry-specific payload.
    pub detail: HitDetail,
    /// Instance key when the hit came through an instance octree.
    pub instance: Option<u32>,
}

/// Result of a nearest-point search, in the octree's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestResult {
    /// Closest point on the geometry.
    pub point: Vec3,
    /// Distance from the query point (sphere center).
    pub distance: f32,
    /// Which primitive the point lies on.
    pub detail: HitDetail,
}

/// Per-call ray query state handed to the leaf tests.
///
/// The view-projection matrix and the projected click point are computed at
/// most once per query, however many octants the sweep touches.
#[derive(Debug)]
pub struct RayQuery<'a> {
    /// Optional view state; required by line and point picking.
    pub context: Option<&'a PickContext>,
    /// Caller's model handle, echoed into results.
    pub model: ModelHandle,
    /// Caller's geometry handle, echoed into results.
    pub geometry: GeometryHandle,
    /// Model-to-world matrix.
    pub model_matrix: Mat4,
    /// Query ray in world space.
    pub ray_ws: Ray,
    /// Query ray in the geometry's local space.
    pub ray_ls: Ray,
    /// Pick tolerance in pixels for line and point variants.
    pub hit_thickness: f32,
    view_projection: OnceCell<Mat4>,
    click_point: OnceCell<Option<Vec2>>,
}

impl<'a> RayQuery<'a> {
    pub(crate) fn new(
        context: Option<&'a PickContext>,
        model: ModelHandle,
        geometry: GeometryHandle,
        model_matrix: Mat4,
        ray_ws: Ray,
        ray_ls: Ray,
        hit_thickness: f32,
    ) -> Self {
        Self {
            context,
            model,
            geometry,
            model_matrix,
            ray_ws,
            ray_ls,
            hit_thickness,
            view_projection: OnceCell::new(),
            click_point: OnceCell::new(),
        }
    }

    /// The context's view-projection matrix, computed once per query.
    pub fn view_projection(&self) -> Option<Mat4> {
        let context = self.context?;
        Some(*self.view_projection.get_or_init(|| context.view_projection()))
    }

    /// Screen position of the pick ray's origin (the clicked pixel),
    /// computed once per query.
    pub fn click_point(&self) -> Option<Vec2> {
        let context = self.context?;
        *self.click_point.get_or_init(|| {
            let view_projection = self.view_projection()?;
            context.project_with(&view_projection, self.ray_ws.origin)
        })
    }
}

/// NaN-safe "is `a` a better (smaller) distance than `b`": a real distance
/// always beats NaN, and NaN never beats anything.
pub(crate) fn closer(a: f32, b: f32) -> bool {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => true,
        Some(_) => false,
        None => b.is_nan() && !a.is_nan(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ortho_context() -> PickContext {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.1, 100.0);
        PickContext::new(view, projection, Vec2::new(100.0, 100.0))
    }

    #[test]
    fn test_project_to_screen() {
        let context = make_ortho_context();

        let center = context.project_to_screen(Vec3::ZERO).unwrap();
        assert!((center - Vec2::new(50.0, 50.0)).length() < 1e-3);

        // +x maps right, +y maps up (screen y grows downward).
        let right_up = context.project_to_screen(Vec3::new(5.0, 5.0, 0.0)).unwrap();
        assert!((right_up - Vec2::new(75.0, 25.0)).length() < 1e-3);
    }

    #[test]
    fn test_project_behind_eye() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let context = PickContext::new(view, projection, Vec2::new(100.0, 100.0));

        assert!(context.project_to_screen(Vec3::ZERO).is_some());
        assert!(context.project_to_screen(Vec3::new(0.0, 0.0, 30.0)).is_none());
    }

    #[test]
    fn test_ray_query_caches_click_point() {
        let context = make_ortho_context();
        let ray = Ray::new(Vec3::new(2.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -1.0));
        let query = RayQuery::new(
            Some(&context),
            ModelHandle::default(),
            GeometryHandle::default(),
            Mat4::IDENTITY,
            ray,
            ray,
            1.0,
        );

        let first = query.click_point().unwrap();
        let second = query.click_point().unwrap();
        assert_eq!(first, second);
        assert!((first - Vec2::new(60.0, 50.0)).length() < 1e-3);
    }

    #[test]
    fn test_closer_is_nan_safe() {
        assert!(closer(1.0, 2.0));
        assert!(!closer(2.0, 1.0));
        assert!(!closer(1.0, 1.0));
        assert!(closer(1.0, f32::NAN));
        assert!(!closer(f32::NAN, 1.0));
        assert!(!closer(f32::NAN, f32::NAN));
    }
}
