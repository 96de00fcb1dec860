//! Axis-aligned bounding volumes.
//!
//! [`BoundingBox`] is the workhorse of octree construction and traversal:
//! nodes are regions, objects are placed by full containment of their box,
//! and queries prune subtrees by box/ray and box/sphere tests.
//! [`BoundingSphere`] drives nearest-point searches, where the radius may
//! shrink as better candidates are found.

use crate::geometry::ray::Ray;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// A 3D axis-aligned bounding box.
///
/// The empty box is inverted (`min > max` componentwise); merging anything
/// into it yields that thing's bound. Degenerate boxes with `min == max` are
/// valid and represent a single point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl BoundingBox {
    /// Create a bounding box from min and max corners.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) bounding box.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    /// Create a bounding box containing a single point.
    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Create a bounding box from a slice of points.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bound = Self::empty();
        for p in points {
            bound.extend_point(*p);
        }
        bound
    }

    /// Create a bounding box from three triangle vertices.
    #[inline]
    pub fn from_triangle(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self {
            min: v0.min(v1).min(v2),
            max: v0.max(v1).max(v2),
        }
    }

    /// Check if the box is empty (inverted).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the box along each axis.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get the extent of the longest axis.
    #[inline]
    pub fn largest_dimension(&self) -> f32 {
        self.size().max_element()
    }

    /// Extend the box to include a point.
    #[inline]
    pub fn extend_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Extend the box to include another box.
    #[inline]
    pub fn extend_box(&mut self, other: &Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Union of this box and another.
    #[inline]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Create a copy inflated by `eps` in every direction.
    #[inline]
    pub fn inflated(&self, eps: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(eps),
            max: self.max + Vec3::splat(eps),
        }
    }

    /// Check if the box contains a point (boundary inclusive).
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Check if `other` lies fully inside this box (boundary inclusive).
    #[inline]
    pub fn contains_box(&self, other: &Self) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
            && other.min.z >= self.min.z
            && other.max.z <= self.max.z
    }

    /// Check if this box overlaps another.
    #[inline]
    pub fn intersects_box(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Squared distance from a point to the box exterior, zero inside.
    pub fn squared_exterior_distance(&self, p: Vec3) -> f32 {
        let below = (self.min - p).max(Vec3::ZERO);
        let above = (p - self.max).max(Vec3::ZERO);
        below.length_squared() + above.length_squared()
    }

    /// Check if the box is not disjoint from a sphere.
    #[inline]
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.squared_exterior_distance(sphere.center) <= sphere.radius * sphere.radius
    }

    /// Check if a ray passes through the box (origin inside counts as a hit).
    #[inline]
    pub fn intersects_ray(&self, ray: &Ray) -> bool {
        crate::geometry::intersect::ray_box_intersect(ray, self)
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Map the box through a matrix, returning the enclosing axis-aligned
    /// box of the eight transformed corners.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let mut bound = Self::empty();
        for corner in self.corners() {
            bound.extend_point(matrix.transform_point3(corner));
        }
        bound
    }

    /// Expand the box to a cube around its center, sized by the longest axis.
    pub fn cubified(&self) -> Self {
        let center = self.center();
        let half = self.largest_dimension() * 0.5;
        Self {
            min: center - Vec3::splat(half),
            max: center + Vec3::splat(half),
        }
    }

    /// Bisect the box at its center into eight child regions.
    ///
    /// Slot bits select the upper half per axis: bit 0 = x, bit 1 = y,
    /// bit 2 = z.
    pub fn octant_split(&self) -> [Self; 8] {
        let c = self.center();
        let mut out = [Self::empty(); 8];
        for (slot, child) in out.iter_mut().enumerate() {
            let min = Vec3::new(
                if slot & 1 == 0 { self.min.x } else { c.x },
                if slot & 2 == 0 { self.min.y } else { c.y },
                if slot & 4 == 0 { self.min.z } else { c.z },
            );
            let max = Vec3::new(
                if slot & 1 == 0 { c.x } else { self.max.x },
                if slot & 2 == 0 { c.y } else { self.max.y },
                if slot & 4 == 0 { c.z } else { self.max.z },
            );
            *child = Self::new(min, max);
        }
        out
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// A bounding sphere: center plus radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// Sphere center.
    pub center: Vec3,
    /// Sphere radius.
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new bounding sphere.
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if the sphere contains a point (boundary inclusive).
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.distance_squared(self.center) <= self.radius * self.radius
    }
}
