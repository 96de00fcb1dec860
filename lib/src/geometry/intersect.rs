//! Ray/primitive intersection and closest-point routines.
//!
//! These are the leaf-level tests the octree variants run once traversal has
//! narrowed a query down to a handful of primitives.

use crate::geometry::bounds::BoundingBox;
use crate::geometry::ray::Ray;
use glam::Vec3;

/// Ray/box intersection using the slab method.
///
/// A ray starting inside the box counts as intersecting.
pub fn ray_box_intersect(ray: &Ray, bound: &BoundingBox) -> bool {
    let inv = ray.direction.recip();

    let (mut tmin, mut tmax) = if inv.x >= 0.0 {
        (
            (bound.min.x - ray.origin.x) * inv.x,
            (bound.max.x - ray.origin.x) * inv.x,
        )
    } else {
        (
            (bound.max.x - ray.origin.x) * inv.x,
            (bound.min.x - ray.origin.x) * inv.x,
        )
    };

    let (tymin, tymax) = if inv.y >= 0.0 {
        (
            (bound.min.y - ray.origin.y) * inv.y,
            (bound.max.y - ray.origin.y) * inv.y,
        )
    } else {
        (
            (bound.max.y - ray.origin.y) * inv.y,
            (bound.min.y - ray.origin.y) * inv.y,
        )
    };

    if tmin > tymax || tymin > tmax {
        return false;
    }
    tmin = tmin.max(tymin);
    tmax = tmax.min(tymax);

    let (tzmin, tzmax) = if inv.z >= 0.0 {
        (
            (bound.min.z - ray.origin.z) * inv.z,
            (bound.max.z - ray.origin.z) * inv.z,
        )
    } else {
        (
            (bound.max.z - ray.origin.z) * inv.z,
            (bound.min.z - ray.origin.z) * inv.z,
        )
    };

    if tmin > tzmax || tzmin > tmax {
        return false;
    }
    tmax = tmax.min(tzmax);

    tmax > 0.0
}

/// Möller–Trumbore ray/triangle intersection.
///
/// Returns `(t, u, v)`: the distance along the ray and the barycentric
/// coordinates of the hit. Rays parallel to the triangle plane, or hits
/// behind the origin, return `None`.
pub fn ray_triangle_intersect(
    ray: &Ray,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    eps: f32,
) -> Option<(f32, f32, f32)> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < eps {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.origin - v0;

    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    (t > eps).then_some((t, u, v))
}

/// Closest point on a triangle to a point.
///
/// Voronoi-region walk from "Real-Time Collision Detection" (Ericson).
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Closest point on a segment `[a, b]` to a point.
pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest approach between a ray and a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegmentApproach {
    /// Parameter along the ray (world distance, direction is unit length).
    pub ray_t: f32,
    /// Parameter along the segment in `[0, 1]`.
    pub segment_t: f32,
    /// Closest point on the ray.
    pub point_on_ray: Vec3,
    /// Closest point on the segment.
    pub point_on_segment: Vec3,
}

/// Compute the closest approach between a ray (`t >= 0`) and the segment
/// `[a, b]`.
pub fn ray_segment_closest(ray: &Ray, a: Vec3, b: Vec3) -> RaySegmentApproach {
    let d1 = ray.direction;
    let d2 = b - a;
    let r = ray.origin - a;
    let e = d2.length_squared();

    let (s, t);
    if e <= f32::EPSILON {
        // Segment degenerates to a point.
        t = 0.0;
        s = (-d1.dot(r)).max(0.0);
    } else {
        let c = d1.dot(r);
        let f = d2.dot(r);
        let b_dot = d1.dot(d2);
        let denom = e - b_dot * b_dot;

        let mut s_raw = if denom.abs() > f32::EPSILON {
            ((b_dot * f - c * e) / denom).max(0.0)
        } else {
            // Parallel: any point pairs up, take the ray origin's projection.
            0.0
        };
        let mut t_raw = (b_dot * s_raw + f) / e;
        if t_raw < 0.0 {
            t_raw = 0.0;
            s_raw = (-c).max(0.0);
        } else if t_raw > 1.0 {
            t_raw = 1.0;
            s_raw = (b_dot - c).max(0.0);
        }
        s = s_raw;
        t = t_raw;
    }

    RaySegmentApproach {
        ray_t: s,
        segment_t: t,
        point_on_ray: ray.point_at(s),
        point_on_segment: a + d2 * t,
    }
}
