//! Geometric value types and primitive tests shared by the octree variants.

mod bounds;
mod intersect;
mod ray;

pub use bounds::{BoundingBox, BoundingSphere};
pub use intersect::{
    closest_point_on_segment, closest_point_on_triangle, ray_box_intersect, ray_segment_closest,
    ray_triangle_intersect, RaySegmentApproach,
};
pub use ray::Ray;
