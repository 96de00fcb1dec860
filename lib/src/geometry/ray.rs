//! Ray type used for picking queries.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// A ray with an origin and a normalized direction.
///
/// Rays are used both in world space (as supplied by the caller) and in a
/// geometry's local space (after transformation through the inverse model
/// matrix).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// Ray origin.
    pub origin: Vec3,
    /// Normalized ray direction.
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray; the direction is normalized.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Point at parameter `t` along the ray.
    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Map the ray through a matrix, renormalizing the direction.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            origin: matrix.transform_point3(self.origin),
            direction: matrix.transform_vector3(self.direction).normalize_or_zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_normalized() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(ray.direction, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(ray.point_at(2.0), Vec3::new(0.0, 0.0, -2.0));
    }

    #[test]
    fn test_transformed_into_local_space() {
        let model = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let ray = Ray::new(Vec3::new(10.5, 0.5, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let local = ray.transformed(&model.inverse());
        assert!((local.origin - Vec3::new(0.5, 0.5, 5.0)).length() < 1e-6);
        assert_eq!(local.direction, Vec3::new(0.0, 0.0, -1.0));
    }
}
