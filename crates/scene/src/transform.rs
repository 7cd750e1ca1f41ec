//! Position, rotation and scale of a scene object.
//!
//! # Example
//!
//! ```
//! use renderer_scene::Transform;
//! use glam::{Quat, Vec3};
//!
//! let t = Transform::new()
//!     .with_position(Vec3::new(0.0, -3.0, 0.0))
//!     .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
//!     .with_uniform_scale(18.0);
//!
//! let origin = t.matrix().transform_point3(Vec3::ZERO);
//! assert!((origin - Vec3::new(0.0, -3.0, 0.0)).length() < 1e-5);
//! ```

use glam::{Mat4, Quat, Vec3};

/// Translation · rotation · scale, applied to points in that order from the
/// right (scale first).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::splat(scale))
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Inverse transpose of [`Transform::matrix`], identity when the
    /// transform is not invertible.
    pub fn normal_matrix(&self) -> Mat4 {
        crate::transform_stack::normal_matrix_of(self.matrix())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
        assert_eq!(t.normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_scale_applies_before_rotation_and_translation() {
        let t = Transform::new()
            .with_position(Vec3::new(10.0, 0.0, 0.0))
            .with_rotation(Quat::from_rotation_y(FRAC_PI_2))
            .with_uniform_scale(2.0);

        // (1,0,0) scaled to (2,0,0), rotated to (0,0,-2), moved by +10 x.
        let p = t.matrix().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::new(10.0, 0.0, -2.0)), "got {:?}", p);
    }

    #[test]
    fn test_normal_matrix_with_non_uniform_scale() {
        let t = Transform::new().with_scale(Vec3::new(1.0, 2.0, 1.0));
        assert_eq!(t.normal_matrix(), t.matrix().inverse().transpose());
    }

    #[test]
    fn test_normal_matrix_zero_scale_falls_back_to_identity() {
        let t = Transform::new().with_scale(Vec3::ZERO);
        assert_eq!(t.normal_matrix(), Mat4::IDENTITY);
    }
}
