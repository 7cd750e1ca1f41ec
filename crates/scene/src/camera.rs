//! Camera for rendering.

use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn near_far(&self) -> (f32, f32) {
        match *self {
            Projection::Perspective { near, far, .. } => (near, far),
            Projection::Orthographic { near, far, .. } => (near, far),
        }
    }
}

/// Read-only camera state consumed by the renderer once per frame.
///
/// `rotation` maps the camera's local -Z onto the view direction.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: 60.0_f32.to_radians(),
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 1000.0,
            },
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perspective camera at `position` looking down -Z.
    pub fn perspective(position: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            },
        }
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective {
            fov_y,
            aspect,
            near,
            far,
        };
    }

    pub fn set_orthographic(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Projection::Orthographic {
            left,
            right,
            bottom,
            top,
            near,
            far,
        };
    }

    /// Update the aspect ratio (perspective only).
    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = &mut self.projection {
            *a = aspect;
        }
    }

    /// Clip planes usable for depth linearization.
    ///
    /// `None` for orthographic projections, whose depth is already linear
    /// and must not go through the perspective formula.
    pub fn depth_range(&self) -> Option<(f32, f32)> {
        match self.projection {
            Projection::Perspective { near, far, .. } => Some((near, far)),
            Projection::Orthographic { .. } => None,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Projection matrix with the Vulkan Y flip applied.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        };
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Orients the camera along `direction` without roll.
    ///
    /// Zero-length directions are ignored.
    pub fn look_to(&mut self, direction: Vec3) {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return;
        }
        let yaw = direction.x.atan2(direction.z);
        let pitch = direction.y.clamp(-1.0, 1.0).asin();
        self.rotation = yaw_pitch_rotation(yaw, pitch);
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.look_to(target - self.position);
    }
}

/// Rotation whose forward (-Z) is `(cos p·sin y, sin p, cos p·cos y)`.
pub(crate) fn yaw_pitch_rotation(yaw: f32, pitch: f32) -> Quat {
    Quat::from_rotation_y(yaw + PI) * Quat::from_rotation_x(pitch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn test_look_to_matches_direction() {
        let mut camera = Camera::new();
        for dir in [
            Vec3::Z,
            Vec3::NEG_Z,
            Vec3::new(1.0, 0.5, -2.0).normalize(),
            Vec3::new(-0.3, -0.9, 0.1).normalize(),
        ] {
            camera.look_to(dir);
            assert!(approx_eq_vec3(camera.forward(), dir), "{:?} vs {:?}", camera.forward(), dir);
            // No roll: right stays horizontal.
            assert!(camera.right().y.abs() < 1e-5);
        }
    }

    #[test]
    fn test_look_at_origin() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::ZERO);
        assert!(approx_eq_vec3(camera.forward(), Vec3::NEG_Z));

        let p = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(approx_eq_vec3(p, Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::new();
        let clip = camera.view_projection_matrix() * Vec3::new(0.0, 1.0, 0.0).extend(1.0);
        // Points above the view axis land in the upper half of Vulkan NDC.
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn test_depth_range_only_for_perspective() {
        let mut camera = Camera::new();
        assert_eq!(camera.depth_range(), Some((0.1, 1000.0)));

        camera.set_orthographic(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        assert_eq!(camera.depth_range(), None);
        assert_eq!(camera.projection.near_far(), (0.1, 10.0));
    }

    #[test]
    fn test_set_aspect_keeps_planes() {
        let mut camera = Camera::new();
        camera.set_aspect(1.0);
        match camera.projection {
            Projection::Perspective { aspect, near, far, .. } => {
                assert_eq!(aspect, 1.0);
                assert_eq!((near, far), (0.1, 1000.0));
            }
            Projection::Orthographic { .. } => panic!("expected perspective"),
        }
    }
}
