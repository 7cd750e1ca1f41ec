//! Point light definition shared by the CPU light set and the GPU.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// A point light.
///
/// The layout matches two std140 `vec4`s (`position, radius` and
/// `color, attenuation`), so a slice of lights can be copied into a uniform
/// buffer as-is.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    /// World-space position.
    pub position: Vec3,
    /// Distance beyond which the light contributes nothing.
    pub radius: f32,
    /// Linear RGB.
    pub color: Vec3,
    /// Quadratic falloff coefficient.
    pub attenuation: f32,
}

impl PointLight {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(position: Vec3, color: Vec3, radius: f32, attenuation: f32) -> Self {
        Self {
            position,
            radius,
            color,
            attenuation,
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE, 10.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_light_is_two_vec4() {
        assert_eq!(PointLight::SIZE, 32);
        assert_eq!(std::mem::offset_of!(PointLight, radius), 12);
        assert_eq!(std::mem::offset_of!(PointLight, color), 16);
        assert_eq!(std::mem::offset_of!(PointLight, attenuation), 28);
    }
}
