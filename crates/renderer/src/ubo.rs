//! Uniform and push-constant blocks shared with the GLSL programs.
//!
//! All blocks are `#[repr(C)]` + `Pod` and laid out for std140 (uniforms)
//! or std430 (push constants); vec3 members are padded to vec4.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4, Vec3, Vec4};
use tracing::warn;

use renderer_scene::PointLight;

/// Lights the shading program's uniform array holds. Must match
/// `MAX_LIGHTS` in `deferred.frag`.
pub const MAX_LIGHTS: usize = renderer_core::config::MAX_LIGHT_COUNT;

/// Set 0, binding 0 of the geometry and light-volume programs.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CameraUbo {
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view, projection }
    }
}

/// Per-draw push constants of the geometry program.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ModelPush {
    pub model: Mat4,
    pub normal: Mat4,
}

/// Set 1, binding 1 of the geometry program.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MaterialUbo {
    pub base_color_factor: Vec4,
    pub specular: f32,
    pub _padding: [f32; 3],
}

impl MaterialUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(base_color_factor: Vec4, specular: f32) -> Self {
        Self {
            base_color_factor,
            specular,
            _padding: [0.0; 3],
        }
    }
}

/// Screen-space set, binding 4: camera position and the rotated lights.
///
/// Each [`PointLight`] is two vec4s on the GPU side:
/// `(position, radius)` and `(color, attenuation)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightingUbo {
    pub camera_position: Vec4,
    /// `x` is the number of valid entries in `lights`.
    pub params: UVec4,
    pub lights: [PointLight; MAX_LIGHTS],
}

impl LightingUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Lights beyond [`MAX_LIGHTS`] are dropped with a warning.
    pub fn new(camera_position: Vec3, lights: &[PointLight]) -> Self {
        if lights.len() > MAX_LIGHTS {
            warn!(
                "{} lights requested, shading uses the first {}",
                lights.len(),
                MAX_LIGHTS
            );
        }
        let count = lights.len().min(MAX_LIGHTS);

        let mut ubo = Self::zeroed();
        ubo.camera_position = camera_position.extend(1.0);
        ubo.params = UVec4::new(count as u32, 0, 0, 0);
        ubo.lights[..count].copy_from_slice(&lights[..count]);
        ubo
    }

    pub fn light_count(&self) -> usize {
        self.params.x as usize
    }
}

/// Push constants of the depth visualization program.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct DepthPush {
    pub near: f32,
    pub far: f32,
}

/// Per-marker push constants of the light-volume program.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct LightVolumePush {
    pub model: Mat4,
    pub color: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes() {
        assert_eq!(CameraUbo::SIZE, 128);
        assert_eq!(std::mem::size_of::<ModelPush>(), 128);
        assert_eq!(MaterialUbo::SIZE, 32);
        assert_eq!(std::mem::size_of::<DepthPush>(), 8);
        assert_eq!(std::mem::size_of::<LightVolumePush>(), 80);
        assert_eq!(LightingUbo::SIZE, 32 + MAX_LIGHTS * 32);
    }

    #[test]
    fn test_lighting_ubo_copies_lights_in_order() {
        let lights: Vec<PointLight> = (0..3)
            .map(|i| PointLight::new(Vec3::splat(i as f32), Vec3::ONE, 3.5, 8.0))
            .collect();
        let ubo = LightingUbo::new(Vec3::new(0.0, 0.0, 5.0), &lights);

        assert_eq!(ubo.light_count(), 3);
        assert_eq!(ubo.camera_position, Vec4::new(0.0, 0.0, 5.0, 1.0));
        assert_eq!(ubo.lights[2].position, Vec3::splat(2.0));
        assert_eq!(ubo.lights[3], PointLight::zeroed());
    }

    #[test]
    fn test_lighting_ubo_truncates() {
        let lights = vec![PointLight::default(); MAX_LIGHTS + 10];
        let ubo = LightingUbo::new(Vec3::ZERO, &lights);
        assert_eq!(ubo.light_count(), MAX_LIGHTS);
    }
}
