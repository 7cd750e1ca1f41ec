//! Built-in geometry: the full-screen quad and the light-marker cube.

use std::sync::Arc;

use glam::{Vec2, Vec3};

use renderer_rhi::RhiResult;
use renderer_rhi::buffer::{Buffer, BufferUsage};
use renderer_rhi::device::Device;
use renderer_rhi::vertex::{PositionVertex, QuadVertex};

/// Triangle strip covering clip space, texture coordinates spanning [0,1].
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex::new(Vec3::new(-1.0, 1.0, 0.0), Vec2::new(0.0, 1.0)),
    QuadVertex::new(Vec3::new(-1.0, -1.0, 0.0), Vec2::new(0.0, 0.0)),
    QuadVertex::new(Vec3::new(1.0, 1.0, 0.0), Vec2::new(1.0, 1.0)),
    QuadVertex::new(Vec3::new(1.0, -1.0, 0.0), Vec2::new(1.0, 0.0)),
];

const CUBE_CORNERS: [Vec3; 8] = [
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
];

/// Two counter-clockwise (seen from outside) triangles per face.
const CUBE_INDICES: [usize; 36] = [
    0, 3, 2, 2, 1, 0, // -Z
    4, 5, 6, 6, 7, 4, // +Z
    0, 4, 7, 7, 3, 0, // -X
    1, 2, 6, 6, 5, 1, // +X
    0, 1, 5, 5, 4, 0, // -Y
    3, 7, 6, 6, 2, 3, // +Y
];

/// Non-indexed unit cube spanning [-1, 1] on every axis.
pub fn cube_vertices() -> [PositionVertex; 36] {
    CUBE_INDICES.map(|i| PositionVertex::new(CUBE_CORNERS[i]))
}

/// Vertex buffers for the quad and cube, uploaded once at init.
pub struct BuiltinGeometry {
    quad: Buffer,
    cube: Buffer,
}

impl BuiltinGeometry {
    pub fn upload(device: Arc<Device>) -> RhiResult<Self> {
        let quad = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&QUAD_VERTICES),
        )?;
        let cube = Buffer::new_with_data(
            device,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&cube_vertices()),
        )?;
        Ok(Self { quad, cube })
    }

    #[inline]
    pub fn quad(&self) -> &Buffer {
        &self.quad
    }

    #[inline]
    pub fn cube(&self) -> &Buffer {
        &self.cube
    }

    pub const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;
    pub const CUBE_VERTEX_COUNT: u32 = CUBE_INDICES.len() as u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_covers_clip_space() {
        let min = QUAD_VERTICES
            .iter()
            .fold(Vec3::splat(f32::MAX), |m, v| m.min(v.position));
        let max = QUAD_VERTICES
            .iter()
            .fold(Vec3::splat(f32::MIN), |m, v| m.max(v.position));
        assert_eq!(min, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_quad_uv_follows_position() {
        for v in QUAD_VERTICES {
            let expected = (v.position.truncate() + Vec2::ONE) * 0.5;
            assert_eq!(v.tex_coord, expected);
        }
    }

    #[test]
    fn test_cube_has_36_vertices_on_unit_box() {
        let cube = cube_vertices();
        assert_eq!(cube.len(), 36);
        for v in cube {
            assert_eq!(v.position.abs(), Vec3::ONE);
        }
    }

    #[test]
    fn test_cube_faces_point_outwards() {
        let cube = cube_vertices();
        for triangle in cube.chunks_exact(3) {
            let [a, b, c] = [triangle[0].position, triangle[1].position, triangle[2].position];
            let normal = (b - a).cross(c - a);
            let centre = (a + b + c) / 3.0;
            assert!(normal.dot(centre) > 0.0, "inward triangle {:?}", [a, b, c]);
        }
    }
}
