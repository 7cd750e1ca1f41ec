//! Vertex formats and their input descriptions.
//!
//! - [`ModelVertex`]: position, normal, texture coordinate for loaded meshes
//! - [`QuadVertex`]: position and texture coordinate for the full-screen quad
//! - [`PositionVertex`]: position only, for light-volume cubes

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

fn binding<T>() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<T>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

fn attribute(location: u32, format: vk::Format, offset: u32) -> vk::VertexInputAttributeDescription {
    vk::VertexInputAttributeDescription {
        binding: 0,
        location,
        format,
        offset,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl ModelVertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        binding::<Self>()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
            attribute(1, vk::Format::R32G32B32_SFLOAT, 12),
            attribute(2, vk::Format::R32G32_SFLOAT, 24),
        ]
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
}

impl QuadVertex {
    #[inline]
    pub const fn new(position: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            tex_coord,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        binding::<Self>()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
            attribute(1, vk::Format::R32G32_SFLOAT, 12),
        ]
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: Vec3,
}

impl PositionVertex {
    #[inline]
    pub const fn new(position: Vec3) -> Self {
        Self { position }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        binding::<Self>()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 1] {
        [attribute(0, vk::Format::R32G32B32_SFLOAT, 0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_vertex_layout() {
        assert_eq!(std::mem::size_of::<ModelVertex>(), 32);
        assert_eq!(ModelVertex::binding_description().stride, 32);

        let attrs = ModelVertex::attribute_descriptions();
        assert_eq!(attrs[1].offset, std::mem::offset_of!(ModelVertex, normal) as u32);
        assert_eq!(attrs[2].offset, std::mem::offset_of!(ModelVertex, tex_coord) as u32);
        assert_eq!(attrs[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn test_quad_vertex_layout() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
        let attrs = QuadVertex::attribute_descriptions();
        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].offset, std::mem::offset_of!(QuadVertex, tex_coord) as u32);
    }

    #[test]
    fn test_position_vertex_layout() {
        assert_eq!(PositionVertex::binding_description().stride, 12);
        assert_eq!(PositionVertex::attribute_descriptions().len(), 1);
    }
}
