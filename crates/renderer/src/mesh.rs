//! GPU-side models: interleaved vertex buffers, index buffers and one
//! material descriptor set per mesh.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, warn};

use renderer_resources::{Mesh, Model};
use renderer_rhi::RhiResult;
use renderer_rhi::buffer::{Buffer, BufferUsage};
use renderer_rhi::command::{CommandBuffer, CommandPool};
use renderer_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorWriter};
use renderer_rhi::device::Device;
use renderer_rhi::pipeline::PipelineLayout;
use renderer_rhi::sampler::Sampler;
use renderer_rhi::texture::Texture;
use renderer_rhi::vertex::ModelVertex;

use crate::ubo::MaterialUbo;

/// Descriptor set index of the material inputs in the geometry program.
pub const MATERIAL_SET: u32 = 1;

/// Zips positions, normals and texture coordinates into [`ModelVertex`]es.
/// Missing attributes read as zero.
pub fn interleave(mesh: &Mesh) -> Vec<ModelVertex> {
    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            ModelVertex::new(
                position,
                mesh.normals.get(i).copied().unwrap_or_default(),
                mesh.tex_coords.get(i).copied().unwrap_or_default(),
            )
        })
        .collect()
}

pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    material_set: vk::DescriptorSet,
    _material_ubo: Buffer,
}

impl GpuMesh {
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

pub struct GpuModel {
    meshes: Vec<GpuMesh>,
    _textures: Vec<Texture>,
    _descriptor_pool: DescriptorPool,
    normalize_scale: f32,
}

impl GpuModel {
    /// Uploads every non-empty mesh of `model`. Meshes without a base-colour
    /// texture sample `white`.
    pub fn upload(
        device: Arc<Device>,
        pool: &CommandPool,
        model: &Model,
        material_layout: &DescriptorSetLayout,
        sampler: &Sampler,
        white: &Texture,
    ) -> RhiResult<Self> {
        let textures = model
            .textures
            .iter()
            .map(|t| Texture::from_rgba8(device.clone(), pool, "model_texture", t.width, t.height, &t.pixels))
            .collect::<RhiResult<Vec<_>>>()?;

        let drawable: Vec<&Mesh> = model
            .meshes
            .iter()
            .filter(|mesh| {
                let keep = !mesh.positions.is_empty() && !mesh.indices.is_empty();
                if !keep {
                    warn!("Skipping empty mesh {}", mesh.name);
                }
                keep
            })
            .collect();

        let descriptor_pool = DescriptorPool::for_layouts(
            device.clone(),
            &[(material_layout, drawable.len().max(1) as u32)],
        )?;

        let mut meshes = Vec::with_capacity(drawable.len());
        for mesh in drawable {
            let vertices = interleave(mesh);
            let vertex_buffer = Buffer::new_with_data(
                device.clone(),
                BufferUsage::Vertex,
                bytemuck::cast_slice(&vertices),
            )?;
            let index_buffer = Buffer::new_with_data(
                device.clone(),
                BufferUsage::Index,
                bytemuck::cast_slice(&mesh.indices),
            )?;

            let material = model.material_for(mesh);
            let material_ubo = Buffer::new_with_data(
                device.clone(),
                BufferUsage::Uniform,
                bytemuck::bytes_of(&MaterialUbo::new(material.base_color_factor, material.specular)),
            )?;

            let texture = material
                .base_color_texture
                .and_then(|index| textures.get(index))
                .unwrap_or(white);

            let material_set = descriptor_pool.allocate(material_layout)?;
            DescriptorWriter::new(material_set)
                .image(0, texture.view(), sampler.handle())
                .buffer(1, material_ubo.handle(), MaterialUbo::SIZE as vk::DeviceSize)
                .flush(&device);

            debug!(
                "Uploaded mesh {}: {} vertices, {} indices",
                mesh.name,
                vertices.len(),
                mesh.indices.len()
            );
            meshes.push(GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                material_set,
                _material_ubo: material_ubo,
            });
        }

        Ok(Self {
            meshes,
            _textures: textures,
            _descriptor_pool: descriptor_pool,
            normalize_scale: model.normalize_scale(),
        })
    }

    /// Binds each mesh's material set and issues its indexed draw. The
    /// geometry pipeline, camera set and model push constants must already
    /// be bound.
    pub fn draw(&self, cmd: &CommandBuffer, layout: &PipelineLayout) {
        for mesh in &self.meshes {
            cmd.bind_descriptor_sets(layout.handle(), MATERIAL_SET, &[mesh.material_set]);
            cmd.bind_vertex_buffer(mesh.vertex_buffer.handle());
            cmd.bind_index_buffer(mesh.index_buffer.handle(), vk::IndexType::UINT32);
            cmd.draw_indexed(mesh.index_count, 0, 0);
        }
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    pub fn normalize_scale(&self) -> f32 {
        self.normalize_scale
    }

    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;

    #[test]
    fn test_interleave_zips_attributes() {
        let mesh = Mesh {
            name: "tri".into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            indices: vec![0, 1, 2],
            material: None,
        };
        let vertices = interleave(&mesh);
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[1], ModelVertex::new(Vec3::X, Vec3::Z, Vec2::X));
    }

    #[test]
    fn test_interleave_fills_missing_attributes() {
        let mesh = Mesh {
            positions: vec![Vec3::ONE, Vec3::ONE],
            normals: vec![Vec3::Y],
            ..Default::default()
        };
        let vertices = interleave(&mesh);
        assert_eq!(vertices[0].normal, Vec3::Y);
        assert_eq!(vertices[1].normal, Vec3::ZERO);
        assert_eq!(vertices[1].tex_coord, Vec2::ZERO);
    }
}
