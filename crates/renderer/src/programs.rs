//! Shader programs of the deferred path and their descriptor layouts.
//!
//! | Program | Vertex stage | Targets | Inputs |
//! |---|---|---|---|
//! | geometry | `gbuffer.vert` | 3 G-buffer colours + depth | camera UBO, material set, `ModelPush` |
//! | lighting / channel views | `fullscreen.vert` | frame colour | units 0-3, `LightingUbo`, `DepthPush` |
//! | light volume | `light_volume.vert` | frame colour + depth | camera UBO, `LightVolumePush` |
//!
//! Every program is built at init; a missing or invalid SPIR-V file is
//! fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use renderer_rhi::RhiResult;
use renderer_rhi::descriptor::{DescriptorSetLayout, binding};
use renderer_rhi::device::Device;
use renderer_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout, push_constant_range};
use renderer_rhi::shader::{Shader, ShaderStage};
use renderer_rhi::vertex::{ModelVertex, PositionVertex, QuadVertex};

use crate::frame_target::{FRAME_COLOR_FORMAT, FRAME_DEPTH_FORMAT};
use crate::gbuffer::{GBufferChannel, GBufferLayout};
use crate::plan::ShadingProgram;

/// Binding of the lighting uniform block in the screen-space set.
pub const LIGHTING_UBO_BINDING: u32 = 4;

pub const GEOMETRY_VERT: &str = "gbuffer.vert.spv";
pub const GEOMETRY_FRAG: &str = "gbuffer.frag.spv";
pub const FULLSCREEN_VERT: &str = "fullscreen.vert.spv";
pub const LIGHT_VOLUME_VERT: &str = "light_volume.vert.spv";
pub const LIGHT_VOLUME_FRAG: &str = "light_volume.frag.spv";

/// Push-constant stages and sizes per layout.
pub const GEOMETRY_PUSH: (vk::ShaderStageFlags, usize) = (vk::ShaderStageFlags::VERTEX, 128);
pub const SCREEN_PUSH: (vk::ShaderStageFlags, usize) = (vk::ShaderStageFlags::FRAGMENT, 8);
pub const LIGHT_VOLUME_PUSH: (vk::ShaderStageFlags, usize) = (
    vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
    ),
    80,
);

/// Every SPIR-V file the renderer loads.
pub fn required_shader_files() -> Vec<&'static str> {
    let mut files = vec![
        GEOMETRY_VERT,
        GEOMETRY_FRAG,
        FULLSCREEN_VERT,
        LIGHT_VOLUME_VERT,
        LIGHT_VOLUME_FRAG,
    ];
    files.extend(ShadingProgram::ALL.iter().map(|p| p.fragment_file()));
    files
}

/// Set 0 of the geometry and light-volume programs.
pub fn camera_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 1] {
    [binding::uniform_buffer(0, vk::ShaderStageFlags::VERTEX)]
}

/// Set 1 of the geometry program: base-colour texture and material block.
pub fn material_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        binding::combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT),
        binding::uniform_buffer(1, vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// Set 0 of the screen-space programs: one sampler per G-buffer unit plus
/// the lighting block.
pub fn screen_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 5] {
    let [a, b, c, d] = GBufferChannel::ALL
        .map(|channel| binding::combined_image_sampler(channel.unit(), vk::ShaderStageFlags::FRAGMENT));
    [
        a,
        b,
        c,
        d,
        binding::uniform_buffer(LIGHTING_UBO_BINDING, vk::ShaderStageFlags::FRAGMENT),
    ]
}

pub struct Programs {
    geometry: Pipeline,
    shading: Vec<(ShadingProgram, Pipeline)>,
    light_volume: Pipeline,

    geometry_layout: PipelineLayout,
    screen_layout: PipelineLayout,
    light_volume_layout: PipelineLayout,

    camera_set_layout: DescriptorSetLayout,
    material_set_layout: DescriptorSetLayout,
    screen_set_layout: DescriptorSetLayout,
}

impl Programs {
    pub fn new(device: Arc<Device>, shader_dir: &Path, gbuffer: &GBufferLayout) -> RhiResult<Self> {
        let camera_set_layout = DescriptorSetLayout::new(device.clone(), &camera_bindings())?;
        let material_set_layout = DescriptorSetLayout::new(device.clone(), &material_bindings())?;
        let screen_set_layout = DescriptorSetLayout::new(device.clone(), &screen_bindings())?;

        let push = |(stages, size): (vk::ShaderStageFlags, usize)| [push_constant_range(stages, size)];
        let geometry_layout = PipelineLayout::new(
            device.clone(),
            &[camera_set_layout.handle(), material_set_layout.handle()],
            &push(GEOMETRY_PUSH),
        )?;
        let screen_layout = PipelineLayout::new(
            device.clone(),
            &[screen_set_layout.handle()],
            &push(SCREEN_PUSH),
        )?;
        let light_volume_layout = PipelineLayout::new(
            device.clone(),
            &[camera_set_layout.handle()],
            &push(LIGHT_VOLUME_PUSH),
        )?;

        let load = |file: &str, stage: ShaderStage| {
            let path: PathBuf = shader_dir.join(file);
            Shader::from_spirv_file(device.clone(), &path, stage).inspect_err(|e| {
                error!("Failed to load {:?}: {}", path, e);
            })
        };

        let geometry = {
            let vert = load(GEOMETRY_VERT, ShaderStage::Vertex)?;
            let frag = load(GEOMETRY_FRAG, ShaderStage::Fragment)?;
            GraphicsPipelineBuilder::new()
                .vertex_shader(&vert)
                .fragment_shader(&frag)
                .vertex_input(
                    ModelVertex::binding_description(),
                    &ModelVertex::attribute_descriptions(),
                )
                .color_attachment_formats(&gbuffer.color_formats())
                .depth_attachment_format(gbuffer.depth_format())
                .depth_test(true, true)
                .build(device.clone(), &geometry_layout)?
        };

        let fullscreen = load(FULLSCREEN_VERT, ShaderStage::Vertex)?;
        let shading = ShadingProgram::ALL
            .iter()
            .map(|&program| {
                let frag = load(program.fragment_file(), ShaderStage::Fragment)?;
                let pipeline = GraphicsPipelineBuilder::new()
                    .vertex_shader(&fullscreen)
                    .fragment_shader(&frag)
                    .vertex_input(
                        QuadVertex::binding_description(),
                        &QuadVertex::attribute_descriptions(),
                    )
                    .topology(vk::PrimitiveTopology::TRIANGLE_STRIP)
                    .color_attachment_formats(&[FRAME_COLOR_FORMAT])
                    .depth_test(false, false)
                    .build(device.clone(), &screen_layout)?;
                Ok((program, pipeline))
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let light_volume = {
            let vert = load(LIGHT_VOLUME_VERT, ShaderStage::Vertex)?;
            let frag = load(LIGHT_VOLUME_FRAG, ShaderStage::Fragment)?;
            GraphicsPipelineBuilder::new()
                .vertex_shader(&vert)
                .fragment_shader(&frag)
                .vertex_input(
                    PositionVertex::binding_description(),
                    &PositionVertex::attribute_descriptions(),
                )
                .color_attachment_formats(&[FRAME_COLOR_FORMAT])
                .depth_attachment_format(FRAME_DEPTH_FORMAT)
                .depth_test(true, true)
                .build(device, &light_volume_layout)?
        };

        info!(
            "Built {} programs from {:?}",
            shading.len() + 2,
            shader_dir
        );

        Ok(Self {
            geometry,
            shading,
            light_volume,
            geometry_layout,
            screen_layout,
            light_volume_layout,
            camera_set_layout,
            material_set_layout,
            screen_set_layout,
        })
    }

    #[inline]
    pub fn geometry(&self) -> &Pipeline {
        &self.geometry
    }

    /// The pipeline for `program`; every variant is built in [`Programs::new`].
    pub fn shading(&self, program: ShadingProgram) -> Option<&Pipeline> {
        self.shading
            .iter()
            .find(|(p, _)| *p == program)
            .map(|(_, pipeline)| pipeline)
    }

    #[inline]
    pub fn light_volume(&self) -> &Pipeline {
        &self.light_volume
    }

    #[inline]
    pub fn geometry_layout(&self) -> &PipelineLayout {
        &self.geometry_layout
    }

    #[inline]
    pub fn screen_layout(&self) -> &PipelineLayout {
        &self.screen_layout
    }

    #[inline]
    pub fn light_volume_layout(&self) -> &PipelineLayout {
        &self.light_volume_layout
    }

    #[inline]
    pub fn camera_set_layout(&self) -> &DescriptorSetLayout {
        &self.camera_set_layout
    }

    #[inline]
    pub fn material_set_layout(&self) -> &DescriptorSetLayout {
        &self.material_set_layout
    }

    #[inline]
    pub fn screen_set_layout(&self) -> &DescriptorSetLayout {
        &self.screen_set_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubo::{DepthPush, LightVolumePush, ModelPush};

    #[test]
    fn test_push_sizes_match_blocks() {
        assert_eq!(GEOMETRY_PUSH.1, std::mem::size_of::<ModelPush>());
        assert_eq!(SCREEN_PUSH.1, std::mem::size_of::<DepthPush>());
        assert_eq!(LIGHT_VOLUME_PUSH.1, std::mem::size_of::<LightVolumePush>());
        assert!(LIGHT_VOLUME_PUSH.0.contains(vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn test_screen_set_bindings() {
        let bindings = screen_bindings();
        let numbers: Vec<u32> = bindings.iter().map(|b| b.binding).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
        assert_eq!(bindings[4].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert!(
            bindings[..4]
                .iter()
                .all(|b| b.descriptor_type == vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        );
    }

    #[test]
    fn test_required_shader_files() {
        let files = required_shader_files();
        assert_eq!(files.len(), 11);
        assert!(files.contains(&"deferred.frag.spv"));
        assert!(files.contains(&"depth.frag.spv"));
    }
}
