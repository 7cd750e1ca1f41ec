//! GPU execution of the deferred path.
//!
//! [`DeferredRenderer`] owns the G-buffer, the frame target, every program
//! and the built-in geometry. It asks its [`DeferredPipeline`] for a
//! [`FramePlan`], uploads the frame's uniforms and records the plan into a
//! command buffer. Presentation is left to the caller: the windowed
//! [`Renderer`](crate::renderer::Renderer) blits the frame target to the
//! swapchain, [`DeferredRenderer::render`] submits and waits.
//!
//! Image layouts across one frame:
//!
//! | Image | Start | After geometry | After shading | End |
//! |---|---|---|---|---|
//! | G-buffer colour/depth | UNDEFINED | SHADER_READ_ONLY | SHADER_READ_ONLY | SHADER_READ_ONLY |
//! | frame colour | UNDEFINED | | COLOR_ATTACHMENT | TRANSFER_SRC |
//! | frame depth (composite only) | UNDEFINED | | DEPTH_ATTACHMENT | DEPTH_ATTACHMENT |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use renderer_core::Config;
use renderer_resources::Model;
use renderer_rhi::buffer::{Buffer, BufferUsage};
use renderer_rhi::command::CommandBuffer;
use renderer_rhi::descriptor::{DescriptorPool, DescriptorWriter};
use renderer_rhi::device::Device;
use renderer_rhi::rendering::{LoadAction, RenderingBundle, color_attachment, depth_attachment};
use renderer_rhi::sampler::{Sampler, SamplerKind};
use renderer_rhi::texture::Texture;
use renderer_rhi::{RhiError, RhiResult};
use renderer_scene::{Camera, DrawMode, LightSet, ModelId, SceneObject};
use renderer_scene::light_set::{DEFAULT_SEED, DEFAULT_WORLD_SCALE};

use crate::context::GpuContext;
use crate::depth::{DepthRange, DepthRangeError};
use crate::export::{DEFAULT_JPEG_QUALITY, ExportError, ExportReport, RawSnapshot, RowOrder, write_snapshot};
use crate::frame_target::FrameTarget;
use crate::gbuffer::{GBuffer, GBufferChannel};
use crate::geometry::BuiltinGeometry;
use crate::mesh::GpuModel;
use crate::pipeline::DeferredPipeline;
use crate::plan::{DrawCall, FramePlan, LightMarker, Pass, ShadingProgram};
use crate::programs::{LIGHT_VOLUME_PUSH, LIGHTING_UBO_BINDING, Programs, SCREEN_PUSH};
use crate::ubo::{CameraUbo, DepthPush, LightVolumePush, LightingUbo, MAX_LIGHTS, ModelPush};

/// Start-up settings of a [`DeferredRenderer`].
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    pub shader_dir: PathBuf,
    pub light_count: usize,
    pub light_seed: u64,
    pub world_scale: f32,
    pub animate_lights: bool,
    pub near: f32,
    pub far: f32,
    pub jpeg_quality: u8,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let range = DepthRange::default();
        Self {
            shader_dir: PathBuf::from("shaders/spirv"),
            light_count: 150,
            light_seed: DEFAULT_SEED,
            world_scale: DEFAULT_WORLD_SCALE,
            animate_lights: false,
            near: range.near(),
            far: range.far(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl RendererConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            shader_dir: config.debug.shader_dir.clone(),
            light_count: config.lights.count,
            light_seed: config.lights.seed,
            world_scale: config.lights.world_scale,
            animate_lights: config.lights.animate,
            near: config.camera.near,
            far: config.camera.far,
            jpeg_quality: config.export.jpeg_quality,
        }
    }

    /// Rejects settings the GPU programs cannot honour.
    pub fn validate(&self) -> RhiResult<()> {
        if self.light_count == 0 || self.light_count > MAX_LIGHTS {
            return Err(RhiError::PipelineError(format!(
                "light count must be in 1..={}, got {}",
                MAX_LIGHTS, self.light_count
            )));
        }
        Ok(())
    }
}

/// Field order is drop order; the context goes last.
pub struct DeferredRenderer {
    pipeline: DeferredPipeline,
    models: Vec<GpuModel>,

    camera_set: vk::DescriptorSet,
    screen_set: vk::DescriptorSet,
    _descriptor_pool: DescriptorPool,
    camera_ubo: Buffer,
    lighting_ubo: Buffer,

    geometry: BuiltinGeometry,
    white: Texture,
    material_sampler: Sampler,
    _attachment_sampler: Sampler,
    programs: Programs,
    frame: FrameTarget,
    gbuffer: GBuffer,

    jpeg_quality: u8,
    frames_completed: u64,
    context: GpuContext,
}

impl DeferredRenderer {
    /// Allocates the G-buffer and frame target at `width`x`height` and builds
    /// every program. Any failure here is fatal to the caller.
    pub fn new(context: GpuContext, width: u32, height: u32, config: &RendererConfig) -> RhiResult<Self> {
        config.validate()?;
        let device = context.device().clone();
        let pool = context.command_pool();

        let gbuffer = GBuffer::allocate(device.clone(), width, height).inspect_err(|e| {
            error!("G-buffer allocation failed: {}", e);
        })?;
        let frame = FrameTarget::allocate(device.clone(), width, height)?;
        let programs = Programs::new(device.clone(), &config.shader_dir, gbuffer.layout())
            .inspect_err(|e| error!("Program creation failed: {}", e))?;

        let attachment_sampler = Sampler::new(device.clone(), SamplerKind::Attachment)?;
        let material_sampler = Sampler::new(device.clone(), SamplerKind::Material)?;
        let white = Texture::solid(device.clone(), pool, [255, 255, 255, 255])?;
        let geometry = BuiltinGeometry::upload(device.clone())?;

        let camera_ubo = Buffer::new(device.clone(), BufferUsage::Uniform, CameraUbo::SIZE as vk::DeviceSize)?;
        let lighting_ubo = Buffer::new(device.clone(), BufferUsage::Uniform, LightingUbo::SIZE as vk::DeviceSize)?;

        let descriptor_pool = DescriptorPool::for_layouts(
            device.clone(),
            &[
                (programs.camera_set_layout(), 1),
                (programs.screen_set_layout(), 1),
            ],
        )?;
        let camera_set = descriptor_pool.allocate(programs.camera_set_layout())?;
        DescriptorWriter::new(camera_set)
            .buffer(0, camera_ubo.handle(), CameraUbo::SIZE as vk::DeviceSize)
            .flush(&device);

        let screen_set = descriptor_pool.allocate(programs.screen_set_layout())?;
        GBufferChannel::ALL
            .iter()
            .fold(DescriptorWriter::new(screen_set), |writer, &channel| {
                writer.image(
                    channel.unit(),
                    gbuffer.attachment(channel).view(),
                    attachment_sampler.handle(),
                )
            })
            .buffer(
                LIGHTING_UBO_BINDING,
                lighting_ubo.handle(),
                LightingUbo::SIZE as vk::DeviceSize,
            )
            .flush(&device);

        let mut lights = LightSet::generate(config.light_seed, config.light_count, config.world_scale);
        lights.set_animation_enabled(config.animate_lights);
        let mut pipeline = DeferredPipeline::new(lights);
        pipeline
            .set_perspective(config.near, config.far)
            .map_err(|e| RhiError::PipelineError(e.to_string()))?;

        info!(
            "Deferred renderer ready: {}x{}, {} lights",
            width,
            height,
            config.light_count
        );

        Ok(Self {
            pipeline,
            models: Vec::new(),
            camera_set,
            screen_set,
            _descriptor_pool: descriptor_pool,
            camera_ubo,
            lighting_ubo,
            geometry,
            white,
            material_sampler,
            _attachment_sampler: attachment_sampler,
            programs,
            frame,
            gbuffer,
            jpeg_quality: config.jpeg_quality,
            frames_completed: 0,
            context,
        })
    }

    /// Uploads `model`; the returned id is what [`SceneObject::model`] refers to.
    pub fn add_model(&mut self, model: &Model) -> RhiResult<ModelId> {
        let gpu = GpuModel::upload(
            self.context.device().clone(),
            self.context.command_pool(),
            model,
            self.programs.material_set_layout(),
            &self.material_sampler,
            &self.white,
        )?;
        let id = ModelId(self.models.len());
        debug!("Model {:?} uploaded with {} meshes", id, gpu.mesh_count());
        self.models.push(gpu);
        Ok(id)
    }

    /// Fails when `scene` references a model that was never added. Touches
    /// no GPU state.
    pub fn check_scene(&self, scene: &[SceneObject]) -> RhiResult<()> {
        match unknown_model(scene, self.models.len()) {
            Some(model) => Err(RhiError::InvalidHandle(format!(
                "{:?} is not loaded ({} models)",
                model,
                self.models.len()
            ))),
            None => Ok(()),
        }
    }

    /// Plans the frame and uploads its uniforms.
    ///
    /// The previous submission that read the uniform buffers must have
    /// completed.
    pub fn prepare(&mut self, elapsed: f32, scene: &[SceneObject], camera: &Camera) -> RhiResult<FramePlan> {
        self.check_scene(scene)?;

        let plan = self.pipeline.render(elapsed, scene, camera);
        for pass in &plan.passes {
            if let Pass::Geometry { view, projection, .. } = pass {
                self.camera_ubo.write_pod(&CameraUbo::new(*view, *projection))?;
            }
        }
        self.lighting_ubo
            .write_pod(&LightingUbo::new(plan.camera_position, &plan.lights))?;
        Ok(plan)
    }

    /// Records every pass of `plan`. Leaves the frame colour in
    /// TRANSFER_SRC_OPTIMAL for presentation or readback.
    pub fn record(&self, cmd: &CommandBuffer, plan: &FramePlan) -> RhiResult<()> {
        for pass in &plan.passes {
            match pass {
                Pass::Geometry {
                    clear_color, draws, ..
                } => self.record_geometry(cmd, *clear_color, draws),
                Pass::Shading {
                    program,
                    clear_color,
                    copy_depth,
                    ..
                } => self.record_shading(cmd, *program, *clear_color, *copy_depth, &plan.depth_range)?,
                Pass::LightVolumes { markers, .. } => self.record_light_volumes(cmd, markers),
            }
        }

        let color = self.frame.color();
        cmd.transition_image(
            color.handle(),
            color.aspect(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        Ok(())
    }

    fn record_geometry(&self, cmd: &CommandBuffer, clear_color: [f32; 4], draws: &[DrawCall]) {
        let extent = self.gbuffer.extent();
        let colors = self.gbuffer.color_attachments();
        let depth = self.gbuffer.attachment(GBufferChannel::Depth);

        let mut bundle = RenderingBundle::new(extent);
        for image in colors {
            cmd.transition_image(
                image.handle(),
                image.aspect(),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            );
            bundle = bundle.with_color(color_attachment(image.view(), LoadAction::Clear, clear_color));
        }
        cmd.transition_image(
            depth.handle(),
            depth.aspect(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );
        let bundle = bundle.with_depth(depth_attachment(depth.view(), LoadAction::Clear));

        let layout = self.programs.geometry_layout();
        cmd.begin_rendering(&bundle.info());
        cmd.set_viewport_and_scissor(extent);
        cmd.bind_graphics_pipeline(self.programs.geometry().handle());
        cmd.bind_descriptor_sets(layout.handle(), 0, &[self.camera_set]);
        for draw in draws {
            let Some(model) = self.models.get(draw.model.0) else {
                continue;
            };
            cmd.push_constants(
                layout.handle(),
                vk::ShaderStageFlags::VERTEX,
                &ModelPush {
                    model: draw.model_matrix,
                    normal: draw.normal_matrix,
                },
            );
            model.draw(cmd, layout);
        }
        cmd.end_rendering();

        // Everything the geometry pass wrote is visible to the samplers
        // from here on.
        for image in colors {
            cmd.transition_image(
                image.handle(),
                image.aspect(),
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        }
        cmd.transition_image(
            depth.handle(),
            depth.aspect(),
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    }

    fn record_shading(
        &self,
        cmd: &CommandBuffer,
        program: ShadingProgram,
        clear_color: [f32; 4],
        copy_depth: bool,
        depth_range: &DepthRange,
    ) -> RhiResult<()> {
        let pipeline = self
            .programs
            .shading(program)
            .ok_or_else(|| RhiError::PipelineError(format!("{:?} program missing", program)))?;
        let extent = self.frame.extent();
        let color = self.frame.color();
        let layout = self.programs.screen_layout();

        cmd.transition_image(
            color.handle(),
            color.aspect(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        let bundle = RenderingBundle::new(extent)
            .with_color(color_attachment(color.view(), LoadAction::Clear, clear_color));

        cmd.begin_rendering(&bundle.info());
        cmd.set_viewport_and_scissor(extent);
        cmd.bind_graphics_pipeline(pipeline.handle());
        cmd.bind_descriptor_sets(layout.handle(), 0, &[self.screen_set]);
        if program == ShadingProgram::Depth {
            cmd.push_constants(
                layout.handle(),
                SCREEN_PUSH.0,
                &DepthPush {
                    near: depth_range.near(),
                    far: depth_range.far(),
                },
            );
        }
        cmd.bind_vertex_buffer(self.geometry.quad().handle());
        cmd.draw(BuiltinGeometry::QUAD_VERTEX_COUNT, 1);
        cmd.end_rendering();

        if copy_depth {
            self.copy_scene_depth(cmd);
        }
        Ok(())
    }

    /// G-buffer depth onto the frame depth, so markers are hidden by scene
    /// geometry.
    fn copy_scene_depth(&self, cmd: &CommandBuffer) {
        let src = self.gbuffer.attachment(GBufferChannel::Depth);
        let dst = self.frame.depth();

        cmd.transition_image(
            src.handle(),
            src.aspect(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        cmd.transition_image(
            dst.handle(),
            dst.aspect(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        cmd.copy_image(src.handle(), dst.handle(), vk::ImageAspectFlags::DEPTH, src.extent());
        cmd.transition_image(
            src.handle(),
            src.aspect(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        cmd.transition_image(
            dst.handle(),
            dst.aspect(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );
    }

    fn record_light_volumes(&self, cmd: &CommandBuffer, markers: &[LightMarker]) {
        let extent = self.frame.extent();
        let layout = self.programs.light_volume_layout();
        let bundle = RenderingBundle::new(extent)
            .with_color(color_attachment(self.frame.color().view(), LoadAction::Load, [0.0; 4]))
            .with_depth(depth_attachment(self.frame.depth().view(), LoadAction::Load));

        cmd.begin_rendering(&bundle.info());
        cmd.set_viewport_and_scissor(extent);
        cmd.bind_graphics_pipeline(self.programs.light_volume().handle());
        cmd.bind_descriptor_sets(layout.handle(), 0, &[self.camera_set]);
        cmd.bind_vertex_buffer(self.geometry.cube().handle());
        for marker in markers {
            cmd.push_constants(
                layout.handle(),
                LIGHT_VOLUME_PUSH.0,
                &LightVolumePush {
                    model: marker.model_matrix,
                    color: marker.color,
                },
            );
            cmd.draw(BuiltinGeometry::CUBE_VERTEX_COUNT, 1);
        }
        cmd.end_rendering();
    }

    /// Plans, records, submits and waits for one frame without a window.
    pub fn render(&mut self, elapsed: f32, scene: &[SceneObject], camera: &Camera) -> RhiResult<FramePlan> {
        let plan = self.prepare(elapsed, scene, camera)?;
        self.context
            .command_pool()
            .one_shot(|cmd| self.record(cmd, &plan))?;
        self.frame_completed();
        Ok(plan)
    }

    /// Marks a recorded frame as submitted, enabling export.
    pub fn frame_completed(&mut self) {
        self.frames_completed += 1;
    }

    #[inline]
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// Reads back the G-buffer and the frame target and writes six JPEG
    /// files into `dir`. `width`x`height` must match the G-buffer size.
    pub fn export_snapshot(&self, width: u32, height: u32, dir: &Path) -> Result<ExportReport, ExportError> {
        let extent = self.gbuffer.extent();
        if (width, height) != (extent.width, extent.height) {
            return Err(ExportError::SizeMismatch {
                requested: (width, height),
                actual: (extent.width, extent.height),
            });
        }
        if self.frames_completed == 0 {
            return Err(ExportError::NoFrame);
        }

        self.context.wait_idle()?;
        let snapshot = RawSnapshot {
            width,
            height,
            row_order: Some(RowOrder::TopDown),
            position: self.read_gbuffer(GBufferChannel::Position)?,
            normal: self.read_gbuffer(GBufferChannel::Normal)?,
            diffuse_specular: self.read_gbuffer(GBufferChannel::DiffuseSpecular)?,
            depth: self.read_gbuffer(GBufferChannel::Depth)?,
            final_color: self.read_frame()?,
        };
        write_snapshot(&snapshot, &self.pipeline.depth_range(), dir, self.jpeg_quality)
    }

    /// Raw bytes of one G-buffer attachment. Requires a completed frame.
    pub fn read_gbuffer(&self, channel: GBufferChannel) -> RhiResult<Vec<u8>> {
        self.gbuffer
            .read_attachment(self.device().clone(), self.context.command_pool(), channel)
    }

    /// RGBA8 pixels of the frame target. Requires a completed frame.
    pub fn read_frame(&self) -> RhiResult<Vec<u8>> {
        self.frame
            .read_color(self.device().clone(), self.context.command_pool())
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        self.pipeline.set_draw_mode(mode);
    }

    #[inline]
    pub fn draw_mode(&self) -> DrawMode {
        self.pipeline.draw_mode()
    }

    pub fn set_perspective(&mut self, near: f32, far: f32) -> Result<(), DepthRangeError> {
        self.pipeline.set_perspective(near, far)
    }

    pub fn toggle_light_animation(&mut self) -> bool {
        self.pipeline.toggle_light_animation()
    }

    pub fn regenerate_lights(&mut self, seed: u64) {
        self.pipeline.regenerate_lights(seed);
    }

    #[inline]
    pub fn pipeline(&self) -> &DeferredPipeline {
        &self.pipeline
    }

    #[inline]
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    #[inline]
    pub fn frame_target(&self) -> &FrameTarget {
        &self.frame
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.gbuffer.extent()
    }

    #[inline]
    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        self.context.device()
    }

    pub fn model(&self, id: ModelId) -> Option<&GpuModel> {
        self.models.get(id.0)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

impl Drop for DeferredRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            warn!("Device wait failed during renderer teardown: {}", e);
        }
        info!("Deferred renderer shut down after {} frames", self.frames_completed);
    }
}

/// First model in `scene` outside the `loaded` models added so far.
fn unknown_model(scene: &[SceneObject], loaded: usize) -> Option<ModelId> {
    scene.iter().map(|o| o.model).find(|id| id.0 >= loaded)
}
