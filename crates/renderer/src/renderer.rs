//! Windowed presentation of the deferred path.
//!
//! [`Renderer`] wraps a [`DeferredRenderer`] with a swapchain. Each frame is
//! rendered into the off-screen frame target at the size chosen at start-up,
//! then blitted (scaled) onto the acquired swapchain image. Only one frame is
//! in flight.
//!
//! # Resource destruction order
//!
//! Fields are declared in drop order: sync objects, the swapchain, then the
//! deferred renderer whose [`GpuContext`] releases the surface, device and
//! instance last. [`Drop`] waits for the device first.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use renderer_platform::Window;
use renderer_resources::Model;
use renderer_rhi::command::CommandBuffer;
use renderer_rhi::device::Device;
use renderer_rhi::swapchain::Swapchain;
use renderer_rhi::sync::{FrameSync, Semaphore};
use renderer_rhi::{RhiError, RhiResult};
use renderer_scene::{Camera, DrawMode, ModelId, SceneObject};

use crate::context::GpuContext;
use crate::deferred::{DeferredRenderer, RendererConfig};
use crate::depth::DepthRangeError;
use crate::export::{ExportError, ExportReport};
use crate::plan::FramePlan;

pub struct Renderer {
    /// One per swapchain image, signalled by the submit and waited on by
    /// the present of that image.
    render_finished: Vec<Semaphore>,
    sync: FrameSync,
    cmd: CommandBuffer,
    swapchain: Swapchain,
    deferred: DeferredRenderer,

    framebuffer_resized: bool,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Sets up Vulkan against `window`, builds the deferred path at the
    /// window's current size and creates the swapchain.
    pub fn new(window: &Window, validation: bool, config: &RendererConfig) -> RhiResult<Self> {
        let (width, height) = (window.width(), window.height());
        info!("Initializing renderer ({}x{})", width, height);

        let context = GpuContext::windowed(window, validation)?;
        let deferred = DeferredRenderer::new(context, width, height, config)?;

        let context = deferred.context();
        let surface = context
            .surface()
            .ok_or_else(|| RhiError::SurfaceError("Context has no surface".to_string()))?;
        let swapchain = Swapchain::new(
            context.instance(),
            context.device().clone(),
            surface.handle(),
            surface.loader(),
            width,
            height,
        )?;

        let device = context.device().clone();
        let cmd = context.command_pool().allocate()?;
        let sync = FrameSync::new(device.clone())?;
        let render_finished = Self::create_present_semaphores(&device, swapchain.image_count())?;

        info!(
            "Renderer ready: {} swapchain images, format {:?}",
            swapchain.image_count(),
            swapchain.format()
        );

        Ok(Self {
            render_finished,
            sync,
            cmd,
            swapchain,
            deferred,
            framebuffer_resized: false,
            width,
            height,
        })
    }

    fn create_present_semaphores(device: &Arc<Device>, count: u32) -> RhiResult<Vec<Semaphore>> {
        (0..count).map(|_| Semaphore::new(device.clone())).collect()
    }

    /// Records a window resize; the swapchain is rebuilt before the next
    /// acquire. The G-buffer keeps its start-up size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if (width, height) != (self.width, self.height) {
            debug!("Resize requested: {}x{} -> {}x{}", self.width, self.height, width, height);
            self.width = width;
            self.height = height;
            self.framebuffer_resized = true;
        }
    }

    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        let context = self.deferred.context();
        let surface = context
            .surface()
            .ok_or_else(|| RhiError::SurfaceError("Context has no surface".to_string()))?;
        self.swapchain
            .recreate(surface.handle(), surface.loader(), self.width, self.height)?;

        // The device is idle after recreate, so no present still waits on
        // the old semaphores.
        self.render_finished =
            Self::create_present_semaphores(context.device(), self.swapchain.image_count())?;
        self.framebuffer_resized = false;
        Ok(())
    }

    /// Renders one frame of `scene` and presents it. Returns `None` when
    /// the swapchain was out of date and the frame was skipped.
    pub fn render_frame(
        &mut self,
        elapsed: f32,
        scene: &[SceneObject],
        camera: &Camera,
    ) -> RhiResult<Option<FramePlan>> {
        // Before the acquire, so a failure leaves image_available unsignalled.
        self.deferred.check_scene(scene)?;

        if self.framebuffer_resized {
            self.recreate_swapchain()?;
        }

        self.sync.in_flight.wait(u64::MAX)?;

        let image_index = match self
            .swapchain
            .acquire_next_image(self.sync.image_available.handle())
        {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire");
                self.recreate_swapchain()?;
                return Ok(None);
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        };
        let render_finished = self
            .render_finished
            .get(image_index as usize)
            .map(Semaphore::handle)
            .ok_or_else(|| RhiError::SwapchainError(format!("No semaphore for image {}", image_index)))?;

        let plan = self.deferred.prepare(elapsed, scene, camera)?;
        self.record(&plan, image_index)?;

        // Reset only once a submit is certain.
        self.sync.in_flight.reset()?;

        let wait_semaphores = [self.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::TRANSFER];
        let command_buffers = [self.cmd.handle()];
        let signal_semaphores = [render_finished];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: cmd was fully recorded above and the fence was reset after
        // its previous submit completed.
        unsafe {
            self.deferred
                .device()
                .submit_graphics(std::slice::from_ref(&submit), self.sync.in_flight.handle())?;
        }
        self.deferred.frame_completed();

        let present_queue = self
            .deferred
            .device()
            .present_queue()
            .ok_or_else(|| RhiError::SwapchainError("Device has no present queue".to_string()))?;
        let should_recreate = match self
            .swapchain
            .present(present_queue, image_index, render_finished)
        {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => true,
            Err(e) => return Err(RhiError::VulkanError(e)),
        };

        if should_recreate || self.framebuffer_resized {
            debug!("Swapchain needs recreation after present");
            self.recreate_swapchain()?;
        }

        Ok(Some(plan))
    }

    /// The deferred passes followed by the blit of the frame target onto
    /// swapchain image `image_index`.
    fn record(&self, plan: &FramePlan, image_index: u32) -> RhiResult<()> {
        let target = self.swapchain.image(image_index)?;
        let frame = self.deferred.frame_target();

        self.cmd.reset()?;
        self.cmd.begin()?;
        self.deferred.record(&self.cmd, plan)?;

        self.cmd.transition_image(
            target,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        self.cmd.blit_color(
            frame.color().handle(),
            frame.extent(),
            target,
            self.swapchain.extent(),
        );
        self.cmd.transition_image(
            target,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        self.cmd.end()
    }

    pub fn add_model(&mut self, model: &Model) -> RhiResult<ModelId> {
        self.deferred.add_model(model)
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        self.deferred.set_draw_mode(mode);
    }

    #[inline]
    pub fn draw_mode(&self) -> DrawMode {
        self.deferred.draw_mode()
    }

    pub fn set_perspective(&mut self, near: f32, far: f32) -> Result<(), DepthRangeError> {
        self.deferred.set_perspective(near, far)
    }

    pub fn toggle_light_animation(&mut self) -> bool {
        self.deferred.toggle_light_animation()
    }

    pub fn regenerate_lights(&mut self, seed: u64) {
        self.deferred.regenerate_lights(seed);
    }

    /// Exports the last presented frame at the G-buffer's size.
    pub fn export_snapshot(&self, dir: &Path) -> Result<ExportReport, ExportError> {
        let extent = self.deferred.extent();
        self.deferred
            .export_snapshot(extent.width, extent.height, dir)
    }

    #[inline]
    pub fn deferred(&self) -> &DeferredRenderer {
        &self.deferred
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.deferred.context().wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }
        info!("Renderer destroyed");
    }
}
