//! The default framebuffer: a persistent off-screen colour and depth pair.
//!
//! Shading and light-volume passes draw here; the windowed renderer blits
//! the colour image to the swapchain, and export reads it back. Every frame
//! leaves the colour image in TRANSFER_SRC_OPTIMAL.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use renderer_rhi::RhiResult;
use renderer_rhi::command::CommandPool;
use renderer_rhi::device::Device;
use renderer_rhi::image::{Image, ImageDesc};

use crate::gbuffer::read_image;

pub const FRAME_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
pub const FRAME_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub struct FrameTarget {
    color: Image,
    depth: Image,
}

impl FrameTarget {
    pub fn allocate(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        let color = Image::new(
            device.clone(),
            &ImageDesc::color_attachment("frame_color", width, height, FRAME_COLOR_FORMAT),
        )?;
        let depth = Image::new(
            device,
            &ImageDesc::depth_attachment("frame_depth", width, height, FRAME_DEPTH_FORMAT),
        )?;
        info!("Frame target allocated: {}x{}", width, height);
        Ok(Self { color, depth })
    }

    #[inline]
    pub fn color(&self) -> &Image {
        &self.color
    }

    #[inline]
    pub fn depth(&self) -> &Image {
        &self.depth
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.color.extent()
    }

    /// RGBA8 pixels, top row first.
    pub fn read_color(&self, device: Arc<Device>, pool: &CommandPool) -> RhiResult<Vec<u8>> {
        let extent = self.extent();
        read_image(
            device,
            pool,
            &self.color,
            extent.width as usize * extent.height as usize * 4,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )
    }
}
