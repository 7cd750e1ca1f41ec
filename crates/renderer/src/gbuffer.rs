//! The G-buffer: position, normal, diffuse+specular and depth attachments.
//!
//! Allocated once at init at the framebuffer size and never resized. The
//! three colour attachments are written together by the geometry pass
//! (locations 0, 1, 2) and sampled by the screen-space programs through
//! units 0-3.
//!
//! Position and normal would ideally be three 16-bit float channels, but
//! `R16G16B16_SFLOAT` is not a guaranteed colour-attachment format, so they
//! are stored as RGBA16F with alpha unused.

use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use renderer_rhi::buffer::{Buffer, BufferUsage};
use renderer_rhi::command::CommandPool;
use renderer_rhi::device::Device;
use renderer_rhi::image::{Image, ImageDesc, texel_size};
use renderer_rhi::{RhiError, RhiResult};

/// One attachment of the G-buffer, in texture-unit order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GBufferChannel {
    Position,
    Normal,
    DiffuseSpecular,
    Depth,
}

impl GBufferChannel {
    pub const ALL: [GBufferChannel; 4] = [
        GBufferChannel::Position,
        GBufferChannel::Normal,
        GBufferChannel::DiffuseSpecular,
        GBufferChannel::Depth,
    ];

    pub const COLOR: [GBufferChannel; 3] = [
        GBufferChannel::Position,
        GBufferChannel::Normal,
        GBufferChannel::DiffuseSpecular,
    ];

    pub fn format(self) -> vk::Format {
        match self {
            GBufferChannel::Position | GBufferChannel::Normal => vk::Format::R16G16B16A16_SFLOAT,
            GBufferChannel::DiffuseSpecular => vk::Format::R8G8B8A8_UNORM,
            GBufferChannel::Depth => vk::Format::D32_SFLOAT,
        }
    }

    /// Texture unit (binding in the screen-space descriptor set).
    pub fn unit(self) -> u32 {
        match self {
            GBufferChannel::Position => 0,
            GBufferChannel::Normal => 1,
            GBufferChannel::DiffuseSpecular => 2,
            GBufferChannel::Depth => 3,
        }
    }

    pub fn is_depth(self) -> bool {
        self == GBufferChannel::Depth
    }

    pub fn name(self) -> &'static str {
        match self {
            GBufferChannel::Position => "gbuffer_position",
            GBufferChannel::Normal => "gbuffer_normal",
            GBufferChannel::DiffuseSpecular => "gbuffer_diffuse_specular",
            GBufferChannel::Depth => "gbuffer_depth",
        }
    }

    fn image_desc(self, width: u32, height: u32) -> ImageDesc {
        if self.is_depth() {
            ImageDesc::depth_attachment(self.name(), width, height, self.format())
        } else {
            ImageDesc::color_attachment(self.name(), width, height, self.format())
        }
    }
}

/// Size and attachment description of a G-buffer, without GPU objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBufferLayout {
    pub width: u32,
    pub height: u32,
}

impl GBufferLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn attachments(&self) -> [ImageDesc; 4] {
        GBufferChannel::ALL.map(|channel| channel.image_desc(self.width, self.height))
    }

    /// Formats of the MRT colour targets, in location order.
    pub fn color_formats(&self) -> [vk::Format; 3] {
        GBufferChannel::COLOR.map(GBufferChannel::format)
    }

    pub fn depth_format(&self) -> vk::Format {
        GBufferChannel::Depth.format()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    /// Size in bytes of a tightly packed readback of `channel`.
    pub fn readback_size(&self, channel: GBufferChannel) -> usize {
        let texel = texel_size(channel.format()).unwrap_or(4);
        self.width as usize * self.height as usize * texel
    }
}

pub struct GBuffer {
    layout: GBufferLayout,
    position: Image,
    normal: Image,
    diffuse_specular: Image,
    depth: Image,
}

impl GBuffer {
    /// Creates all four attachments. Fails with
    /// [`RhiError::IncompleteFramebuffer`] on a zero extent, an unsupported
    /// format or a failed allocation.
    pub fn allocate(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        let layout = GBufferLayout::new(width, height);
        let [position, normal, diffuse_specular, depth] = layout.attachments();

        let create = |desc: &ImageDesc| {
            Image::new(device.clone(), desc).inspect_err(|e| {
                error!("G-buffer attachment {} failed: {}", desc.name, e);
            })
        };

        let gbuffer = Self {
            layout,
            position: create(&position)?,
            normal: create(&normal)?,
            diffuse_specular: create(&diffuse_specular)?,
            depth: create(&depth)?,
        };
        info!("G-buffer allocated: {}x{}", width, height);
        Ok(gbuffer)
    }

    #[inline]
    pub fn layout(&self) -> &GBufferLayout {
        &self.layout
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.layout.extent()
    }

    pub fn attachment(&self, channel: GBufferChannel) -> &Image {
        match channel {
            GBufferChannel::Position => &self.position,
            GBufferChannel::Normal => &self.normal,
            GBufferChannel::DiffuseSpecular => &self.diffuse_specular,
            GBufferChannel::Depth => &self.depth,
        }
    }

    pub fn color_attachments(&self) -> [&Image; 3] {
        GBufferChannel::COLOR.map(|channel| self.attachment(channel))
    }

    /// Copies one attachment into host memory.
    ///
    /// The attachment must be in SHADER_READ_ONLY_OPTIMAL (the state every
    /// frame leaves it in) and is returned to it. Blocks until the copy has
    /// executed.
    pub fn read_attachment(
        &self,
        device: Arc<Device>,
        pool: &CommandPool,
        channel: GBufferChannel,
    ) -> RhiResult<Vec<u8>> {
        let image = self.attachment(channel);
        read_image(
            device,
            pool,
            image,
            self.layout.readback_size(channel),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
    }
}

/// Copies `image` out through a readback buffer, moving it from `resting`
/// to TRANSFER_SRC and back around the copy.
pub(crate) fn read_image(
    device: Arc<Device>,
    pool: &CommandPool,
    image: &Image,
    size: usize,
    resting: vk::ImageLayout,
) -> RhiResult<Vec<u8>> {
    if size == 0 {
        return Err(RhiError::InvalidHandle(format!(
            "{}: nothing to read back",
            image.name()
        )));
    }
    let readback = Buffer::new(device, BufferUsage::Readback, size as vk::DeviceSize)?;

    pool.one_shot(|cmd| {
        if resting != vk::ImageLayout::TRANSFER_SRC_OPTIMAL {
            cmd.transition_image(
                image.handle(),
                image.aspect(),
                resting,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            );
        }
        cmd.copy_image_to_buffer(image.handle(), image.aspect(), image.extent(), readback.handle());
        if resting != vk::ImageLayout::TRANSFER_SRC_OPTIMAL {
            cmd.transition_image(
                image.handle(),
                image.aspect(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                resting,
            );
        }
        Ok(())
    })?;

    readback.read_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_has_three_color_and_one_depth() {
        let layout = GBufferLayout::new(800, 600);
        let attachments = layout.attachments();

        let color = attachments
            .iter()
            .filter(|a| a.aspect == vk::ImageAspectFlags::COLOR)
            .count();
        let depth = attachments
            .iter()
            .filter(|a| a.aspect == vk::ImageAspectFlags::DEPTH)
            .count();
        assert_eq!((color, depth), (3, 1));
        assert!(attachments.iter().all(|a| a.width == 800 && a.height == 600));
    }

    #[test]
    fn test_formats() {
        let layout = GBufferLayout::new(4, 4);
        assert_eq!(
            layout.color_formats(),
            [
                vk::Format::R16G16B16A16_SFLOAT,
                vk::Format::R16G16B16A16_SFLOAT,
                vk::Format::R8G8B8A8_UNORM,
            ]
        );
        assert_eq!(layout.depth_format(), vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_units_follow_channel_order() {
        let units: Vec<u32> = GBufferChannel::ALL.iter().map(|c| c.unit()).collect();
        assert_eq!(units, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_readback_sizes() {
        let layout = GBufferLayout::new(10, 2);
        assert_eq!(layout.readback_size(GBufferChannel::Position), 10 * 2 * 8);
        assert_eq!(layout.readback_size(GBufferChannel::DiffuseSpecular), 10 * 2 * 4);
        assert_eq!(layout.readback_size(GBufferChannel::Depth), 10 * 2 * 4);
    }
}
