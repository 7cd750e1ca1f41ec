//! Sampled RGBA8 textures uploaded through a staging buffer.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc};

pub struct Texture {
    image: Image,
}

impl Texture {
    /// Uploads tightly packed RGBA8 `pixels` and leaves the image in
    /// SHADER_READ_ONLY_OPTIMAL.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        name: &'static str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        let expected = rgba8_len(width, height);
        if pixels.len() != expected {
            return Err(RhiError::InvalidHandle(format!(
                "Texture {} expects {} bytes for {}x{}, got {}",
                name,
                expected,
                width,
                height,
                pixels.len()
            )));
        }

        let image = Image::new(
            device.clone(),
            &ImageDesc::sampled(name, width, height, vk::Format::R8G8B8A8_UNORM),
        )?;
        let staging = Buffer::new_with_data(device, BufferUsage::Staging, pixels)?;

        pool.one_shot(|cmd| {
            cmd.transition_image(
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            cmd.copy_buffer_to_image(staging.handle(), image.handle(), image.extent());
            cmd.transition_image(
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
            Ok(())
        })?;

        debug!("Uploaded texture {} ({}x{})", name, width, height);
        Ok(Self { image })
    }

    /// 1x1 texture of a single colour, bound when a material has none.
    pub fn solid(device: Arc<Device>, pool: &CommandPool, rgba: [u8; 4]) -> RhiResult<Self> {
        Self::from_rgba8(device, pool, "solid_texture", 1, 1, &rgba)
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

fn rgba8_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_len() {
        assert_eq!(rgba8_len(1, 1), 4);
        assert_eq!(rgba8_len(256, 128), 256 * 128 * 4);
    }
}
