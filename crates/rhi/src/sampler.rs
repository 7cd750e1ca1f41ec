//! Samplers.
//!
//! G-buffer reads use nearest filtering so every fragment fetches exactly
//! its own texel; material textures use linear filtering with repeat.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerKind {
    /// Nearest, clamp to edge.
    Attachment,
    /// Linear, repeat.
    Material,
}

impl SamplerKind {
    fn create_info(self) -> vk::SamplerCreateInfo<'static> {
        let (filter, address_mode) = match self {
            SamplerKind::Attachment => (vk::Filter::NEAREST, vk::SamplerAddressMode::CLAMP_TO_EDGE),
            SamplerKind::Material => (vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT),
        };
        vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(0.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
    }
}

pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    pub fn new(device: Arc<Device>, kind: SamplerKind) -> RhiResult<Self> {
        let create_info = kind.create_info();
        // SAFETY: valid create info on a live device.
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        // SAFETY: descriptor sets referencing the sampler are not in flight.
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_sampler_is_nearest_clamped() {
        let info = SamplerKind::Attachment.create_info();
        assert_eq!(info.mag_filter, vk::Filter::NEAREST);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);

        let info = SamplerKind::Material.create_info();
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::REPEAT);
    }
}
