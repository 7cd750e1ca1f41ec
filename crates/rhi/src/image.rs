//! Device-local 2D images with a single view.
//!
//! Used for every render target the deferred path owns (G-buffer
//! attachments, the depth attachments, the frame target) and for sampled
//! textures. Creation checks that the device can use the format the way
//! the usage flags ask and reports [`RhiError::IncompleteFramebuffer`]
//! otherwise.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use renderer_rhi::device::Device;
//! use renderer_rhi::image::{Image, ImageDesc};
//!
//! # fn example(device: Arc<Device>) -> Result<(), renderer_rhi::RhiError> {
//! let depth = Image::new(device, &ImageDesc::depth_attachment("depth", 1280, 720, vk::Format::D32_SFLOAT))?;
//! assert_eq!(depth.aspect(), vk::ImageAspectFlags::DEPTH);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::command::full_range;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDesc {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
}

impl ImageDesc {
    /// Colour target that is later sampled and copied out for export.
    pub fn color_attachment(name: &'static str, width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            name,
            width,
            height,
            format,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// Depth target that can be sampled and used on both ends of a copy.
    pub fn depth_attachment(name: &'static str, width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            name,
            width,
            height,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::DEPTH,
        }
    }

    pub fn sampled(name: &'static str, width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            name,
            width,
            height,
            format,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    /// Format features the device must report for this usage.
    pub fn required_features(&self) -> vk::FormatFeatureFlags {
        let mut features = vk::FormatFeatureFlags::empty();
        if self.usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT) {
            features |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
        }
        if self.usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
            features |= vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        }
        if self.usage.contains(vk::ImageUsageFlags::SAMPLED) {
            features |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
        }
        if self.usage.contains(vk::ImageUsageFlags::TRANSFER_SRC) {
            features |= vk::FormatFeatureFlags::TRANSFER_SRC;
        }
        if self.usage.contains(vk::ImageUsageFlags::TRANSFER_DST) {
            features |= vk::FormatFeatureFlags::TRANSFER_DST;
        }
        features
    }

    fn validate(&self) -> RhiResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RhiError::IncompleteFramebuffer(format!(
                "{}: extent {}x{} has a zero dimension",
                self.name, self.width, self.height
            )));
        }
        Ok(())
    }
}

pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    desc: ImageDesc,
}

impl Image {
    pub fn new(device: Arc<Device>, desc: &ImageDesc) -> RhiResult<Self> {
        desc.validate()?;
        if !device.supports_format(desc.format, desc.required_features()) {
            return Err(RhiError::IncompleteFramebuffer(format!(
                "{}: format {:?} does not support {:?}",
                desc.name, desc.format, desc.usage
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        // SAFETY: valid create info on a live device.
        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: desc.name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| {
                    RhiError::IncompleteFramebuffer(format!("{}: allocation failed: {}", desc.name, e))
                })
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: the image was never bound or used.
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        // SAFETY: fresh allocation sized from this image's requirements.
        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(full_range(desc.aspect));
        // SAFETY: image is bound to memory and the range matches its creation.
        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created image {}: {}x{} ({:?})",
            desc.name, desc.width, desc.height, desc.format
        );

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            desc: desc.clone(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.desc.aspect
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.desc.name
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // SAFETY: owners wait for the GPU before dropping images; the view
        // goes before the image, the image before its memory.
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free image allocation: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Leaking image allocation: {}", e),
            }
        }
        debug!("Destroyed image {}", self.desc.name);
    }
}

/// Bytes per texel for the formats the renderer reads back.
pub fn texel_size(format: vk::Format) -> Option<usize> {
    match format {
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::D32_SFLOAT => Some(4),
        vk::Format::R16G16B16A16_SFLOAT => Some(8),
        vk::Format::R32G32B32A32_SFLOAT => Some(16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_extent_is_incomplete() {
        let desc = ImageDesc::color_attachment("position", 0, 600, vk::Format::R16G16B16A16_SFLOAT);
        assert!(matches!(
            desc.validate(),
            Err(RhiError::IncompleteFramebuffer(_))
        ));
        assert!(ImageDesc::color_attachment("position", 800, 600, vk::Format::R16G16B16A16_SFLOAT)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_required_features_follow_usage() {
        let color = ImageDesc::color_attachment("albedo", 4, 4, vk::Format::R8G8B8A8_UNORM);
        let features = color.required_features();
        assert!(features.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT));
        assert!(features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE));
        assert!(!features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT));

        let depth = ImageDesc::depth_attachment("depth", 4, 4, vk::Format::D32_SFLOAT);
        assert_eq!(depth.aspect, vk::ImageAspectFlags::DEPTH);
        assert!(depth
            .required_features()
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT | vk::FormatFeatureFlags::TRANSFER_DST));
    }

    #[test]
    fn test_texel_sizes() {
        assert_eq!(texel_size(vk::Format::R16G16B16A16_SFLOAT), Some(8));
        assert_eq!(texel_size(vk::Format::D32_SFLOAT), Some(4));
        assert_eq!(texel_size(vk::Format::BC1_RGB_UNORM_BLOCK), None);
    }
}
