//! Swapchain creation, acquisition and presentation.
//!
//! Swapchain images are blit destinations: the renderer draws into its own
//! off-screen frame target and copies the result here, so images are
//! created with `TRANSFER_DST` usage alongside `COLOR_ATTACHMENT`.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        // SAFETY: surface and physical device come from the same instance.
        let (capabilities, formats, present_modes) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?,
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            )
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, min images {}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let (swapchain, images, format, extent) = create_swapchain(
            &device,
            &swapchain_loader,
            surface,
            surface_loader,
            width,
            height,
            vk::SwapchainKHR::null(),
        )?;
        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            format,
            extent,
        })
    }

    /// Rebuilds for a new window size, reusing the old swapchain as the
    /// creation hint. Waits for the device first.
    pub fn recreate(
        &mut self,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> RhiResult<()> {
        self.device.wait_idle()?;
        info!("Recreating swapchain for {}x{}", width, height);

        let old = self.swapchain;
        let (swapchain, images, format, extent) = create_swapchain(
            &self.device,
            &self.swapchain_loader,
            surface,
            surface_loader,
            width,
            height,
            old,
        )?;

        // SAFETY: the device is idle so no image of the old swapchain is in use.
        unsafe {
            self.swapchain_loader.destroy_swapchain(old, None);
        }

        self.swapchain = swapchain;
        self.images = images;
        self.format = format;
        self.extent = extent;
        Ok(())
    }

    /// Returns `(image_index, suboptimal)`.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        // SAFETY: semaphore is unsignaled and owned by the caller's frame sync.
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Returns `true` when the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: image_index came from acquire_next_image on this swapchain.
        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn image(&self, index: u32) -> RhiResult<vk::Image> {
        self.images.get(index as usize).copied().ok_or_else(|| {
            RhiError::SwapchainError(format!(
                "Image index {} out of range ({} images)",
                index,
                self.images.len()
            ))
        })
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device before dropping the swapchain.
        unsafe {
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }
        info!(
            "Swapchain destroyed (was {}x{})",
            self.extent.width, self.extent.height
        );
    }
}

fn create_swapchain(
    device: &Device,
    loader: &ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    width: u32,
    height: u32,
    old_swapchain: vk::SwapchainKHR,
) -> RhiResult<(vk::SwapchainKHR, Vec<vk::Image>, vk::Format, vk::Extent2D)> {
    let support = SwapchainSupportDetails::query(device.physical_device(), surface, surface_loader)?;
    if !support.is_adequate() {
        return Err(RhiError::SwapchainError(
            "Surface reports no formats or present modes".to_string(),
        ));
    }

    let surface_format = choose_surface_format(&support.formats)?;
    let present_mode = choose_present_mode(&support.present_modes);
    let extent = choose_extent(&support.capabilities, width, height);
    let image_count = determine_image_count(&support.capabilities);

    if !support
        .capabilities
        .supported_usage_flags
        .contains(vk::ImageUsageFlags::TRANSFER_DST)
    {
        return Err(RhiError::SwapchainError(
            "Surface images cannot be blit destinations".to_string(),
        ));
    }

    let families = device.queue_families();
    let graphics_family = device.graphics_family();
    let present_family = families.present_family.ok_or_else(|| {
        RhiError::SwapchainError("Device was created without a present queue".to_string())
    })?;
    let family_indices = [graphics_family, present_family];
    let (sharing_mode, shared_families) = if graphics_family != present_family {
        (vk::SharingMode::CONCURRENT, &family_indices[..])
    } else {
        (vk::SharingMode::EXCLUSIVE, &[][..])
    };

    info!(
        "Creating swapchain: {}x{}, {:?}, {:?}, {} images",
        extent.width, extent.height, surface_format.format, present_mode, image_count
    );

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(shared_families)
        .pre_transform(support.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);

    // SAFETY: create info references locals alive for the call.
    let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
    // SAFETY: swapchain was just created by this loader.
    let images = unsafe { loader.get_swapchain_images(swapchain)? };

    Ok((swapchain, images, surface_format.format, extent))
}

/// Prefers UNORM so the blit copies frame-target bytes unchanged.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    let preferred = [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM];
    for wanted in preferred {
        if let Some(format) = formats.iter().find(|f| {
            f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        }) {
            return Ok(*format);
        }
    }

    let first = formats
        .first()
        .copied()
        .ok_or_else(|| RhiError::SwapchainError("No surface formats".to_string()))?;
    warn!("Using first available surface format: {:?}", first.format);
    Ok(first)
}

/// FIFO is the vsync'd mode every implementation supports.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }
    vk::PresentModeKHR::FIFO
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_prefers_unorm_format() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::B8G8R8A8_UNORM
        );

        let only_srgb = [surface_format(vk::Format::B8G8R8A8_SRGB)];
        assert_eq!(
            choose_surface_format(&only_srgb).unwrap().format,
            vk::Format::B8G8R8A8_SRGB
        );
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn test_extent_clamped_when_undefined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 4096, 600);
        assert_eq!((extent.width, extent.height), (1024, 600));
    }

    #[test]
    fn test_image_count_respects_max() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 2);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unbounded), 3);
    }
}
