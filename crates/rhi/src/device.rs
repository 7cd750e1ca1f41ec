//! Vulkan logical device, queues and the gpu-allocator.
//!
//! # Example
//!
//! ```no_run
//! use renderer_rhi::device::Device;
//! use renderer_rhi::instance::Instance;
//! use renderer_rhi::physical_device::select_physical_device;
//!
//! let instance = Instance::new(false, None)?;
//! let info = select_physical_device(instance.handle(), None)?;
//! let device = Device::new(&instance, &info)?;
//! device.wait_idle()?;
//! # Ok::<(), renderer_rhi::RhiError>(())
//! ```

use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Extensions enabled only when the device presents to a surface.
const PRESENT_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Logical device shared through `Arc` by every GPU object.
///
/// The allocator lives behind a `Mutex`; everything else is immutable after
/// creation.
pub struct Device {
    device: ash::Device,
    /// Kept for format and limit queries after creation.
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    /// Dropped by hand before the device; its blocks are freed through it.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: Option<vk::Queue>,
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates the logical device with dynamic rendering and
    /// synchronization2 enabled, plus the swapchain extension when the
    /// selected device has a present queue.
    pub fn new(instance: &Instance, info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let queue_families = info.queue_families;
        let graphics_family = queue_families
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let unique_families = queue_families.unique_families();
        let priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();
        debug!("Creating queue(s) for families: {:?}", unique_families);

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let features = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(info.features.sampler_anisotropy == vk::TRUE);

        let extension_names: Vec<*const std::ffi::c_char> = if queue_families.present_family.is_some()
        {
            PRESENT_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect()
        } else {
            Vec::new()
        };

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_3);

        // SAFETY: info.device was enumerated from this instance; create_info
        // borrows locals that outlive the call.
        let device = unsafe {
            instance
                .handle()
                .create_device(info.device, &create_info, None)?
        };
        info!(
            "Logical device created with {} extension(s)",
            extension_names.len()
        );

        // SAFETY: both families were requested above with one queue each.
        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = queue_families
            .present_family
            .map(|family| unsafe { device.get_device_queue(family, 0) });

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;
        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical_device: info.device,
            properties: info.properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Index of the graphics queue family, used for command pools.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        // Device::new refuses to build without a graphics family.
        self.queue_families.graphics_family.unwrap_or_default()
    }

    #[inline]
    pub fn present_queue(&self) -> Option<vk::Queue> {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Locks the allocator, mapping a poisoned lock to an error.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator.lock().map_err(|_| RhiError::AllocatorPoisoned)
    }

    /// Whether `format` supports `features` with optimal tiling.
    pub fn supports_format(&self, format: vk::Format, features: vk::FormatFeatureFlags) -> bool {
        // SAFETY: query on the physical device this device was created from.
        let props = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        props.optimal_tiling_features.contains(features)
    }

    pub fn wait_idle(&self) -> RhiResult<()> {
        // SAFETY: no external synchronization is required by the caller.
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue.
    ///
    /// # Safety
    ///
    /// Command buffers in `submit_infos` must be fully recorded, and `fence`
    /// (if not null) must be unsignaled and not in use by another submit.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // SAFETY: every resource created from this device holds an Arc to
        // it, so this runs after they are all destroyed.
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device and ash::Instance are function tables; queues and the
// physical device are plain handles; the allocator is behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }

    #[test]
    fn test_present_extensions() {
        assert_eq!(PRESENT_EXTENSIONS, &[ash::khr::swapchain::NAME]);
    }
}
