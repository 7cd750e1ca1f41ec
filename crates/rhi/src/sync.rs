//! Semaphores, fences and the per-frame set used by the presenter.
//!
//! The deferred path renders into single G-buffer and frame-target images,
//! so only one frame is ever in flight: [`FrameSync`] is a single set.
//! Render-finished semaphores are per swapchain image and live with the
//! presenter, since a present may still be waiting on one when the next
//! frame is submitted.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        // SAFETY: valid create info on a live device.
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device before dropping sync objects.
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        // SAFETY: valid create info on a live device.
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until signaled or `timeout` nanoseconds pass.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        // SAFETY: fence belongs to this device.
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?
        };
        Ok(())
    }

    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: callers only reset fences that are not pending.
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device before dropping sync objects.
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Acquire semaphore and the in-flight fence for one frame.
pub struct FrameSync {
    pub image_available: Semaphore,
    pub in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let sync = Self {
            image_available: Semaphore::new(device.clone())?,
            // Signaled so the first frame does not wait forever.
            in_flight: Fence::new(device, true)?,
        };
        debug!("Created frame synchronization primitives");
        Ok(sync)
    }
}
