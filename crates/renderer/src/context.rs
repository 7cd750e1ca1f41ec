//! Vulkan instance, device and upload command pool shared by a renderer,
//! plus the window surface when there is one.

use std::sync::Arc;

use tracing::info;

use renderer_platform::{Surface, Window};
use renderer_rhi::command::CommandPool;
use renderer_rhi::device::Device;
use renderer_rhi::instance::Instance;
use renderer_rhi::physical_device::{PresentTarget, select_physical_device};
use renderer_rhi::{RhiError, RhiResult};

/// Field order is drop order: pool, device, surface, then the instance they
/// were all created from.
pub struct GpuContext {
    pool: CommandPool,
    device: Arc<Device>,
    surface: Option<Surface>,
    instance: Instance,
}

impl GpuContext {
    /// Context without a surface, for offscreen rendering and tests.
    pub fn headless(validation: bool) -> RhiResult<Self> {
        let instance = Instance::new(validation, None)?;
        let info = select_physical_device(instance.handle(), None)?;
        let device = Device::new(&instance, &info)?;
        info!("Headless GPU context ready");
        Self::assemble(instance, None, device)
    }

    /// Context presenting to `window`. The selected GPU must be able to
    /// present to the window's surface.
    pub fn windowed(window: &Window, validation: bool) -> RhiResult<Self> {
        let display = window
            .raw_display_handle()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(validation, Some(display))?;
        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let info = select_physical_device(
            instance.handle(),
            Some(PresentTarget {
                surface: surface.handle(),
                loader: surface.loader(),
            }),
        )?;
        let device = Device::new(&instance, &info)?;
        info!("Windowed GPU context ready");
        Self::assemble(instance, Some(surface), device)
    }

    fn assemble(instance: Instance, surface: Option<Surface>, device: Arc<Device>) -> RhiResult<Self> {
        let pool = CommandPool::new(device.clone(), device.graphics_family())?;
        Ok(Self {
            pool,
            device,
            surface,
            instance,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// `None` for headless contexts.
    #[inline]
    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    #[inline]
    pub fn command_pool(&self) -> &CommandPool {
        &self.pool
    }

    pub fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}
