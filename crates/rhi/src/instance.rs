//! Vulkan instance, validation layer and debug messenger.
//!
//! The instance is created either for a window (surface extensions taken
//! from the display handle) or headless, for off-screen rendering and tests.
//!
//! # Example
//!
//! ```no_run
//! use renderer_rhi::instance::Instance;
//!
//! // Headless: no surface extensions are requested.
//! let instance = Instance::new(cfg!(debug_assertions), None)?;
//! assert!(!instance.has_surface_support());
//! # Ok::<(), renderer_rhi::RhiError>(())
//! ```

use std::ffi::{c_char, CStr};

use ash::{Entry, vk};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    surface_support: bool,
}

impl Instance {
    /// Creates a Vulkan 1.3 instance.
    ///
    /// With `display` set, the surface extensions that display needs are
    /// enabled; with `None` the instance can only render off-screen.
    /// Validation is best-effort: a missing layer logs a warning.
    pub fn new(enable_validation: bool, display: Option<RawDisplayHandle>) -> RhiResult<Self> {
        // SAFETY: loading the system Vulkan library has no preconditions
        // beyond the library itself being well-behaved.
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && is_validation_layer_available(&entry)?;
        if enable_validation && !validation {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Deferred Viewer")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"renderer")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extensions = get_required_extensions(display)?;
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: every pointer in create_info borrows locals that outlive
        // the call.
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let mode = surface_mode(display.as_ref());
        info!(
            "Vulkan instance created ({} extension(s), {})",
            extensions.len(),
            mode
        );

        let (debug_utils, debug_messenger) = if validation {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = setup_debug_messenger(&debug_utils)?;
            info!("Validation layers enabled");
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            surface_support: display.is_some(),
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Whether surface extensions were enabled at creation.
    #[inline]
    pub fn has_surface_support(&self) -> bool {
        self.surface_support
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: all child objects (devices, surfaces) are dropped before
        // the instance by their owners.
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Instance extensions needed to present to `display`, or none when headless.
pub fn get_required_extensions(display: Option<RawDisplayHandle>) -> RhiResult<Vec<*const c_char>> {
    let Some(display) = display else {
        return Ok(Vec::new());
    };
    let extensions = ash_window::enumerate_required_extensions(display)
        .map_err(|e| RhiError::SurfaceError(format!("Unsupported display: {}", e)))?;
    debug!("Display requires {} surface extension(s)", extensions.len());
    Ok(extensions.to_vec())
}

fn surface_mode(display: Option<&RawDisplayHandle>) -> &'static str {
    if display.is_some() { "windowed" } else { "headless" }
}

fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
    // SAFETY: plain enumeration on a loaded entry.
    let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };

    Ok(available_layers.iter().any(|layer| {
        // SAFETY: the driver fills layer_name with a nul-terminated string.
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    }))
}

fn setup_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> RhiResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    // SAFETY: the callback is a plain function with 'static lifetime.
    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
    Ok(messenger)
}

/// Routes validation messages into `tracing`.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid (or null) callback data pointer.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[Vulkan {}] {}", kind, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[Vulkan {}] {}", kind, message),
        _ => debug!("[Vulkan {}] {}", kind, message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_mode() {
        let web = RawDisplayHandle::Web(raw_window_handle::WebDisplayHandle::new());
        assert_eq!(surface_mode(None), "headless");
        assert_eq!(surface_mode(Some(&web)), "windowed");
    }

    #[test]
    fn test_headless_requires_no_extensions() {
        let extensions = get_required_extensions(None).unwrap();
        assert!(extensions.is_empty());
    }

    #[test]
    fn test_headless_instance_creation() {
        match Instance::new(false, None) {
            Ok(instance) => {
                assert!(!instance.has_validation());
                assert!(!instance.has_surface_support());
            }
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => {
                // A loader without any ICD fails at instance creation.
                eprintln!("Skipping test: instance creation failed: {}", e);
            }
        }
    }
}
