//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin, owning wrappers over `ash` for what the deferred renderer needs:
//! instance and device setup (windowed or headless), gpu-allocator backed
//! buffers and images, dynamic-rendering pipelines with multiple render
//! targets, descriptors, command recording and the swapchain.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod rendering;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
