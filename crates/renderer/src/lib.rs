//! Deferred shading renderer.
//!
//! - [`pipeline`] and [`plan`]: the per-frame pass sequence, GPU-free
//! - [`deferred`]: executes a plan against the G-buffer and frame target
//! - [`renderer`]: swapchain presentation for the windowed viewer
//! - [`export`]: JPEG snapshots of every G-buffer channel and the final image

pub mod context;
pub mod deferred;
pub mod depth;
pub mod export;
pub mod frame_target;
pub mod gbuffer;
pub mod geometry;
pub mod mesh;
pub mod pipeline;
pub mod plan;
pub mod programs;
pub mod renderer;
pub mod ubo;

pub use context::GpuContext;
pub use deferred::{DeferredRenderer, RendererConfig};
pub use depth::{DepthRange, DepthRangeError};
pub use export::{ExportError, ExportReport};
pub use gbuffer::{GBufferChannel, GBufferLayout};
pub use pipeline::DeferredPipeline;
pub use plan::{FramePlan, Pass, RenderTarget, ShadingProgram};
pub use renderer::Renderer;
