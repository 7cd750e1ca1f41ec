//! Error types for the renderer.

use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type used by the viewer binary and by crates that do not
/// need their own error enum.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Model or texture loading errors
    #[error("Resource error: {0}")]
    Resource(String),

    /// Shader module or pipeline creation errors
    #[error("Shader error: {0}")]
    Shader(String),

    /// Snapshot export errors
    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using the renderer's Error type.
pub type Result<T> = std::result::Result<T, Error>;
