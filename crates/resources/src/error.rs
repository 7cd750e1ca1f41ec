//! Error types for resource loading.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to load glTF file '{path}': {source}")]
    GltfLoad {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("glTF file '{0}' contains no triangle meshes")]
    NoMeshes(PathBuf),

    #[error("Mesh '{0}' has no position data")]
    NoPositionData(String),

    #[error("Unsupported texture format {format:?} in image {index}")]
    UnsupportedTextureFormat { index: usize, format: gltf::image::Format },

    #[error("Texture {index} has {actual} bytes, expected {expected}")]
    TextureSize {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

pub type ResourceResult<T> = Result<T, ResourceError>;
