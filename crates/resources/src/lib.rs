//! Asset loading for the deferred viewer.
//!
//! - glTF meshes flattened into world-space [`Mesh`]es
//! - base-colour materials and their RGBA8 textures
//! - the model's bounding box and normalization scale

mod error;

pub mod material;
pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use material::{Material, TextureData};
pub use model::{Mesh, Model};
