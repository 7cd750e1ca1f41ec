//! Scene-side state for the deferred renderer.
//!
//! - Object transforms and the explicit transform stack
//! - Camera and the free-fly controller
//! - Point lights, the seeded light set and its orbit animation
//! - The draw-mode state machine

pub mod camera;
pub mod controller;
pub mod draw_mode;
pub mod light;
pub mod light_set;
pub mod object;
pub mod transform;
pub mod transform_stack;

pub use camera::{Camera, Projection};
pub use controller::{CameraPreset, FpsController, MoveInput};
pub use draw_mode::DrawMode;
pub use light::PointLight;
pub use light_set::LightSet;
pub use object::{ModelId, SceneObject};
pub use transform::Transform;
pub use transform_stack::TransformStack;
