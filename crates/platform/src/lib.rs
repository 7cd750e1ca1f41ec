//! Platform layer for the deferred viewer.
//!
//! - Window creation via winit
//! - Keyboard and mouse state
//! - Vulkan surface creation from the window's raw handles

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};

pub use winit::event::{DeviceEvent, Event, WindowEvent};
pub use winit::event_loop::EventLoop;
