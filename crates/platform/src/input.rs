//! Keyboard and mouse state.
//!
//! Window events are fed in as they arrive; the viewer reads the state once
//! per frame and then calls [`InputState::begin_frame`] to clear the edge
//! triggered sets.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            winit::event::MouseButton::Back => MouseButton::Other(3),
            winit::event::MouseButton::Forward => MouseButton::Other(4),
            winit::event::MouseButton::Other(n) => MouseButton::Other(n),
        }
    }
}

#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,

    pressed_buttons: HashSet<MouseButton>,
    just_pressed_buttons: HashSet<MouseButton>,

    cursor_position: Option<(f32, f32)>,
    /// Accumulated since the last `begin_frame`.
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the per-frame state. Held keys and buttons are kept.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.just_pressed_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        // Key repeat arrives as another press; only the first one is an edge.
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        if self.pressed_buttons.insert(button) {
            self.just_pressed_buttons.insert(button);
        }
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Cursor moved inside the window. The first position after focus only
    /// seeds the tracker and produces no delta.
    pub fn on_cursor_moved(&mut self, x: f32, y: f32) {
        if let Some((old_x, old_y)) = self.cursor_position {
            self.mouse_delta.0 += x - old_x;
            self.mouse_delta.1 += y - old_y;
        }
        self.cursor_position = Some((x, y));
    }

    pub fn on_cursor_left(&mut self) {
        self.cursor_position = None;
    }

    /// Raw device motion, used while the cursor is grabbed.
    pub fn on_raw_motion(&mut self, dx: f32, dy: f32) {
        self.mouse_delta.0 += dx;
        self.mouse_delta.1 += dy;
    }

    /// Drops every held key and button, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.pressed_keys.clear();
        self.pressed_buttons.clear();
        self.cursor_position = None;
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_mouse_just_pressed(&self, button: MouseButton) -> bool {
        self.just_pressed_buttons.contains(&button)
    }

    /// `1.0` when only `positive` is held, `-1.0` when only `negative` is
    /// held, `0.0` otherwise.
    pub fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        match (self.is_key_pressed(positive), self.is_key_pressed(negative)) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_pressed_only_on_first_press() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyR);
        assert!(input.is_key_just_pressed(KeyCode::KeyR));

        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyR); // auto-repeat
        assert!(input.is_key_pressed(KeyCode::KeyR));
        assert!(!input.is_key_just_pressed(KeyCode::KeyR));

        input.on_key_released(KeyCode::KeyR);
        assert!(input.is_key_just_released(KeyCode::KeyR));
        assert!(!input.is_key_pressed(KeyCode::KeyR));
    }

    #[test]
    fn test_mouse_delta_accumulates_until_begin_frame() {
        let mut input = InputState::new();
        input.on_cursor_moved(10.0, 10.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));

        input.on_cursor_moved(15.0, 8.0);
        input.on_cursor_moved(20.0, 9.0);
        assert_eq!(input.mouse_delta(), (10.0, -1.0));

        input.on_raw_motion(1.0, 1.0);
        assert_eq!(input.mouse_delta(), (11.0, 0.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_axis() {
        let mut input = InputState::new();
        assert_eq!(input.axis(KeyCode::KeyW, KeyCode::KeyS), 0.0);
        input.on_key_pressed(KeyCode::KeyS);
        assert_eq!(input.axis(KeyCode::KeyW, KeyCode::KeyS), -1.0);
        input.on_key_pressed(KeyCode::KeyW);
        assert_eq!(input.axis(KeyCode::KeyW, KeyCode::KeyS), 0.0);
    }

    #[test]
    fn test_release_all() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::ShiftLeft);
        input.on_mouse_pressed(MouseButton::Right);
        input.release_all();
        assert!(!input.is_key_pressed(KeyCode::ShiftLeft));
        assert!(!input.is_mouse_pressed(MouseButton::Right));
    }
}
