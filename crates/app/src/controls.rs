//! Key bindings and per-frame camera input.

use std::time::{SystemTime, UNIX_EPOCH};

use renderer_platform::{InputState, KeyCode, MouseButton};
use renderer_scene::{CameraPreset, DrawMode, FpsController, MoveInput};

/// Largest mouse delta applied in one frame, in pixels.
const MAX_MOUSE_DELTA: f32 = 100.0;

/// One-shot commands triggered by a key press.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    SelectMode(DrawMode),
    ToggleLightAnimation,
    RegenerateLights,
    Export,
    LogCamera,
    Preset(CameraPreset),
    Quit,
}

pub fn action_for_key(key: KeyCode) -> Option<Action> {
    let digit = match key {
        KeyCode::Digit1 => Some(1),
        KeyCode::Digit2 => Some(2),
        KeyCode::Digit3 => Some(3),
        KeyCode::Digit4 => Some(4),
        KeyCode::Digit5 => Some(5),
        KeyCode::Digit6 => Some(6),
        _ => None,
    };
    if let Some(n) = digit {
        return DrawMode::from_key_index(n).map(Action::SelectMode);
    }

    let function = match key {
        KeyCode::F1 => Some(1),
        KeyCode::F2 => Some(2),
        KeyCode::F3 => Some(3),
        KeyCode::F4 => Some(4),
        KeyCode::F5 => Some(5),
        KeyCode::F6 => Some(6),
        _ => None,
    };
    if let Some(n) = function {
        return CameraPreset::from_function_key(n).map(Action::Preset);
    }

    match key {
        KeyCode::KeyR => Some(Action::ToggleLightAnimation),
        KeyCode::KeyL => Some(Action::RegenerateLights),
        KeyCode::KeyP => Some(Action::Export),
        KeyCode::KeyO => Some(Action::LogCamera),
        KeyCode::Escape => Some(Action::Quit),
        _ => None,
    }
}

/// Actions for every key pressed since the last frame.
pub fn pending_actions(input: &InputState) -> Vec<Action> {
    BOUND_KEYS
        .iter()
        .filter(|&&key| input.is_key_just_pressed(key))
        .filter_map(|&key| action_for_key(key))
        .collect()
}

const BOUND_KEYS: [KeyCode; 17] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::F1,
    KeyCode::F2,
    KeyCode::F3,
    KeyCode::F4,
    KeyCode::F5,
    KeyCode::F6,
    KeyCode::KeyR,
    KeyCode::KeyL,
    KeyCode::KeyP,
    KeyCode::KeyO,
    KeyCode::Escape,
];

/// WASD movement; either Shift runs.
pub fn move_input(input: &InputState) -> MoveInput {
    MoveInput {
        forward: input.axis(KeyCode::KeyW, KeyCode::KeyS),
        right: input.axis(KeyCode::KeyD, KeyCode::KeyA),
        run: input.is_key_pressed(KeyCode::ShiftLeft) || input.is_key_pressed(KeyCode::ShiftRight),
    }
}

/// Applies one frame of mouse look and movement to `controller`.
///
/// Mouse look is active while the right button is held or the cursor is
/// grabbed. The frame the button goes down is skipped so the delta
/// accumulated before the press does not jerk the view.
pub fn update_controller(
    controller: &mut FpsController,
    input: &InputState,
    cursor_grabbed: bool,
    dt: f32,
) {
    let looking = cursor_grabbed
        || (input.is_mouse_pressed(MouseButton::Right)
            && !input.is_mouse_just_pressed(MouseButton::Right));
    if looking {
        let (dx, dy) = input.mouse_delta();
        controller.rotate(
            dx.clamp(-MAX_MOUSE_DELTA, MAX_MOUSE_DELTA),
            dy.clamp(-MAX_MOUSE_DELTA, MAX_MOUSE_DELTA),
        );
    }
    controller.translate(move_input(input), dt);
}

/// Seconds since the UNIX epoch, used as a fresh light seed.
pub fn unix_time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn test_number_keys_select_modes_in_order() {
        assert_eq!(
            action_for_key(KeyCode::Digit1),
            Some(Action::SelectMode(DrawMode::CompositeLit))
        );
        assert_eq!(
            action_for_key(KeyCode::Digit6),
            Some(Action::SelectMode(DrawMode::DepthOnly))
        );
        assert_eq!(action_for_key(KeyCode::Digit7), None);
    }

    #[test]
    fn test_function_keys_select_presets() {
        assert_eq!(
            action_for_key(KeyCode::F1),
            Some(Action::Preset(CameraPreset::Front))
        );
        assert_eq!(
            action_for_key(KeyCode::F6),
            Some(Action::Preset(CameraPreset::TopDown))
        );
        assert_eq!(action_for_key(KeyCode::F7), None);
    }

    #[test]
    fn test_letter_bindings() {
        assert_eq!(action_for_key(KeyCode::KeyR), Some(Action::ToggleLightAnimation));
        assert_eq!(action_for_key(KeyCode::KeyL), Some(Action::RegenerateLights));
        assert_eq!(action_for_key(KeyCode::KeyP), Some(Action::Export));
        assert_eq!(action_for_key(KeyCode::KeyO), Some(Action::LogCamera));
        assert_eq!(action_for_key(KeyCode::Escape), Some(Action::Quit));
        assert_eq!(action_for_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn test_every_bound_key_has_an_action() {
        assert!(BOUND_KEYS.iter().all(|&key| action_for_key(key).is_some()));
    }

    #[test]
    fn test_pending_actions_only_on_press_edge() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyP);
        assert_eq!(pending_actions(&input), vec![Action::Export]);

        input.begin_frame();
        assert!(pending_actions(&input).is_empty());
    }

    #[test]
    fn test_move_input_with_run() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        input.on_key_pressed(KeyCode::KeyA);
        input.on_key_pressed(KeyCode::ShiftLeft);
        let mv = move_input(&input);
        assert_eq!(mv.forward, 1.0);
        assert_eq!(mv.right, -1.0);
        assert!(mv.run);
    }

    #[test]
    fn test_mouse_look_skips_press_frame() {
        let mut controller = CameraPreset::Back.controller();
        let yaw = controller.yaw();

        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Right);
        input.on_raw_motion(10.0, 0.0);
        update_controller(&mut controller, &input, false, 0.0);
        assert_eq!(controller.yaw(), yaw);

        input.begin_frame();
        input.on_raw_motion(10.0, 0.0);
        update_controller(&mut controller, &input, false, 0.0);
        assert_ne!(controller.yaw(), yaw);
    }

    #[test]
    fn test_movement_scales_with_dt() {
        let mut controller = CameraPreset::Back.controller();
        let start = controller.position;

        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        update_controller(&mut controller, &input, false, 0.5);

        // Back faces +Z at 2 units/s.
        assert!((controller.position - start - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
    }
}
