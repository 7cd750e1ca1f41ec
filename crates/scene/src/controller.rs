//! Free-fly first-person camera controller and the stored viewpoints.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::camera::{yaw_pitch_rotation, Camera};

/// Pitch is clamped to ±0.47π so the view never reaches the poles.
pub const PITCH_LIMIT: f32 = 0.47 * PI;
/// Movement multiplier while the run key is held.
pub const RUN_MULTIPLIER: f32 = 3.0;

/// Per-frame movement request, in camera-relative axes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveInput {
    /// +1 forward, -1 backward.
    pub forward: f32,
    /// +1 right, -1 left.
    pub right: f32,
    pub run: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FpsController {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Radians per unit of mouse motion.
    pub turn_speed: f32,
}

impl Default for FpsController {
    fn default() -> Self {
        CameraPreset::Front.controller()
    }
}

impl FpsController {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut controller = Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            move_speed: 2.0,
            turn_speed: 0.002,
        };
        controller.set_orientation(yaw, pitch);
        controller
    }

    pub fn with_speeds(mut self, move_speed: f32, turn_speed: f32) -> Self {
        self.move_speed = move_speed;
        self.turn_speed = turn_speed;
        self
    }

    /// Horizontal angle in `[0, 2π)`.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Vertical angle in `[-PITCH_LIMIT, PITCH_LIMIT]`.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw.rem_euclid(TAU);
        if self.yaw >= TAU {
            self.yaw = 0.0;
        }
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Applies mouse motion. Moving right turns right, moving down looks down.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.set_orientation(
            self.yaw - self.turn_speed * dx,
            self.pitch - self.turn_speed * dy,
        );
    }

    /// View direction `(cos p·sin y, sin p, cos p·cos y)`.
    pub fn direction(&self) -> Vec3 {
        let (sin_y, cos_y) = self.yaw.sin_cos();
        let (sin_p, cos_p) = self.pitch.sin_cos();
        Vec3::new(cos_p * sin_y, sin_p, cos_p * cos_y)
    }

    pub fn right(&self) -> Vec3 {
        self.direction().cross(Vec3::Y)
    }

    /// Moves along the view direction and the horizontal right vector.
    pub fn translate(&mut self, input: MoveInput, dt: f32) {
        let speed = self.move_speed * if input.run { RUN_MULTIPLIER } else { 1.0 };
        let step = (self.direction() * input.forward + self.right() * input.right) * speed * dt;
        self.position += step;
    }

    pub fn apply_preset(&mut self, preset: CameraPreset) {
        let (position, yaw, pitch) = preset.pose();
        self.position = position;
        self.set_orientation(yaw, pitch);
    }

    /// Writes position and orientation into `camera`; projection is untouched.
    pub fn update_camera(&self, camera: &mut Camera) {
        camera.position = self.position;
        camera.rotation = yaw_pitch_rotation(self.yaw, self.pitch);
    }
}

/// Stored viewpoints bound to F1-F6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraPreset {
    Front,
    FrontHigh,
    Back,
    BackCorner,
    BackCornerHigh,
    TopDown,
}

impl CameraPreset {
    pub const ALL: [CameraPreset; 6] = [
        CameraPreset::Front,
        CameraPreset::FrontHigh,
        CameraPreset::Back,
        CameraPreset::BackCorner,
        CameraPreset::BackCornerHigh,
        CameraPreset::TopDown,
    ];

    /// Preset for function key `F<n>`, `n` in 1..=6.
    pub fn from_function_key(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    /// `(position, yaw, pitch)`.
    pub fn pose(self) -> (Vec3, f32, f32) {
        match self {
            CameraPreset::Front => (Vec3::new(-0.16, -2.0, 6.666), PI, 0.0),
            CameraPreset::FrontHigh => (Vec3::new(-0.95, 0.45, 6.5), 2.95, -0.175),
            CameraPreset::Back => (Vec3::new(-0.16, -2.0, -6.1), 0.0, 0.0),
            CameraPreset::BackCorner => (Vec3::new(2.7251, -2.1234, -6.0708), 5.4352, -0.0145),
            CameraPreset::BackCornerHigh => (Vec3::new(2.4234, 0.2537, -6.2569), 5.8524, -0.1485),
            CameraPreset::TopDown => (Vec3::new(0.0, 5.15, 0.45), PI * 1.5, -1.4665),
        }
    }

    pub fn controller(self) -> FpsController {
        let (position, yaw, pitch) = self.pose();
        FpsController::new(position, yaw, pitch)
    }
}
