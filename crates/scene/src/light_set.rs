//! Seeded pool of point lights with a shared orbit about the +Y axis.
//!
//! Lights are generated once from a seed and keep their rest positions;
//! animation only changes a single rotation angle that is applied when
//! positions are read back with [`LightSet::render_positions`].

use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::light::PointLight;

/// Falloff distance shared by every generated light.
pub const LIGHT_RADIUS: f32 = 3.5;
/// Falloff coefficient shared by every generated light.
pub const LIGHT_ATTENUATION: f32 = 8.0;
/// Radians added per animated frame.
pub const ROTATION_STEP: f32 = 0.005;
pub const DEFAULT_WORLD_SCALE: f32 = 6.0;
pub const DEFAULT_SEED: u64 = 1100;

/// Stretches the generation cube into a room: wide on x/z, low on y.
const AXIS_SCALE: Vec3 = Vec3::new(1.7, 0.9, 1.7);
/// Lower bound of every colour channel.
const COLOR_MIN: f32 = 0.6;

#[derive(Debug, Clone)]
pub struct LightSet {
    lights: Vec<PointLight>,
    seed: u64,
    world_scale: f32,
    angle: f32,
    animating: bool,
}

impl LightSet {
    /// Derives `count` lights from `seed`.
    ///
    /// The same `seed`, `count` and `world_scale` always produce the same
    /// lights, bit for bit, with the pinned `rand` version.
    pub fn generate(seed: u64, count: usize, world_scale: f32) -> Self {
        let lights = generate_lights(seed, count, world_scale);
        debug!(
            "Generated {} lights from seed {} (world scale {})",
            count, seed, world_scale
        );
        Self {
            lights,
            seed,
            world_scale,
            angle: 0.0,
            animating: false,
        }
    }

    /// Replaces every light with a fresh set from `seed`.
    ///
    /// The count is fixed for the lifetime of the set; the rotation angle and
    /// animation toggle are kept.
    pub fn regenerate(&mut self, seed: u64) {
        self.lights = generate_lights(seed, self.lights.len(), self.world_scale);
        self.seed = seed;
        debug!("Regenerated {} lights from seed {}", self.lights.len(), seed);
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn world_scale(&self) -> f32 {
        self.world_scale
    }

    /// Current shared rotation, always in `[0, 2π)`.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Lights at their un-rotated rest positions.
    pub fn rest_lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn set_animation_enabled(&mut self, enabled: bool) {
        self.animating = enabled;
    }

    /// Flips the animation toggle and returns the new state.
    pub fn toggle_animation(&mut self) -> bool {
        self.animating = !self.animating;
        self.animating
    }

    /// Advances the orbit by one fixed [`ROTATION_STEP`] when animating.
    pub fn advance_animation(&mut self) {
        self.advance_animation_by(ROTATION_STEP);
    }

    /// Advances the orbit by `radians` when animating; no-op otherwise.
    pub fn advance_animation_by(&mut self, radians: f32) {
        if !self.animating {
            return;
        }
        self.angle = (self.angle + radians).rem_euclid(TAU);
        // rem_euclid can round up to exactly TAU for tiny negative inputs.
        if self.angle >= TAU {
            self.angle = 0.0;
        }
    }

    /// Lights as they should be rendered this frame, rest positions rotated
    /// about +Y by the shared angle.
    pub fn render_positions(&self) -> Vec<PointLight> {
        self.iter_render().collect()
    }

    pub fn iter_render(&self) -> impl ExactSizeIterator<Item = PointLight> + '_ {
        let rotation = self.rotation();
        let rotate = self.angle != 0.0;
        self.lights.iter().map(move |light| {
            let mut light = *light;
            if rotate {
                light.position = rotation * light.position;
            }
            light
        })
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.angle)
    }
}

impl Default for LightSet {
    fn default() -> Self {
        Self::generate(DEFAULT_SEED, 150, DEFAULT_WORLD_SCALE)
    }
}

fn generate_lights(seed: u64, count: usize, world_scale: f32) -> Vec<PointLight> {
    let mut rng = StdRng::seed_from_u64(seed);
    let half = world_scale / 2.0;

    (0..count)
        .map(|_| {
            let mut unit = || rng.gen_range(0.0f32..1.0);
            let position = Vec3::new(
                unit() * world_scale - half,
                unit() * world_scale - half,
                unit() * world_scale - half,
            ) * AXIS_SCALE;
            let color = Vec3::new(
                COLOR_MIN + unit() * (1.0 - COLOR_MIN),
                COLOR_MIN + unit() * (1.0 - COLOR_MIN),
                COLOR_MIN + unit() * (1.0 - COLOR_MIN),
            );
            PointLight::new(position, color, LIGHT_RADIUS, LIGHT_ATTENUATION)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(lights: &[PointLight]) -> Vec<[u32; 8]> {
        lights
            .iter()
            .map(|l| bytemuck::cast::<PointLight, [u32; 8]>(*l))
            .collect()
    }

    #[test]
    fn test_generation_is_bit_reproducible() {
        let a = LightSet::generate(1512972091, 140, DEFAULT_WORLD_SCALE);
        let b = LightSet::generate(1512972091, 140, DEFAULT_WORLD_SCALE);
        assert_eq!(a.len(), 140);
        assert_eq!(bits(a.rest_lights()), bits(b.rest_lights()));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = LightSet::generate(1, 8, DEFAULT_WORLD_SCALE);
        let b = LightSet::generate(2, 8, DEFAULT_WORLD_SCALE);
        assert_ne!(bits(a.rest_lights()), bits(b.rest_lights()));
    }

    #[test]
    fn test_prefix_is_stable_across_counts() {
        let short = LightSet::generate(42, 10, DEFAULT_WORLD_SCALE);
        let long = LightSet::generate(42, 20, DEFAULT_WORLD_SCALE);
        assert_eq!(bits(short.rest_lights()), bits(&long.rest_lights()[..10]));
    }

    #[test]
    fn test_generated_ranges() {
        let scale = DEFAULT_WORLD_SCALE;
        let set = LightSet::generate(7, 500, scale);
        let half = scale / 2.0;
        for light in set.rest_lights() {
            assert!(light.position.x.abs() <= half * 1.7);
            assert!(light.position.y.abs() <= half * 0.9);
            assert!(light.position.z.abs() <= half * 1.7);
            for c in light.color.to_array() {
                assert!((0.6..=1.0).contains(&c), "colour channel {} out of range", c);
            }
            assert_eq!(light.radius, LIGHT_RADIUS);
            assert_eq!(light.attenuation, LIGHT_ATTENUATION);
        }
    }

    #[test]
    fn test_render_positions_at_angle_zero_equal_rest() {
        let set = LightSet::generate(1512972091, 140, DEFAULT_WORLD_SCALE);
        assert_eq!(set.angle(), 0.0);
        assert_eq!(bits(&set.render_positions()), bits(set.rest_lights()));
    }

    #[test]
    fn test_advance_is_noop_when_not_animating() {
        let mut set = LightSet::generate(3, 4, DEFAULT_WORLD_SCALE);
        set.advance_animation();
        set.advance_animation_by(1.0);
        assert_eq!(set.angle(), 0.0);
    }

    #[test]
    fn test_full_turn_returns_to_start() {
        let mut set = LightSet::generate(42, 10, DEFAULT_WORLD_SCALE);
        let start = set.render_positions();

        set.set_animation_enabled(true);
        let steps = 360;
        for _ in 0..steps {
            set.advance_animation_by(TAU / steps as f32);
        }

        assert!(set.angle() >= 0.0 && set.angle() < TAU);
        for (before, after) in start.iter().zip(set.render_positions()) {
            let d = (before.position - after.position).length();
            assert!(d < 1e-3, "light moved by {} after a full turn", d);
            assert_eq!(before.color, after.color);
        }
    }

    #[test]
    fn test_rotation_is_about_vertical_axis() {
        let mut set = LightSet::generate(9, 16, DEFAULT_WORLD_SCALE);
        set.set_animation_enabled(true);
        for _ in 0..100 {
            set.advance_animation();
        }
        assert!((set.angle() - 100.0 * ROTATION_STEP).abs() < 1e-5);

        for (rest, moved) in set.rest_lights().iter().zip(set.iter_render()) {
            assert!((rest.position.y - moved.position.y).abs() < 1e-5);
            let rest_xz = glam::Vec2::new(rest.position.x, rest.position.z).length();
            let moved_xz = glam::Vec2::new(moved.position.x, moved.position.z).length();
            assert!((rest_xz - moved_xz).abs() < 1e-4);
        }
    }

    #[test]
    fn test_render_positions_does_not_mutate() {
        let mut set = LightSet::generate(5, 6, DEFAULT_WORLD_SCALE);
        set.set_animation_enabled(true);
        set.advance_animation();
        let first = set.render_positions();
        let second = set.render_positions();
        assert_eq!(bits(&first), bits(&second));
        assert_eq!(set.angle(), ROTATION_STEP);
    }

    #[test]
    fn test_regenerate_keeps_count_and_animation() {
        let mut set = LightSet::generate(1, 12, DEFAULT_WORLD_SCALE);
        set.set_animation_enabled(true);
        set.advance_animation();

        set.regenerate(99);
        assert_eq!(set.len(), 12);
        assert_eq!(set.seed(), 99);
        assert!(set.is_animating());
        assert_eq!(set.angle(), ROTATION_STEP);
        assert_eq!(
            bits(set.rest_lights()),
            bits(LightSet::generate(99, 12, DEFAULT_WORLD_SCALE).rest_lights())
        );
    }

    #[test]
    fn test_toggle_animation() {
        let mut set = LightSet::generate(1, 1, DEFAULT_WORLD_SCALE);
        assert!(set.toggle_animation());
        assert!(!set.toggle_animation());
    }
}
