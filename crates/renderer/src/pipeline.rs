//! Deferred pass selection.
//!
//! [`DeferredPipeline`] holds the CPU-side state of the deferred path (draw
//! mode, lights, the transform stack, the linearization range) and turns a
//! scene and camera into the frame's [`FramePlan`]:
//!
//! 1. geometry into the G-buffer,
//! 2. exactly one shading or channel-visualization pass into the default
//!    target,
//! 3. in [`DrawMode::CompositeLit`] only, the light-volume markers.

use glam::{Mat4, Vec3};
use tracing::{debug, info};

use renderer_scene::{Camera, DrawMode, LightSet, SceneObject, TransformStack};

use crate::depth::{DepthRange, DepthRangeError};
use crate::plan::{DrawCall, FramePlan, LightMarker, Pass, ShadingProgram};

/// Opaque black.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const CLEAR_DEPTH: f32 = 1.0;

/// Light-marker cube size relative to the world scale.
pub const LIGHT_SCALE_FACTOR: f32 = 0.002;

#[derive(Debug, Clone)]
pub struct DeferredPipeline {
    mode: DrawMode,
    lights: LightSet,
    transforms: TransformStack,
    depth_range: DepthRange,
    light_scale: f32,
}

impl DeferredPipeline {
    pub fn new(lights: LightSet) -> Self {
        let light_scale = lights.world_scale() * LIGHT_SCALE_FACTOR;
        Self {
            mode: DrawMode::default(),
            lights,
            transforms: TransformStack::new(),
            depth_range: DepthRange::default(),
            light_scale,
        }
    }

    /// Plans one frame.
    ///
    /// Advances the light orbit once (when animating) and snapshots the
    /// rotated positions; the shading uniforms and the markers both read that
    /// snapshot. `elapsed` is carried through to the plan.
    pub fn render(&mut self, elapsed: f32, scene: &[SceneObject], camera: &Camera) -> FramePlan {
        self.lights.advance_animation();
        let lights = self.lights.render_positions();

        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        self.transforms.set_view(view);
        self.transforms.set_projection(projection);

        let mut passes = Vec::with_capacity(3);
        passes.push(Pass::Geometry {
            clear_color: CLEAR_COLOR,
            clear_depth: CLEAR_DEPTH,
            draws: self.draw_calls(scene),
            view,
            projection,
        });

        let program = ShadingProgram::for_mode(self.mode);
        passes.push(Pass::Shading {
            program,
            units: program.units(),
            clear_color: CLEAR_COLOR,
            copy_depth: self.mode.draws_light_volumes(),
        });

        if self.mode.draws_light_volumes() {
            let markers = lights
                .iter()
                .map(|light| LightMarker {
                    model_matrix: self.marker_matrix(light.position),
                    color: light.color.extend(1.0),
                })
                .collect();
            passes.push(Pass::LightVolumes {
                markers,
                view,
                projection,
            });
        }

        FramePlan {
            elapsed,
            mode: self.mode,
            camera_position: camera.position,
            lights,
            depth_range: self.depth_range,
            passes,
        }
    }

    fn draw_calls(&mut self, scene: &[SceneObject]) -> Vec<DrawCall> {
        scene
            .iter()
            .map(|object| {
                let model_matrix = self
                    .transforms
                    .identity()
                    .multiply(object.transform.matrix())
                    .model();
                DrawCall {
                    model: object.model,
                    model_matrix,
                    normal_matrix: self.transforms.build_normal_matrix(),
                }
            })
            .collect()
    }

    fn marker_matrix(&mut self, position: Vec3) -> Mat4 {
        let scale = self.light_scale;
        self.transforms.scoped(|stack| {
            stack.identity().translate(position).scale_uniform(scale).model()
        })
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        if mode != self.mode {
            info!("Draw mode: {}", mode);
        }
        self.mode = mode;
    }

    #[inline]
    pub fn draw_mode(&self) -> DrawMode {
        self.mode
    }

    /// Near and far planes used by depth linearization.
    pub fn set_perspective(&mut self, near: f32, far: f32) -> Result<(), DepthRangeError> {
        self.depth_range = DepthRange::new(near, far)?;
        debug!("Depth range: near={}, far={}", near, far);
        Ok(())
    }

    #[inline]
    pub fn depth_range(&self) -> DepthRange {
        self.depth_range
    }

    /// Returns whether the lights now rotate.
    pub fn toggle_light_animation(&mut self) -> bool {
        let animating = self.lights.toggle_animation();
        info!("Light rotation {}", if animating { "on" } else { "off" });
        animating
    }

    pub fn regenerate_lights(&mut self, seed: u64) {
        self.lights.regenerate(seed);
        info!("Regenerated {} lights with seed {}", self.lights.len(), seed);
    }

    #[inline]
    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    #[inline]
    pub fn light_scale(&self) -> f32 {
        self.light_scale
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use renderer_scene::light_set::{DEFAULT_WORLD_SCALE, ROTATION_STEP};
    use renderer_scene::{ModelId, Transform};

    use super::*;
    use crate::plan::RenderTarget;

    fn approx_eq(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    fn pipeline() -> DeferredPipeline {
        DeferredPipeline::new(LightSet::generate(42, 10, DEFAULT_WORLD_SCALE))
    }

    fn camera() -> Camera {
        let mut camera = Camera::new();
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera
    }

    fn scene() -> Vec<SceneObject> {
        vec![
            SceneObject::placed(ModelId(0), DEFAULT_WORLD_SCALE, 0.5),
            SceneObject::new(
                ModelId(1),
                Transform::new().with_position(Vec3::new(1.0, 2.0, 3.0)),
            ),
        ]
    }

    #[test]
    fn test_each_mode_yields_exactly_one_shading_pass() {
        let mut pipeline = pipeline();
        for mode in DrawMode::ALL {
            pipeline.set_draw_mode(mode);
            let plan = pipeline.render(0.0, &scene(), &camera());

            assert_eq!(plan.mode, mode);
            assert_eq!(plan.shading_passes().count(), 1);
            assert_eq!(plan.shading_program(), Some(ShadingProgram::for_mode(mode)));
            assert_eq!(plan.has_light_volumes(), mode == DrawMode::CompositeLit);
        }
    }

    #[test]
    fn test_pass_order_and_targets() {
        let mut pipeline = pipeline();
        let plan = pipeline.render(0.0, &scene(), &camera());

        let targets: Vec<_> = plan.passes.iter().map(Pass::target).collect();
        assert_eq!(
            targets,
            vec![
                RenderTarget::GBuffer,
                RenderTarget::Default,
                RenderTarget::Default
            ]
        );
        assert_eq!(plan.final_target(), RenderTarget::Default);

        pipeline.set_draw_mode(DrawMode::NormalOnly);
        let plan = pipeline.render(0.0, &scene(), &camera());
        assert_eq!(plan.passes.len(), 2);
        assert_eq!(plan.final_target(), RenderTarget::Default);
    }

    #[test]
    fn test_geometry_pass_clears_and_draws_every_object() {
        let mut pipeline = pipeline();
        let plan = pipeline.render(0.0, &scene(), &camera());

        let Pass::Geometry {
            clear_color,
            clear_depth,
            draws,
            ..
        } = &plan.passes[0]
        else {
            panic!("first pass is not geometry");
        };
        assert_eq!(*clear_color, CLEAR_COLOR);
        assert_eq!(*clear_depth, 1.0);
        assert_eq!(draws.len(), 2);
        assert_eq!(plan.draw_count(), 2);

        // The stack is reset per drawable: the second draw is its own translation.
        let origin = draws[1].model_matrix.transform_point3(Vec3::ZERO);
        assert!(approx_eq(origin, Vec3::new(1.0, 2.0, 3.0)));
        let normal = glam::Mat3::from_mat4(draws[1].normal_matrix);
        assert!(normal.abs_diff_eq(glam::Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn test_composite_copies_depth_and_other_modes_do_not() {
        let mut pipeline = pipeline();
        for mode in DrawMode::ALL {
            pipeline.set_draw_mode(mode);
            let plan = pipeline.render(0.0, &[], &camera());
            let copy = plan.passes.iter().any(|pass| {
                matches!(pass, Pass::Shading { copy_depth: true, .. })
            });
            assert_eq!(copy, mode == DrawMode::CompositeLit);
        }
    }

    #[test]
    fn test_markers_follow_rotated_lights() {
        let mut pipeline = pipeline();
        pipeline.toggle_light_animation();
        let plan = pipeline.render(0.0, &[], &camera());

        let Some(Pass::LightVolumes { markers, .. }) = plan.passes.last() else {
            panic!("no light-volume pass");
        };
        assert_eq!(markers.len(), 10);
        let scale = DEFAULT_WORLD_SCALE * LIGHT_SCALE_FACTOR;
        for (marker, light) in markers.iter().zip(&plan.lights) {
            let centre = marker.model_matrix.transform_point3(Vec3::ZERO);
            assert!(approx_eq(centre, light.position));
            let corner = marker.model_matrix.transform_point3(Vec3::ONE);
            assert!(approx_eq(corner - centre, Vec3::splat(scale)));
            assert_eq!(marker.color, light.color.extend(1.0));
        }
    }

    #[test]
    fn test_render_advances_rotation_once() {
        let mut pipeline = pipeline();
        pipeline.render(0.0, &[], &camera());
        assert_eq!(pipeline.lights().angle(), 0.0);

        pipeline.toggle_light_animation();
        pipeline.render(0.5, &[], &camera());
        pipeline.render(1.0, &[], &camera());
        assert!((pipeline.lights().angle() - 2.0 * ROTATION_STEP).abs() < 1e-6);
    }

    #[test]
    fn test_lights_snapshot_matches_light_set() {
        let mut pipeline = pipeline();
        pipeline.toggle_light_animation();
        let plan = pipeline.render(0.0, &[], &camera());
        assert_eq!(plan.lights, pipeline.lights().render_positions());
        assert_eq!(plan.camera_position, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_set_perspective_validates() {
        let mut pipeline = pipeline();
        assert_eq!(pipeline.depth_range(), DepthRange::default());
        pipeline.set_perspective(0.5, 50.0).unwrap();
        assert_eq!(pipeline.depth_range().far(), 50.0);
        assert!(pipeline.set_perspective(2.0, 1.0).is_err());
        assert_eq!(pipeline.depth_range().near(), 0.5);
    }

    #[test]
    fn test_regenerate_lights() {
        let mut pipeline = pipeline();
        let before = pipeline.lights().rest_lights().to_vec();
        pipeline.regenerate_lights(7);
        assert_eq!(pipeline.lights().len(), before.len());
        assert_ne!(pipeline.lights().rest_lights(), before.as_slice());
        assert_eq!(pipeline.lights().seed(), 7);
    }
}
