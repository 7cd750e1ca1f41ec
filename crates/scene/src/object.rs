//! Drawable instances placed in the world.

use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};

use crate::transform::Transform;

/// Index of a loaded model in the renderer's model list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub model: ModelId,
    pub transform: Transform,
}

impl SceneObject {
    pub fn new(model: ModelId, transform: Transform) -> Self {
        Self { model, transform }
    }

    /// The viewer's standard placement: turned 90° about +Y, standing on the
    /// floor of a `world_scale` room and sized to three room widths, after
    /// scaling the model so its largest extent is one unit.
    pub fn placed(model: ModelId, world_scale: f32, normalize_scale: f32) -> Self {
        let transform = Transform::new()
            .with_position(Vec3::new(0.0, -world_scale / 2.0, 0.0))
            .with_rotation(Quat::from_rotation_y(FRAC_PI_2))
            .with_uniform_scale(3.0 * world_scale * normalize_scale);
        Self::new(model, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placed_transform() {
        let object = SceneObject::placed(ModelId(2), 6.0, 0.5);
        assert_eq!(object.model, ModelId(2));
        assert_eq!(object.transform.scale, Vec3::splat(9.0));

        let origin = object.transform.matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, -3.0, 0.0)).length() < 1e-5);

        // +X of the model ends up along -Z.
        let tip = object.transform.matrix().transform_point3(Vec3::X);
        assert!((tip - Vec3::new(0.0, -3.0, -9.0)).length() < 1e-4);
    }
}
