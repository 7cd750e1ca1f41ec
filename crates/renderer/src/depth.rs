//! Depth-buffer linearization.
//!
//! Only valid for a symmetric perspective projection: the formula inverts
//! the perspective depth mapping and means nothing for an orthographic one.
//! [`DepthRange::from_camera`] refuses orthographic cameras.

use thiserror::Error;

use renderer_scene::Camera;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DepthRangeError {
    #[error("near plane must be positive, got {0}")]
    NonPositiveNear(f32),
    #[error("far plane ({far}) must be beyond near plane ({near})")]
    FarNotBeyondNear { near: f32, far: f32 },
    #[error("depth linearization requires a perspective projection")]
    Orthographic,
}

/// Near and far clip distances of a perspective projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthRange {
    near: f32,
    far: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl DepthRange {
    pub fn new(near: f32, far: f32) -> Result<Self, DepthRangeError> {
        if !(near > 0.0) {
            return Err(DepthRangeError::NonPositiveNear(near));
        }
        if !(far > near) {
            return Err(DepthRangeError::FarNotBeyondNear { near, far });
        }
        Ok(Self { near, far })
    }

    pub fn from_camera(camera: &Camera) -> Result<Self, DepthRangeError> {
        let (near, far) = camera.depth_range().ok_or(DepthRangeError::Orthographic)?;
        Self::new(near, far)
    }

    #[inline]
    pub fn near(&self) -> f32 {
        self.near
    }

    #[inline]
    pub fn far(&self) -> f32 {
        self.far
    }

    #[inline]
    pub fn linearize(&self, depth: f32) -> f32 {
        linearize_depth(depth, self.near, self.far)
    }
}

/// `2n / (2n + (1 - d) (f - n))`, the same curve as `2n / (f + n - d (f - n))`
/// without the cancellation near `d = 1`.
///
/// Maps `d = 1` to exactly 1 and `d = 0` to `2n / (f + n)`. Assumes a
/// symmetric perspective projection with `0 < near < far`.
#[inline]
pub fn linearize_depth(depth: f32, near: f32, far: f32) -> f32 {
    2.0 * near / (2.0 * near + (1.0 - depth) * (far - near))
}

/// Linearized depth as an 8-bit grey level: `round(255 * linear)`, clamped.
#[inline]
pub fn depth_to_gray(depth: f32, range: &DepthRange) -> u8 {
    (range.linearize(depth) * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_plane_maps_to_one() {
        let range = DepthRange::new(0.1, 1000.0).unwrap();
        assert!((range.linearize(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_depth_buffer_range_stays_within_unit() {
        for (near, far) in [(0.1, 1000.0), (0.01, 10000.0), (0.5, 30.0)] {
            let range = DepthRange::new(near, far).unwrap();
            for i in 0..=1000 {
                let v = range.linearize(i as f32 / 1000.0);
                assert!(v > 0.0 && v <= 1.0, "near={} far={} gave {}", near, far, v);
            }
            assert_eq!(range.linearize(1.0), 1.0);
        }
    }

    #[test]
    fn test_near_plane_maps_to_small_positive() {
        let range = DepthRange::new(0.1, 1000.0).unwrap();
        let v = range.linearize(0.0);
        assert!(v > 0.0 && v <= 1.0);
        assert!((v - 0.2 / 1000.1).abs() < 1e-7);
    }

    #[test]
    fn test_linearization_is_monotonic() {
        let range = DepthRange::new(0.1, 30.0).unwrap();
        let mut previous = 0.0;
        for i in 0..=100 {
            let v = range.linearize(i as f32 / 100.0);
            assert!(v > previous);
            previous = v;
        }
    }

    #[test]
    fn test_rejects_bad_ranges() {
        assert_eq!(
            DepthRange::new(0.0, 10.0),
            Err(DepthRangeError::NonPositiveNear(0.0))
        );
        assert!(matches!(
            DepthRange::new(5.0, 5.0),
            Err(DepthRangeError::FarNotBeyondNear { .. })
        ));
        assert!(DepthRange::new(f32::NAN, 10.0).is_err());
    }

    #[test]
    fn test_orthographic_camera_is_rejected() {
        let mut camera = Camera::new();
        assert!(DepthRange::from_camera(&camera).is_ok());
        camera.set_orthographic(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        assert_eq!(
            DepthRange::from_camera(&camera),
            Err(DepthRangeError::Orthographic)
        );
    }

    #[test]
    fn test_depth_to_gray_clamps_and_rounds() {
        let range = DepthRange::new(0.1, 1000.0).unwrap();
        assert_eq!(depth_to_gray(1.0, &range), 255);
        assert_eq!(depth_to_gray(0.0, &range), 0);
        // Past the far plane the formula exceeds 1.
        assert_eq!(depth_to_gray(1.0001, &range), 255);
    }
}
