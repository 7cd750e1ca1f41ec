//! Explicit model/view/projection matrix state with a push/pop stack.
//!
//! Every pass receives the stack by `&mut` from its owner, so there is no
//! shared global matrix state. Composition follows the fixed-function
//! convention: each `translate`/`rotate`/`scale` post-multiplies the current
//! model matrix, so the last call is the first applied to vertices.

use glam::{Mat4, Quat, Vec3};
use thiserror::Error;

/// Matrices below this determinant are treated as singular.
const SINGULAR_EPSILON: f32 = 1e-6;

/// Inverse transpose of `model`, identity when `model` is singular.
pub(crate) fn normal_matrix_of(model: Mat4) -> Mat4 {
    if model.determinant().abs() < SINGULAR_EPSILON {
        Mat4::IDENTITY
    } else {
        model.inverse().transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transform stack popped more times than pushed")]
pub struct StackUnderflow;

#[derive(Debug, Clone)]
pub struct TransformStack {
    model: Mat4,
    view: Mat4,
    projection: Mat4,
    normal: Mat4,
    saved: Vec<Mat4>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            normal: Mat4::IDENTITY,
            saved: Vec::new(),
        }
    }
}

impl TransformStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Normal matrix as of the last [`TransformStack::build_normal_matrix`].
    pub fn normal(&self) -> Mat4 {
        self.normal
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Saves the current model matrix.
    pub fn push(&mut self) {
        self.saved.push(self.model);
    }

    /// Restores the model matrix saved by the matching [`TransformStack::push`].
    pub fn pop(&mut self) -> Result<(), StackUnderflow> {
        self.model = self.saved.pop().ok_or(StackUnderflow)?;
        Ok(())
    }

    /// Runs `f` between a push and its pop, so the model matrix is unchanged
    /// afterwards.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push();
        let result = f(self);
        // The push above guarantees an entry to pop.
        if let Some(model) = self.saved.pop() {
            self.model = model;
        }
        result
    }

    pub fn identity(&mut self) -> &mut Self {
        self.model = Mat4::IDENTITY;
        self
    }

    pub fn multiply(&mut self, m: Mat4) -> &mut Self {
        self.model *= m;
        self
    }

    pub fn translate(&mut self, offset: Vec3) -> &mut Self {
        self.multiply(Mat4::from_translation(offset))
    }

    /// Rotates by `radians` about `axis` (need not be normalized).
    pub fn rotate(&mut self, radians: f32, axis: Vec3) -> &mut Self {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return self;
        }
        self.multiply(Mat4::from_quat(Quat::from_axis_angle(axis, radians)))
    }

    pub fn rotate_deg(&mut self, degrees: f32, axis: Vec3) -> &mut Self {
        self.rotate(degrees.to_radians(), axis)
    }

    pub fn scale(&mut self, factors: Vec3) -> &mut Self {
        self.multiply(Mat4::from_scale(factors))
    }

    pub fn scale_uniform(&mut self, factor: f32) -> &mut Self {
        self.scale(Vec3::splat(factor))
    }

    /// Recomputes the normal matrix from the current model matrix.
    pub fn build_normal_matrix(&mut self) -> Mat4 {
        self.normal = normal_matrix_of(self.model);
        self.normal
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    #[test]
    fn test_push_pop_restores_model() {
        let mut stack = TransformStack::new();
        stack.translate(Vec3::new(1.0, 0.0, 0.0));
        let before = stack.model();

        stack.push();
        stack.scale_uniform(4.0).rotate(FRAC_PI_2, Vec3::Y);
        assert_ne!(stack.model(), before);
        assert_eq!(stack.depth(), 1);

        stack.pop().unwrap();
        assert_eq!(stack.model(), before);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_pop_on_empty_stack_is_an_error() {
        let mut stack = TransformStack::new();
        assert_eq!(stack.pop(), Err(StackUnderflow));
        assert_eq!(stack.model(), Mat4::IDENTITY);
    }

    #[test]
    fn test_underflow_is_a_std_error() {
        let mut stack = TransformStack::new();
        let err: Box<dyn std::error::Error> = Box::new(stack.pop().unwrap_err());
        assert_eq!(err.to_string(), "transform stack popped more times than pushed");
    }

    #[test]
    fn test_scoped_leaves_model_untouched() {
        let mut stack = TransformStack::new();
        let inner = stack.scoped(|s| {
            s.translate(Vec3::Y);
            s.model()
        });
        assert_eq!(inner, Mat4::from_translation(Vec3::Y));
        assert_eq!(stack.model(), Mat4::IDENTITY);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_last_call_applies_first() {
        // rotate 90 about Y, then translate down, then scale: a vertex is
        // scaled, then translated, then rotated.
        let mut stack = TransformStack::new();
        stack
            .identity()
            .rotate_deg(90.0, Vec3::Y)
            .translate(Vec3::new(0.0, -3.0, 0.0))
            .scale_uniform(18.0);

        let p = stack.model().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::new(0.0, -3.0, -18.0)), "got {:?}", p);
    }

    #[test]
    fn test_normal_matrix_is_only_rebuilt_on_request() {
        let mut stack = TransformStack::new();
        stack.scale(Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(stack.normal(), Mat4::IDENTITY);

        let normal = stack.build_normal_matrix();
        assert_eq!(normal, stack.model().inverse().transpose());
        assert_eq!(stack.normal(), normal);
    }

    #[test]
    fn test_singular_model_gives_identity_normal() {
        let mut stack = TransformStack::new();
        stack.scale_uniform(0.0);
        assert_eq!(stack.build_normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_zero_axis_rotation_is_ignored() {
        let mut stack = TransformStack::new();
        stack.rotate(1.0, Vec3::ZERO);
        assert_eq!(stack.model(), Mat4::IDENTITY);
    }
}
