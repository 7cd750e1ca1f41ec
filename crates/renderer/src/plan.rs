//! Per-frame pass sequence.
//!
//! [`DeferredPipeline::render`](crate::pipeline::DeferredPipeline::render)
//! produces a [`FramePlan`]; the GPU executor walks its passes in order.
//! The plan is plain data so pass selection can be checked without a device.

use glam::{Mat4, Vec3, Vec4};

use renderer_scene::{DrawMode, ModelId, PointLight};

use crate::depth::DepthRange;
use crate::gbuffer::GBufferChannel;

/// Where a pass draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTarget {
    GBuffer,
    /// The persistent frame target that is presented and exported.
    Default,
}

/// Screen-space program run by a shading pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShadingProgram {
    Lighting,
    Diffuse,
    Specular,
    Normal,
    Position,
    Depth,
}

impl ShadingProgram {
    pub const ALL: [ShadingProgram; 6] = [
        ShadingProgram::Lighting,
        ShadingProgram::Diffuse,
        ShadingProgram::Specular,
        ShadingProgram::Normal,
        ShadingProgram::Position,
        ShadingProgram::Depth,
    ];

    pub fn for_mode(mode: DrawMode) -> Self {
        match mode {
            DrawMode::CompositeLit => ShadingProgram::Lighting,
            DrawMode::DiffuseOnly => ShadingProgram::Diffuse,
            DrawMode::SpecularOnly => ShadingProgram::Specular,
            DrawMode::NormalOnly => ShadingProgram::Normal,
            DrawMode::PositionOnly => ShadingProgram::Position,
            DrawMode::DepthOnly => ShadingProgram::Depth,
        }
    }

    /// G-buffer channels the program samples.
    pub fn units(self) -> &'static [GBufferChannel] {
        match self {
            ShadingProgram::Lighting => &GBufferChannel::ALL,
            ShadingProgram::Depth => &[GBufferChannel::Depth],
            _ => &GBufferChannel::COLOR,
        }
    }

    /// Compiled fragment stage, relative to the shader directory.
    pub fn fragment_file(self) -> &'static str {
        match self {
            ShadingProgram::Lighting => "deferred.frag.spv",
            ShadingProgram::Diffuse => "diffuse.frag.spv",
            ShadingProgram::Specular => "specular.frag.spv",
            ShadingProgram::Normal => "normal.frag.spv",
            ShadingProgram::Position => "position.frag.spv",
            ShadingProgram::Depth => "depth.frag.spv",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub model: ModelId,
    pub model_matrix: Mat4,
    pub normal_matrix: Mat4,
}

/// One light cube of the light-volume pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightMarker {
    pub model_matrix: Mat4,
    pub color: Vec4,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Pass {
    Geometry {
        clear_color: [f32; 4],
        clear_depth: f32,
        draws: Vec<DrawCall>,
        view: Mat4,
        projection: Mat4,
    },
    Shading {
        program: ShadingProgram,
        units: &'static [GBufferChannel],
        clear_color: [f32; 4],
        /// Copy the G-buffer depth onto the default depth after shading.
        copy_depth: bool,
    },
    LightVolumes {
        markers: Vec<LightMarker>,
        view: Mat4,
        projection: Mat4,
    },
}

impl Pass {
    pub fn target(&self) -> RenderTarget {
        match self {
            Pass::Geometry { .. } => RenderTarget::GBuffer,
            Pass::Shading { .. } | Pass::LightVolumes { .. } => RenderTarget::Default,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pass::Geometry { .. } => "geometry",
            Pass::Shading { .. } => "shading",
            Pass::LightVolumes { .. } => "light_volumes",
        }
    }
}

/// Everything one frame needs, computed once per `render`.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    pub elapsed: f32,
    pub mode: DrawMode,
    pub camera_position: Vec3,
    /// Rotated lights read by both the shading uniforms and the markers.
    pub lights: Vec<PointLight>,
    pub depth_range: DepthRange,
    pub passes: Vec<Pass>,
}

impl FramePlan {
    pub fn shading_passes(&self) -> impl Iterator<Item = &Pass> {
        self.passes
            .iter()
            .filter(|pass| matches!(pass, Pass::Shading { .. }))
    }

    pub fn shading_program(&self) -> Option<ShadingProgram> {
        self.passes.iter().find_map(|pass| match pass {
            Pass::Shading { program, .. } => Some(*program),
            _ => None,
        })
    }

    pub fn has_light_volumes(&self) -> bool {
        self.passes
            .iter()
            .any(|pass| matches!(pass, Pass::LightVolumes { .. }))
    }

    /// Target bound once the last pass has run.
    pub fn final_target(&self) -> RenderTarget {
        self.passes
            .last()
            .map(Pass::target)
            .unwrap_or(RenderTarget::Default)
    }

    pub fn draw_count(&self) -> usize {
        self.passes
            .iter()
            .map(|pass| match pass {
                Pass::Geometry { draws, .. } => draws.len(),
                _ => 0,
            })
            .sum()
    }
}
