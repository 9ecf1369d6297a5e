//! Material capability interface
//!
//! The render pipeline never inspects concrete material types. It asks a
//! material what vertex data it needs, which fixed-function state it wants and
//! which program it runs, and lets the material push its own uniforms.

mod basic;
mod shader;
mod state;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

pub use basic::BasicMaterial;
pub use shader::ShaderMaterial;
pub use state::{
    BlendEquation, BlendFactor, BlendMode, BlendState, NormalShading, PolygonOffset, ResolvedBlend,
    Side, VertexColors,
};

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::{BackendResult, GpuBackend, ProgramHandle, RenderTargetHandle};

/// Unique identifier for materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

static NEXT_MATERIAL_ID: AtomicU32 = AtomicU32::new(1);

impl MaterialId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Value of a named shader uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Scalar int
    Int(i32),
    /// Scalar float
    Float(f32),
    /// vec2
    Vec2(Vec2),
    /// vec3
    Vec3(Vec3),
    /// vec4
    Vec4(Vec4),
    /// mat4
    Mat4(Mat4),
    /// float[]
    FloatArray(Vec<f32>),
    /// Color attachment of a render target, sampled as a texture
    Texture(RenderTargetHandle),
}

/// Capability interface every drawable material implements
///
/// Only [`id`](Material::id) and [`program`](Material::program) are required;
/// every other capability defaults to an opaque, depth-tested, front-face-only
/// material that needs positions alone.
pub trait Material: fmt::Debug + Send + Sync {
    /// Stable identity used by the state cache
    fn id(&self) -> MaterialId;

    /// Shader program this material draws with
    fn program(&self) -> ProgramHandle;

    /// Debug name
    fn name(&self) -> Option<&str> {
        None
    }

    /// Whether the first UV set is uploaded
    fn needs_uv(&self) -> bool {
        false
    }

    /// Whether the second UV set is uploaded
    fn needs_uv2(&self) -> bool {
        false
    }

    /// Normal data consumed by the shader
    fn needs_normals(&self) -> NormalShading {
        NormalShading::None
    }

    /// Color data consumed by the shader
    fn needs_colors(&self) -> VertexColors {
        VertexColors::None
    }

    /// Transparent materials are drawn back-to-front after all opaque ones
    fn is_transparent(&self) -> bool {
        false
    }

    /// Draw the line topology instead of triangles
    fn is_wireframe(&self) -> bool {
        false
    }

    /// Line width for wireframe draws
    fn wireframe_line_width(&self) -> f32 {
        1.0
    }

    /// Blending configuration
    fn blending(&self) -> BlendState {
        BlendState::NORMAL
    }

    /// Depth testing
    fn depth_test(&self) -> bool {
        true
    }

    /// Depth writes
    fn depth_write(&self) -> bool {
        true
    }

    /// Depth bias, `None` disables polygon offset
    fn polygon_offset(&self) -> Option<PolygonOffset> {
        None
    }

    /// Rendered faces
    fn side(&self) -> Side {
        Side::Front
    }

    /// Bumped whenever uniform values change so the renderer knows to re-send them
    fn uniforms_version(&self) -> u64 {
        0
    }

    /// Push material-owned uniforms to the current program
    fn bind_uniforms(&self, _backend: &mut dyn GpuBackend) -> BackendResult<()> {
        Ok(())
    }
}
