//! Backend abstraction traits for the rendering system
//!
//! This module defines the immediate-mode GPU binding layer the renderer
//! drives. Every call is synchronous from the caller's point of view: when a
//! method returns, the command is considered queued.

use bitflags::bitflags;

use crate::foundation::math::{Mat3, Mat4, Vec3, Vec4};
use crate::material::{BlendEquation, BlendFactor, UniformValue};
use crate::render::RenderError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Handle to a GPU buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u64);

/// Handle to an off-screen color + depth render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetHandle(pub u64);

/// Binding point of a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data
    Vertex,
    /// 16-bit element indices
    Index,
}

/// Vertex attribute slots fed from a buffer group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    /// vec3 object-space position
    Position,
    /// vec3 normal
    Normal,
    /// vec3 RGB color
    Color,
    /// vec2 first texture coordinate set
    Uv,
    /// vec2 second texture coordinate set
    Uv2,
}

/// Primitive topology of a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Independent triangles
    Triangles,
    /// Independent line segments
    Lines,
}

/// Winding order treated as front-facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise (default)
    CounterClockwise,
    /// Clockwise
    Clockwise,
}

bitflags! {
    /// Buffers affected by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        /// Color attachment
        const COLOR = 0b001;
        /// Depth attachment
        const DEPTH = 0b010;
        /// Stencil attachment
        const STENCIL = 0b100;
    }
}

/// Creation parameters for a render target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether a depth attachment is created
    pub depth_buffer: bool,
    /// Debug label
    pub label: String,
}

/// An allocated off-screen render target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    /// Backend handle
    pub handle: RenderTargetHandle,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether a depth attachment exists
    pub depth_buffer: bool,
}

impl RenderTarget {
    /// Size as a `(width, height)` pair
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Camera-level uniforms, re-sent whenever the bound program changes
#[derive(Debug, Clone, PartialEq)]
pub struct CameraUniforms {
    /// Projection matrix
    pub projection: Mat4,
    /// View matrix (inverse camera world matrix)
    pub view: Mat4,
    /// Camera position in world space
    pub camera_position: Vec3,
}

impl CameraUniforms {
    /// Identity camera used for full-screen quads
    pub fn identity() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
            camera_position: Vec3::zeros(),
        }
    }
}

/// Per-draw object uniforms
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectUniforms {
    /// Object world matrix
    pub model: Mat4,
    /// View * model
    pub model_view: Mat4,
    /// Inverse-transpose of the model-view upper 3x3
    pub normal_matrix: Mat3,
}

impl ObjectUniforms {
    /// Derive object uniforms from a world matrix and the camera view matrix
    pub fn new(model: Mat4, view: &Mat4) -> Self {
        let model_view = view * model;
        let upper: Mat3 = model_view.fixed_view::<3, 3>(0, 0).into_owned();
        // Singular matrices (zero scale) keep the raw block; lighting is meaningless there anyway
        let normal_matrix = upper.try_inverse().map_or(upper, |inverse| inverse.transpose());

        Self {
            model,
            model_view,
            normal_matrix,
        }
    }
}

/// Immediate-mode GPU binding layer
///
/// Implemented by concrete graphics backends and by the headless
/// [`RecordingBackend`](crate::render::RecordingBackend). The renderer never
/// caches anything inside the backend; redundant-state elision lives in
/// [`StateCache`](crate::render::StateCache).
pub trait GpuBackend {
    /// Allocate a buffer object
    fn create_buffer(&mut self, kind: BufferKind, label: &str) -> BackendResult<BufferHandle>;

    /// Replace the whole contents of a buffer
    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> BackendResult<()>;

    /// Free a buffer object
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Create a program; shader sources are owned by the caller's shader library
    fn create_program(&mut self, label: &str) -> BackendResult<ProgramHandle>;

    /// Free a program
    fn delete_program(&mut self, program: ProgramHandle);

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    /// Send camera-level uniforms to the current program
    fn set_camera_uniforms(&mut self, uniforms: &CameraUniforms);

    /// Send per-object uniforms to the current program
    fn set_object_uniforms(&mut self, uniforms: &ObjectUniforms);

    /// Send a named material uniform to the current program
    fn set_uniform(&mut self, name: &str, value: &UniformValue);

    /// Enable or disable depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Enable or disable depth writes
    fn set_depth_write(&mut self, enabled: bool);

    /// Enable or disable back-face culling
    fn set_face_culling(&mut self, enabled: bool);

    /// Select the front-facing winding
    fn set_front_face(&mut self, winding: FrontFace);

    /// Enable or disable blending
    fn set_blend_enabled(&mut self, enabled: bool);

    /// Select the blend equation
    fn set_blend_equation(&mut self, equation: BlendEquation);

    /// Select the source/destination blend factors
    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor);

    /// Enable or disable polygon offset fill
    fn set_polygon_offset_enabled(&mut self, enabled: bool);

    /// Set polygon offset factor and units
    fn set_polygon_offset(&mut self, factor: f32, units: f32);

    /// Set rasterized line width
    fn set_line_width(&mut self, width: f32);

    /// Bind a buffer to a vertex attribute slot
    fn bind_vertex_buffer(&mut self, attribute: VertexAttribute, buffer: BufferHandle);

    /// Bind the element buffer for the next draw
    fn bind_index_buffer(&mut self, buffer: BufferHandle);

    /// Issue an indexed draw of `index_count` 16-bit indices
    fn draw_elements(&mut self, topology: Topology, index_count: u32) -> BackendResult<()>;

    /// Allocate an off-screen target
    fn create_render_target(&mut self, descriptor: &RenderTargetDescriptor) -> BackendResult<RenderTargetHandle>;

    /// Free an off-screen target
    fn delete_render_target(&mut self, target: RenderTargetHandle);

    /// Route subsequent draws to a target, or to the default framebuffer
    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Clear the bound target
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]);

    /// Replace the active user clip planes (empty disables clipping)
    fn set_clip_planes(&mut self, planes: &[Vec4]);

    /// Downcast to concrete backend type
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to mutable concrete backend type
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_object_uniforms_normal_matrix_undoes_scale() {
        let model = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0));
        let uniforms = ObjectUniforms::new(model, &Mat4::identity());

        assert_relative_eq!(uniforms.normal_matrix[(0, 0)], 0.5, epsilon = 1e-6);
        assert_relative_eq!(uniforms.normal_matrix[(1, 1)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_singular_model_keeps_raw_block() {
        let model = Mat4::new_nonuniform_scaling(&Vec3::new(0.0, 1.0, 1.0));
        let uniforms = ObjectUniforms::new(model, &Mat4::identity());

        assert_relative_eq!(uniforms.normal_matrix[(0, 0)], 0.0, epsilon = 1e-6);
    }
}
