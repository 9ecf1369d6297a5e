//! Headless backend that records every call
//!
//! Used by tests and by the demo binary. Handles are plain counters and no
//! pixels are produced; what matters is the exact command stream the renderer
//! emits.

use std::any::Any;
use std::collections::HashSet;

use crate::foundation::math::Vec4;
use crate::material::{BlendEquation, BlendFactor, UniformValue};

use super::backend::{
    BackendResult, BufferHandle, BufferKind, CameraUniforms, ClearFlags, FrontFace, GpuBackend,
    ObjectUniforms, ProgramHandle, RenderTargetDescriptor, RenderTargetHandle, Topology,
    VertexAttribute,
};
use super::RenderError;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum GpuCommand {
    CreateBuffer { buffer: BufferHandle, kind: BufferKind, label: String },
    UploadBuffer { buffer: BufferHandle, bytes: usize },
    DeleteBuffer(BufferHandle),
    CreateProgram(ProgramHandle),
    DeleteProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    CameraUniforms(CameraUniforms),
    ObjectUniforms(ObjectUniforms),
    Uniform { name: String, value: UniformValue },
    DepthTest(bool),
    DepthWrite(bool),
    FaceCulling(bool),
    FrontFace(FrontFace),
    BlendEnabled(bool),
    BlendEquation(BlendEquation),
    BlendFunc(BlendFactor, BlendFactor),
    PolygonOffsetEnabled(bool),
    PolygonOffset { factor: f32, units: f32 },
    LineWidth(f32),
    BindVertexBuffer(VertexAttribute, BufferHandle),
    BindIndexBuffer(BufferHandle),
    Draw { topology: Topology, index_count: u32 },
    CreateRenderTarget { target: RenderTargetHandle, width: u32, height: u32 },
    DeleteRenderTarget(RenderTargetHandle),
    BindRenderTarget(Option<RenderTargetHandle>),
    Viewport { x: u32, y: u32, width: u32, height: u32 },
    Clear { flags: ClearFlags, color: [f32; 4] },
    ClipPlanes(Vec<Vec4>),
}

impl GpuCommand {
    /// Whether this command changes fixed-function or program state
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            Self::UseProgram(_)
                | Self::DepthTest(_)
                | Self::DepthWrite(_)
                | Self::FaceCulling(_)
                | Self::FrontFace(_)
                | Self::BlendEnabled(_)
                | Self::BlendEquation(_)
                | Self::BlendFunc(..)
                | Self::PolygonOffsetEnabled(_)
                | Self::PolygonOffset { .. }
                | Self::LineWidth(_)
        )
    }
}

/// Backend that stores every command instead of talking to a GPU
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<GpuCommand>,
    next_handle: u64,
    live_buffers: HashSet<BufferHandle>,
    live_programs: HashSet<ProgramHandle>,
    live_targets: HashSet<RenderTargetHandle>,
    fail_allocations_after: Option<usize>,
    allocations: usize,
}

impl RecordingBackend {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every allocation after the first `count` fail
    pub fn with_allocation_limit(mut self, count: usize) -> Self {
        self.fail_allocations_after = Some(count);
        self
    }

    /// Every command recorded since creation or the last [`clear_commands`](Self::clear_commands)
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Forget recorded commands; live resources are kept
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded buffer uploads
    pub fn uploads(&self) -> impl Iterator<Item = (BufferHandle, usize)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            GpuCommand::UploadBuffer { buffer, bytes } => Some((*buffer, *bytes)),
            _ => None,
        })
    }

    /// Recorded draw calls
    pub fn draw_calls(&self) -> impl Iterator<Item = (Topology, u32)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            GpuCommand::Draw { topology, index_count } => Some((*topology, *index_count)),
            _ => None,
        })
    }

    /// Number of recorded state-changing commands
    pub fn state_change_count(&self) -> usize {
        self.commands.iter().filter(|command| command.is_state_change()).count()
    }

    /// Number of buffers allocated and not yet deleted
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.len()
    }

    /// Number of render targets allocated and not yet deleted
    pub fn live_targets(&self) -> usize {
        self.live_targets.len()
    }

    fn allocate(&mut self, what: &str) -> BackendResult<u64> {
        if let Some(limit) = self.fail_allocations_after {
            if self.allocations >= limit {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "{what} allocation refused after {limit} allocations"
                )));
            }
        }
        self.allocations += 1;
        self.next_handle += 1;
        Ok(self.next_handle)
    }
}

impl GpuBackend for RecordingBackend {
    fn create_buffer(&mut self, kind: BufferKind, label: &str) -> BackendResult<BufferHandle> {
        let buffer = BufferHandle(self.allocate("buffer")?);
        self.live_buffers.insert(buffer);
        self.commands.push(GpuCommand::CreateBuffer {
            buffer,
            kind,
            label: label.to_owned(),
        });
        Ok(buffer)
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> BackendResult<()> {
        if !self.live_buffers.contains(&buffer) {
            return Err(RenderError::BackendError(format!("upload to unknown buffer {buffer:?}")));
        }
        self.commands.push(GpuCommand::UploadBuffer {
            buffer,
            bytes: data.len(),
        });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if !self.live_buffers.remove(&buffer) {
            log::warn!("Deleting unknown or already deleted buffer {:?}", buffer);
        }
        self.commands.push(GpuCommand::DeleteBuffer(buffer));
    }

    fn create_program(&mut self, _label: &str) -> BackendResult<ProgramHandle> {
        let program = ProgramHandle(self.allocate("program")?);
        self.live_programs.insert(program);
        self.commands.push(GpuCommand::CreateProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.live_programs.remove(&program);
        self.commands.push(GpuCommand::DeleteProgram(program));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn set_camera_uniforms(&mut self, uniforms: &CameraUniforms) {
        self.commands.push(GpuCommand::CameraUniforms(uniforms.clone()));
    }

    fn set_object_uniforms(&mut self, uniforms: &ObjectUniforms) {
        self.commands.push(GpuCommand::ObjectUniforms(uniforms.clone()));
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        self.commands.push(GpuCommand::Uniform {
            name: name.to_owned(),
            value: value.clone(),
        });
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::DepthTest(enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::DepthWrite(enabled));
    }

    fn set_face_culling(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::FaceCulling(enabled));
    }

    fn set_front_face(&mut self, winding: FrontFace) {
        self.commands.push(GpuCommand::FrontFace(winding));
    }

    fn set_blend_enabled(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::BlendEnabled(enabled));
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.commands.push(GpuCommand::BlendEquation(equation));
    }

    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.commands.push(GpuCommand::BlendFunc(src, dst));
    }

    fn set_polygon_offset_enabled(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::PolygonOffsetEnabled(enabled));
    }

    fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        self.commands.push(GpuCommand::PolygonOffset { factor, units });
    }

    fn set_line_width(&mut self, width: f32) {
        self.commands.push(GpuCommand::LineWidth(width));
    }

    fn bind_vertex_buffer(&mut self, attribute: VertexAttribute, buffer: BufferHandle) {
        self.commands.push(GpuCommand::BindVertexBuffer(attribute, buffer));
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.commands.push(GpuCommand::BindIndexBuffer(buffer));
    }

    fn draw_elements(&mut self, topology: Topology, index_count: u32) -> BackendResult<()> {
        self.commands.push(GpuCommand::Draw { topology, index_count });
        Ok(())
    }

    fn create_render_target(&mut self, descriptor: &RenderTargetDescriptor) -> BackendResult<RenderTargetHandle> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "render target '{}' has zero size {}x{}",
                descriptor.label, descriptor.width, descriptor.height
            )));
        }
        let target = RenderTargetHandle(self.allocate("render target")?);
        self.live_targets.insert(target);
        self.commands.push(GpuCommand::CreateRenderTarget {
            target,
            width: descriptor.width,
            height: descriptor.height,
        });
        Ok(target)
    }

    fn delete_render_target(&mut self, target: RenderTargetHandle) {
        if !self.live_targets.remove(&target) {
            log::warn!("Deleting unknown or already deleted render target {:?}", target);
        }
        self.commands.push(GpuCommand::DeleteRenderTarget(target));
    }

    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>) {
        self.commands.push(GpuCommand::BindRenderTarget(target));
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.commands.push(GpuCommand::Viewport { x, y, width, height });
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) {
        self.commands.push(GpuCommand::Clear { flags, color });
    }

    fn set_clip_planes(&mut self, planes: &[Vec4]) {
        self.commands.push(GpuCommand::ClipPlanes(planes.to_vec()));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_limit_fails_later_allocations() {
        let mut backend = RecordingBackend::new().with_allocation_limit(1);
        assert!(backend.create_buffer(BufferKind::Vertex, "a").is_ok());

        let result = backend.create_buffer(BufferKind::Vertex, "b");
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
        assert_eq!(backend.live_buffers(), 1);
    }

    #[test]
    fn test_upload_to_deleted_buffer_fails() {
        let mut backend = RecordingBackend::new();
        let buffer = backend.create_buffer(BufferKind::Index, "indices").expect("buffer");
        backend.delete_buffer(buffer);

        assert!(backend.upload_buffer(buffer, &[0, 1]).is_err());
        assert_eq!(backend.live_buffers(), 0);
    }
}
