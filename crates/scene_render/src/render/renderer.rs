//! Frame driver
//!
//! The renderer owns the backend, the state cache and the per-frame render
//! list. One call to [`Renderer::render`] runs the whole frame:
//! world matrices, render list, buffer synchronization, state-cached draws.

use crate::core::config::RendererConfig;
use crate::foundation::collections::NodeId;
use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::geometry::{Face, Geometry, Mesh, MeshMaterial};
use crate::material::Material;
use crate::scene::{Camera, SceneGraph};

use super::backend::{
    CameraUniforms, ClearFlags, GpuBackend, ObjectUniforms, RenderTarget, RenderTargetDescriptor,
};
use super::render_list::RenderList;
use super::state_cache::StateCache;
use super::{RenderError, RenderResult};

/// Counters for the last rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls issued
    pub draw_calls: usize,
    /// Fixed-function and program transitions emitted
    pub state_changes: usize,
    /// Program binds (included in `state_changes`)
    pub program_binds: usize,
    /// Buffer uploads
    pub buffer_uploads: usize,
    /// Bytes uploaded
    pub uploaded_bytes: usize,
    /// Opaque items drawn
    pub opaque: usize,
    /// Transparent items drawn
    pub transparent: usize,
    /// Mesh nodes rejected by the frustum test
    pub culled: usize,
    /// Buffer groups skipped for lack of a material
    pub skipped: usize,
    /// World matrices recomputed
    pub world_updates: usize,
}

/// Per-call overrides for [`Renderer::render_with`]
#[derive(Debug, Clone, Default)]
pub struct FrameOptions {
    /// Draw into this target instead of the renderer's current one
    pub target: Option<RenderTarget>,
    /// Clear even when auto-clear is off
    pub force_clear: bool,
    /// Clear color for this frame only
    pub clear_color: Option<[f32; 4]>,
    /// User clip planes for this frame, in world space
    pub clip_planes: Vec<Vec4>,
}

/// High-level rendering coordinator and API facade
pub struct Renderer {
    backend: Box<dyn GpuBackend>,
    config: RendererConfig,
    state: StateCache,
    render_list: RenderList,
    output_size: (u32, u32),
    render_target: Option<RenderTarget>,
    camera: Option<CameraUniforms>,
    clip_planes_active: bool,
    quad: Option<Mesh>,
    frame_count: u64,
    stats: FrameStats,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("output_size", &self.output_size)
            .field("render_target", &self.render_target)
            .field("frame_count", &self.frame_count)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Create a renderer driving `backend`
    pub fn new(backend: Box<dyn GpuBackend>, config: RendererConfig) -> Self {
        let output_size = (config.output_width, config.output_height);
        log::info!("Renderer created with output size {}x{}", output_size.0, output_size.1);
        Self {
            backend,
            config,
            state: StateCache::new(),
            render_list: RenderList::new(),
            output_size,
            render_target: None,
            camera: None,
            clip_planes_active: false,
            quad: None,
            frame_count: 0,
            stats: FrameStats::default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Mutable configuration; takes effect on the next frame
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    /// The graphics backend
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// The graphics backend, mutably
    ///
    /// Changing GPU state directly through this bypasses the state cache;
    /// call [`reset_state`](Self::reset_state) afterwards.
    pub fn backend_mut(&mut self) -> &mut dyn GpuBackend {
        self.backend.as_mut()
    }

    /// Downcast the backend to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }

    /// Downcast the backend to its concrete type, mutably
    pub fn backend_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.backend.as_any_mut().downcast_mut::<T>()
    }

    /// Forget every cached GPU state
    pub fn reset_state(&mut self) {
        self.state.reset();
        self.camera = None;
    }

    /// Counters of the last frame
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Render list of the last scene frame
    pub fn render_list(&self) -> &RenderList {
        &self.render_list
    }

    /// Default framebuffer size
    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    /// Resize the default framebuffer
    pub fn set_output_size(&mut self, width: u32, height: u32) {
        if self.output_size != (width, height) {
            log::info!("Output size changed: {}x{} -> {}x{}", self.output_size.0, self.output_size.1, width, height);
            self.output_size = (width, height);
        }
    }

    /// Route subsequent frames to `target`, or to the default framebuffer with `None`
    pub fn set_render_target(&mut self, target: Option<RenderTarget>) {
        self.render_target = target;
    }

    /// Target frames are routed to
    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.render_target.as_ref()
    }

    /// Allocate an off-screen render target
    pub fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        depth_buffer: bool,
        label: &str,
    ) -> RenderResult<RenderTarget> {
        let descriptor = RenderTargetDescriptor {
            width,
            height,
            depth_buffer,
            label: label.to_string(),
        };
        let handle = self.backend.create_render_target(&descriptor)?;
        log::debug!("Created render target '{}' ({}x{})", label, width, height);
        Ok(RenderTarget {
            handle,
            width,
            height,
            depth_buffer,
        })
    }

    /// Free an off-screen render target
    pub fn release_render_target(&mut self, target: &RenderTarget) {
        if self.render_target.as_ref() == Some(target) {
            self.render_target = None;
        }
        self.backend.delete_render_target(target.handle);
    }

    /// Bind `target` (or the default framebuffer) and set the viewport to its size
    pub fn bind_target(&mut self, target: Option<&RenderTarget>) {
        let (width, height) = target.map_or(self.output_size, RenderTarget::size);
        self.backend.bind_render_target(target.map(|t| t.handle));
        self.backend.set_viewport(0, 0, width, height);
    }

    /// Bind `target` and clear it
    pub fn clear_target(&mut self, target: Option<&RenderTarget>, flags: ClearFlags, color: [f32; 4]) {
        self.bind_target(target);
        self.backend.clear(flags, color);
    }

    fn auto_clear_flags(&self) -> ClearFlags {
        let mut flags = ClearFlags::empty();
        flags.set(ClearFlags::COLOR, self.config.auto_clear_color);
        flags.set(ClearFlags::DEPTH, self.config.auto_clear_depth);
        flags.set(ClearFlags::STENCIL, self.config.auto_clear_stencil);
        flags
    }

    /// Render the subtree under `root` into the current render target
    pub fn render(&mut self, graph: &mut SceneGraph, root: NodeId, camera: &Camera) -> RenderResult<()> {
        self.render_with(graph, root, camera, &FrameOptions::default())
    }

    /// Render the subtree under `root` into `target`
    pub fn render_to_target(
        &mut self,
        graph: &mut SceneGraph,
        root: NodeId,
        camera: &Camera,
        target: &RenderTarget,
        force_clear: bool,
    ) -> RenderResult<()> {
        let options = FrameOptions {
            target: Some(target.clone()),
            force_clear,
            ..FrameOptions::default()
        };
        self.render_with(graph, root, camera, &options)
    }

    /// Render one frame with per-call overrides
    ///
    /// Any error aborts the frame; GPU state already emitted stays applied.
    pub fn render_with(
        &mut self,
        graph: &mut SceneGraph,
        root: NodeId,
        camera: &Camera,
        options: &FrameOptions,
    ) -> RenderResult<()> {
        self.frame_count += 1;
        self.stats = FrameStats::default();

        let result = self.render_frame(graph, root, camera, options);
        if let Err(err) = &result {
            log::error!("Frame {} aborted: {}", self.frame_count, err);
        }
        result
    }

    fn render_frame(
        &mut self,
        graph: &mut SceneGraph,
        root: NodeId,
        camera: &Camera,
        options: &FrameOptions,
    ) -> RenderResult<()> {
        self.stats.world_updates = graph.update_world_matrices(root, false)?;

        self.render_list.project(graph, root, camera)?;
        if self.config.sort_objects {
            self.render_list.sort();
        }
        self.stats.culled = self.render_list.culled();
        self.stats.skipped = self.render_list.skipped();
        self.stats.opaque = self.render_list.opaque().len();
        self.stats.transparent = self.render_list.transparent().len();

        let target = options.target.clone().or_else(|| self.render_target.clone());
        self.bind_target(target.as_ref());
        if self.config.auto_clear || options.force_clear {
            let color = options.clear_color.unwrap_or(self.config.clear_color);
            self.backend.clear(self.auto_clear_flags(), color);
        }

        if !options.clip_planes.is_empty() || self.clip_planes_active {
            self.backend.set_clip_planes(&options.clip_planes);
            self.clip_planes_active = !options.clip_planes.is_empty();
        }

        let camera_uniforms = camera.uniforms();
        self.prepare_camera(camera_uniforms.clone());
        self.state.forget_geometry();

        let list = std::mem::take(&mut self.render_list);
        let drawn = self.draw_list(graph, &list, &camera_uniforms);
        self.render_list = list;
        drawn?;

        log::trace!(
            "Frame {}: {} draws, {} state changes, {} uploads",
            self.frame_count,
            self.stats.draw_calls,
            self.stats.state_changes,
            self.stats.buffer_uploads
        );
        Ok(())
    }

    fn draw_list(&mut self, graph: &mut SceneGraph, list: &RenderList, camera: &CameraUniforms) -> RenderResult<()> {
        for item in list.iter() {
            let node = graph.node_mut(item.node)?;
            let world = *node.world_matrix();
            let Some(mesh) = node.mesh_mut() else {
                continue;
            };

            let upload = mesh.sync_group(item.group, self.backend.as_mut(), item.material.as_ref(), self.config.dispose_staging)?;
            self.stats.buffer_uploads += upload.uploads;
            self.stats.uploaded_bytes += upload.bytes;

            draw_group(
                DrawContext {
                    backend: self.backend.as_mut(),
                    state: &mut self.state,
                    stats: &mut self.stats,
                    camera,
                },
                mesh,
                item.group,
                item.material.as_ref(),
                &world,
            )?;
        }
        Ok(())
    }

    fn prepare_camera(&mut self, uniforms: CameraUniforms) {
        // Programs only get camera uniforms when bound, so a new camera forces a rebind
        if self.camera.as_ref() != Some(&uniforms) {
            self.state.reset_program();
            self.camera = Some(uniforms);
        }
    }

    /// Draw a full-screen quad with `material` into `target` (or the screen)
    pub fn render_fullscreen(
        &mut self,
        material: &dyn Material,
        target: Option<&RenderTarget>,
        clear: bool,
    ) -> RenderResult<()> {
        self.bind_target(target);
        if clear {
            self.backend.clear(self.auto_clear_flags(), self.config.clear_color);
        }

        let camera = CameraUniforms::identity();
        self.prepare_camera(camera.clone());
        self.state.forget_geometry();

        let quad = self.quad.get_or_insert_with(fullscreen_quad);
        let upload = quad.sync_group(0, self.backend.as_mut(), material, false)?;
        self.stats.buffer_uploads += upload.uploads;
        self.stats.uploaded_bytes += upload.bytes;

        draw_group(
            DrawContext {
                backend: self.backend.as_mut(),
                state: &mut self.state,
                stats: &mut self.stats,
                camera: &camera,
            },
            quad,
            0,
            material,
            &Mat4::identity(),
        )?;
        self.state.forget_geometry();
        Ok(())
    }

    /// Free the GPU buffers of a mesh removed from the scene
    pub fn release_mesh(&mut self, mesh: &mut Mesh) {
        mesh.release(self.backend.as_mut());
    }

    /// Detach and destroy a subtree, releasing every GPU buffer it owned
    pub fn destroy_subtree(&mut self, graph: &mut SceneGraph, node: NodeId) -> RenderResult<()> {
        graph.detach(node)?;
        let meshes = graph.destroy(node)?;
        for mut mesh in meshes {
            mesh.release(self.backend.as_mut());
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(mut quad) = self.quad.take() {
            quad.release(self.backend.as_mut());
        }
        log::info!("Renderer dropped after {} frames", self.frame_count);
    }
}

struct DrawContext<'a> {
    backend: &'a mut dyn GpuBackend,
    state: &'a mut StateCache,
    stats: &'a mut FrameStats,
    camera: &'a CameraUniforms,
}

fn draw_group(
    ctx: DrawContext<'_>,
    mesh: &Mesh,
    group_index: usize,
    material: &dyn Material,
    world: &Mat4,
) -> RenderResult<()> {
    let group = mesh
        .group(group_index)
        .ok_or_else(|| RenderError::RenderingFailed(format!("buffer group {group_index} does not exist")))?;
    let buffers = group
        .buffers()
        .ok_or_else(|| RenderError::RenderingFailed("buffer group drawn before realize".to_string()))?;

    ctx.stats.state_changes += ctx.state.apply_material(ctx.backend, material);

    if ctx.state.bind_program(ctx.backend, material.program()) {
        ctx.stats.program_binds += 1;
        ctx.stats.state_changes += 1;
        ctx.backend.set_camera_uniforms(ctx.camera);
    }
    if ctx.state.bind_material(material) {
        material.bind_uniforms(ctx.backend)?;
    }

    ctx.backend.set_object_uniforms(&ObjectUniforms::new(*world, &ctx.camera.view));

    if ctx.state.bind_geometry(buffers.position) {
        group.bind_attributes(ctx.backend, material)?;
    }
    group.draw(ctx.backend, material.is_wireframe())?;
    ctx.stats.draw_calls += 1;
    Ok(())
}

/// Two triangles covering clip space with UVs from (0, 0) to (1, 1)
fn fullscreen_quad() -> Mesh {
    let vertices = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ];
    let uvs = vec![
        [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)],
        [Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)],
    ];
    let geometry = Geometry::new(vertices, vec![Face::new(0, 1, 2), Face::new(0, 2, 3)]).with_uvs(uvs);
    Mesh::new(geometry, MeshMaterial::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{GpuCommand, RecordingBackend};

    fn renderer() -> Renderer {
        Renderer::new(Box::new(RecordingBackend::new()), RendererConfig::default())
    }

    #[test]
    fn test_downcast_backend() {
        let renderer = renderer();
        assert!(renderer.backend_as::<RecordingBackend>().is_some());
    }

    #[test]
    fn test_empty_scene_binds_and_clears_screen() {
        let mut renderer = renderer();
        let mut graph = SceneGraph::new();
        let root = graph.create_node();
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);

        renderer.render(&mut graph, root, &camera).expect("render");

        let backend = renderer.backend_as::<RecordingBackend>().expect("recording backend");
        assert_eq!(backend.commands()[0], GpuCommand::BindRenderTarget(None));
        assert!(backend
            .commands()
            .iter()
            .any(|c| matches!(c, GpuCommand::Clear { flags, .. } if flags.contains(ClearFlags::COLOR | ClearFlags::DEPTH))));
        assert_eq!(renderer.stats().draw_calls, 0);
        assert_eq!(renderer.frame_count(), 1);
    }

    #[test]
    fn test_stale_root_aborts_frame() {
        let mut renderer = renderer();
        let mut graph = SceneGraph::new();
        let root = graph.create_node();
        graph.destroy(root).expect("destroy");
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);

        let result = renderer.render(&mut graph, root, &camera);
        assert!(matches!(result, Err(RenderError::Scene(_))));
    }

    #[test]
    fn test_release_current_render_target_falls_back_to_screen() {
        let mut renderer = renderer();
        let target = renderer.create_render_target(64, 64, true, "offscreen").expect("target");
        renderer.set_render_target(Some(target.clone()));

        renderer.release_render_target(&target);
        assert!(renderer.render_target().is_none());
        assert_eq!(renderer.backend_as::<RecordingBackend>().expect("backend").live_targets(), 0);
    }
}
