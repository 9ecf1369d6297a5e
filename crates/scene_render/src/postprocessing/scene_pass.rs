//! Render a scene subtree into the chain

use crate::foundation::collections::NodeId;
use crate::foundation::math::Vec4;
use crate::render::{FrameOptions, RenderResult, RenderTarget};
use crate::scene::Camera;

use super::pass::{Pass, PassContext, PassState};

/// Draws a scene root with a camera into the write target (or the screen)
///
/// Without overrides the pass renders whatever root and camera the composer
/// was invoked with.
#[derive(Debug, Clone)]
pub struct ScenePass {
    state: PassState,
    root: Option<NodeId>,
    camera: Option<Camera>,
    /// Clear color for this pass only
    pub clear_color: Option<[f32; 4]>,
    /// World-space clip planes applied while this pass draws
    pub clip_planes: Vec<Vec4>,
}

impl ScenePass {
    /// Pass that clears and renders the composer's scene
    pub fn new() -> Self {
        let mut state = PassState::new(true);
        state.clear = true;
        Self {
            state,
            root: None,
            camera: None,
            clear_color: None,
            clip_planes: Vec::new(),
        }
    }

    /// Render a different root than the composer's
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    /// Render with a different camera than the composer's
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Override the clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = Some(color);
        self
    }

    /// Clip against world-space planes `(a, b, c, d)`
    pub fn with_clip_planes(mut self, planes: Vec<Vec4>) -> Self {
        self.clip_planes = planes;
        self
    }

    /// Camera override, if any
    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.camera.as_mut()
    }
}

impl Default for ScenePass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ScenePass {
    fn name(&self) -> &str {
        "scene"
    }

    fn state(&self) -> &PassState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PassState {
        &mut self.state
    }

    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        write: &RenderTarget,
        _read: &RenderTarget,
        _delta: f32,
    ) -> RenderResult<()> {
        let options = FrameOptions {
            target: ctx.output(&self.state, write).cloned(),
            force_clear: self.state.clear,
            clear_color: self.clear_color,
            clip_planes: self.clip_planes.clone(),
        };
        let root = self.root.unwrap_or(ctx.root);
        let camera = self.camera.as_ref().unwrap_or(ctx.camera);
        ctx.renderer.render_with(ctx.scene, root, camera, &options)
    }
}
