//! Post-processing pass interface

use crate::foundation::collections::NodeId;
use crate::render::{RenderResult, RenderTarget, Renderer};
use crate::scene::{Camera, SceneGraph};

/// Flags every pass carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassState {
    /// Disabled passes are skipped entirely
    pub enabled: bool,
    /// Whether the composer swaps read and write targets after this pass
    pub need_swap: bool,
    /// Whether the pass clears its output before drawing
    pub clear: bool,
    /// Set by the composer when no later enabled pass swaps
    pub render_to_screen: bool,
}

impl PassState {
    /// Enabled pass with the given swap behavior
    pub fn new(need_swap: bool) -> Self {
        Self {
            enabled: true,
            need_swap,
            clear: false,
            render_to_screen: false,
        }
    }
}

/// What a pass can reach while rendering
pub struct PassContext<'a> {
    /// Renderer driving the backend
    pub renderer: &'a mut Renderer,
    /// Scene being post-processed
    pub scene: &'a mut SceneGraph,
    /// Root of the drawn subtree
    pub root: NodeId,
    /// Camera the frame is drawn with
    pub camera: &'a Camera,
    /// Final destination; `None` is the default framebuffer
    pub screen: Option<RenderTarget>,
}

impl PassContext<'_> {
    /// Where a pass should draw: the screen when flagged `render_to_screen`, `write` otherwise
    pub fn output<'t>(&'t self, state: &PassState, write: &'t RenderTarget) -> Option<&'t RenderTarget> {
        if state.render_to_screen {
            self.screen.as_ref()
        } else {
            Some(write)
        }
    }
}

/// One stage of an [`EffectComposer`](super::EffectComposer) chain
pub trait Pass {
    /// Debug name
    fn name(&self) -> &str;

    /// Pass flags
    fn state(&self) -> &PassState;

    /// Mutable pass flags
    fn state_mut(&mut self) -> &mut PassState;

    /// Called whenever the composer's targets are (re)allocated
    fn set_size(&mut self, _renderer: &mut Renderer, _width: u32, _height: u32) -> RenderResult<()> {
        Ok(())
    }

    /// Draw the pass; `read` holds the previous result, `write` receives this one
    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        write: &RenderTarget,
        read: &RenderTarget,
        delta: f32,
    ) -> RenderResult<()>;

    /// Free GPU resources owned by the pass
    fn release(&mut self, _renderer: &mut Renderer) {}
}
