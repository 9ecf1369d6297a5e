//! Clear pass

use crate::render::{ClearFlags, RenderResult, RenderTarget};

use super::pass::{Pass, PassContext, PassState};

/// Clears the write target (or the screen) to a solid color
#[derive(Debug, Clone)]
pub struct ClearPass {
    state: PassState,
    /// Color written to the color attachment
    pub color: [f32; 4],
    /// Attachments affected
    pub flags: ClearFlags,
}

impl ClearPass {
    /// Clear color, depth and stencil to `color`
    pub fn new(color: [f32; 4]) -> Self {
        let mut state = PassState::new(false);
        state.clear = true;
        Self {
            state,
            color,
            flags: ClearFlags::all(),
        }
    }
}

impl Default for ClearPass {
    fn default() -> Self {
        Self::new([0.0, 0.0, 0.0, 1.0])
    }
}

impl Pass for ClearPass {
    fn name(&self) -> &str {
        "clear"
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
        let output = ctx.output(&self.state, write).cloned();
        ctx.renderer.clear_target(output.as_ref(), self.flags, self.color);
        Ok(())
    }
}
