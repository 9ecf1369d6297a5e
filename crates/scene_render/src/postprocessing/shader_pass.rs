//! Full-screen shader pass

use crate::material::{ShaderMaterial, UniformValue};
use crate::render::{RenderResult, RenderTarget};

use super::pass::{Pass, PassContext, PassState};

/// Sampler uniform the read target is bound to unless configured otherwise
pub const DEFAULT_SAMPLER: &str = "t_diffuse";

/// Runs a [`ShaderMaterial`] over the whole read target
///
/// The workhorse for copy, tone mapping and color grading passes.
#[derive(Debug, Clone)]
pub struct ShaderPass {
    state: PassState,
    material: ShaderMaterial,
    sampler: String,
}

impl ShaderPass {
    /// Pass that samples the read target through `t_diffuse`
    pub fn new(material: ShaderMaterial) -> Self {
        Self {
            state: PassState::new(true),
            material,
            sampler: DEFAULT_SAMPLER.to_string(),
        }
    }

    /// Bind the read target to a different sampler uniform
    pub fn with_sampler(mut self, sampler: impl Into<String>) -> Self {
        self.sampler = sampler.into();
        self
    }

    /// Clear the output before drawing
    pub fn with_clear(mut self, clear: bool) -> Self {
        self.state.clear = clear;
        self
    }

    /// Sampler uniform name
    pub fn sampler(&self) -> &str {
        &self.sampler
    }

    /// The pass material
    pub fn material(&self) -> &ShaderMaterial {
        &self.material
    }

    /// The pass material, e.g. to tweak uniforms between frames
    pub fn material_mut(&mut self) -> &mut ShaderMaterial {
        &mut self.material
    }
}

impl Pass for ShaderPass {
    fn name(&self) -> &str {
        self.material.name.as_deref().unwrap_or("shader")
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
        read: &RenderTarget,
        _delta: f32,
    ) -> RenderResult<()> {
        self.material
            .set_uniform(self.sampler.clone(), UniformValue::Texture(read.handle));
        let output = ctx.output(&self.state, write).cloned();
        ctx.renderer
            .render_fullscreen(&self.material, output.as_ref(), self.state.clear)
    }
}
