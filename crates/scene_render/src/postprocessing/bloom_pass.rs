//! Separable Gaussian bloom
//!
//! The read target is blurred horizontally into private target X, vertically
//! from X into private target Y, and Y is added back onto the read target.
//! The pass never swaps: the next pass sees the bloomed image in `read`.

use crate::foundation::math::Vec2;
use crate::material::{BlendState, ShaderMaterial, UniformValue};
use crate::render::{ProgramHandle, RenderResult, RenderTarget, Renderer};

use super::pass::{Pass, PassContext, PassState};
use super::shader_pass::DEFAULT_SAMPLER;

/// Largest convolution kernel the shaders accept
pub const MAX_KERNEL_SIZE: usize = 25;

/// Normalized 1D Gaussian kernel for `sigma`
///
/// Size is `2 * ceil(3 * sigma) + 1`, capped at [`MAX_KERNEL_SIZE`]. A
/// non-positive sigma yields the identity kernel `[1.0]`.
pub fn build_kernel(sigma: f32) -> Vec<f32> {
    if sigma.is_nan() || sigma <= 0.0 {
        return vec![1.0];
    }

    let size = (2 * (3.0 * sigma).ceil() as usize + 1).min(MAX_KERNEL_SIZE);
    let half_width = (size - 1) as f32 * 0.5;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let x = i as f32 - half_width;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Two-stage separable blur composited additively over its input
#[derive(Debug)]
pub struct BloomPass {
    state: PassState,
    convolution: ShaderMaterial,
    composite: ShaderMaterial,
    kernel: Vec<f32>,
    strength: f32,
    target_x: Option<RenderTarget>,
    target_y: Option<RenderTarget>,
}

impl BloomPass {
    /// Bloom with the given convolution and copy programs
    ///
    /// `convolution` reads `t_diffuse`, `kernel` and `image_increment`;
    /// `copy` reads `t_diffuse` and `opacity`.
    pub fn new(
        convolution: ProgramHandle,
        copy: ProgramHandle,
        strength: f32,
        sigma: f32,
    ) -> Self {
        let kernel = build_kernel(sigma);
        let convolution = ShaderMaterial::new(convolution)
            .with_name("bloom_convolution")
            .with_uniform("kernel", UniformValue::FloatArray(kernel.clone()));
        let composite = ShaderMaterial::new(copy)
            .with_name("bloom_composite")
            .with_blending(BlendState::ADDITIVE)
            .with_uniform("opacity", UniformValue::Float(strength));

        Self {
            state: PassState::new(false),
            convolution,
            composite,
            kernel,
            strength,
            target_x: None,
            target_y: None,
        }
    }

    /// Convolution weights in use
    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    /// Additive composite strength
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Change the composite strength
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
        self.composite.set_uniform("opacity", UniformValue::Float(strength));
    }

    /// Private blur targets, once allocated
    pub fn blur_targets(&self) -> Option<(&RenderTarget, &RenderTarget)> {
        self.target_x.as_ref().zip(self.target_y.as_ref())
    }

    fn release_targets(&mut self, renderer: &mut Renderer) {
        for target in [self.target_x.take(), self.target_y.take()].into_iter().flatten() {
            renderer.release_render_target(&target);
        }
    }

    fn allocate_targets(&mut self, renderer: &mut Renderer, width: u32, height: u32) -> RenderResult<()> {
        self.release_targets(renderer);
        self.target_x = Some(renderer.create_render_target(width, height, false, "bloom_x")?);
        self.target_y = Some(renderer.create_render_target(width, height, false, "bloom_y")?);
        Ok(())
    }

    fn convolve(
        &mut self,
        renderer: &mut Renderer,
        source: &RenderTarget,
        destination: &RenderTarget,
        increment: Vec2,
    ) -> RenderResult<()> {
        self.convolution
            .set_uniform(DEFAULT_SAMPLER, UniformValue::Texture(source.handle));
        self.convolution
            .set_uniform("image_increment", UniformValue::Vec2(increment));
        renderer.render_fullscreen(&self.convolution, Some(destination), true)
    }
}

impl Pass for BloomPass {
    fn name(&self) -> &str {
        "bloom"
    }

    fn state(&self) -> &PassState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PassState {
        &mut self.state
    }

    fn set_size(&mut self, renderer: &mut Renderer, width: u32, height: u32) -> RenderResult<()> {
        self.allocate_targets(renderer, width, height)
    }

    fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        _write: &RenderTarget,
        read: &RenderTarget,
        _delta: f32,
    ) -> RenderResult<()> {
        // Added after the composer allocated its targets: no set_size yet
        if self.blur_targets().map(|(x, _)| x.size()) != Some(read.size()) {
            self.allocate_targets(ctx.renderer, read.width, read.height)?;
        }
        let (Some(x), Some(y)) = (self.target_x.clone(), self.target_y.clone()) else {
            return Ok(());
        };

        let (width, height) = read.size();
        self.convolve(ctx.renderer, read, &x, Vec2::new(1.0 / width as f32, 0.0))?;
        self.convolve(ctx.renderer, &x, &y, Vec2::new(0.0, 1.0 / height as f32))?;

        self.composite
            .set_uniform(DEFAULT_SAMPLER, UniformValue::Texture(y.handle));
        ctx.renderer
            .render_fullscreen(&self.composite, Some(read), self.state.clear)
    }

    fn release(&mut self, renderer: &mut Renderer) {
        self.release_targets(renderer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RendererConfig;
    use crate::foundation::math::Vec3;
    use crate::render::{GpuCommand, RecordingBackend};
    use crate::scene::{Camera, SceneGraph};
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_size_and_normalization() {
        let kernel = build_kernel(1.0);
        assert_eq!(kernel.len(), 7);
        assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(kernel[0], kernel[6], epsilon = 1e-7);
        assert!(kernel[3] > kernel[2]);

        assert_eq!(build_kernel(4.0).len(), MAX_KERNEL_SIZE);
        assert_relative_eq!(build_kernel(4.0).iter().sum::<f32>(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_sigma_is_identity() {
        assert_eq!(build_kernel(0.0), vec![1.0]);
        assert_eq!(build_kernel(f32::NAN), vec![1.0]);
    }

    #[test]
    fn test_blur_then_composite_into_read() {
        let mut renderer = Renderer::new(Box::new(RecordingBackend::new()), RendererConfig::default());
        let mut scene = SceneGraph::new();
        let root = scene.create_node();
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        let read = renderer.create_render_target(64, 32, true, "read").expect("read");
        let write = renderer.create_render_target(64, 32, true, "write").expect("write");

        let mut bloom = BloomPass::new(ProgramHandle(1), ProgramHandle(2), 1.5, 2.0);
        let mut ctx = PassContext {
            renderer: &mut renderer,
            scene: &mut scene,
            root,
            camera: &camera,
            screen: None,
        };
        bloom.render(&mut ctx, &write, &read, 0.016).expect("bloom");

        let (x, y) = bloom.blur_targets().expect("blur targets");
        assert_eq!(x.size(), (64, 32));
        let backend = renderer.backend_as::<RecordingBackend>().expect("backend");
        let bound: Vec<_> = backend
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::BindRenderTarget(target) => *target,
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec![x.handle, y.handle, read.handle]);
        assert_eq!(backend.draw_calls().count(), 3);

        bloom.release(&mut renderer);
        assert!(bloom.blur_targets().is_none());
    }
}
