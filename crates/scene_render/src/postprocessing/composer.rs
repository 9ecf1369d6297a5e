//! Effect composer
//!
//! Runs an ordered chain of passes over two same-sized off-screen targets.
//! Each pass reads the previous result from `read` and writes into `write`;
//! after a pass with `need_swap` the two are exchanged. Trailing passes with no
//! swapping pass after them draw straight to the screen (the renderer's
//! externally set target).

use crate::core::config::ComposerConfig;
use crate::foundation::collections::NodeId;
use crate::render::{RenderResult, RenderTarget, Renderer};
use crate::scene::{Camera, SceneGraph};

use super::pass::{Pass, PassContext};

/// Counters of the last composed frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposerStats {
    /// Enabled passes executed
    pub passes_run: usize,
    /// Read/write exchanges
    pub swaps: usize,
}

/// Ping-pong pass chain
pub struct EffectComposer {
    config: ComposerConfig,
    passes: Vec<Box<dyn Pass>>,
    read: Option<RenderTarget>,
    write: Option<RenderTarget>,
    size_override: Option<(u32, u32)>,
    stats: ComposerStats,
}

impl std::fmt::Debug for EffectComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.passes.iter().map(|pass| pass.name()).collect();
        f.debug_struct("EffectComposer")
            .field("passes", &names)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl EffectComposer {
    /// Create an empty chain; targets are allocated on first render
    pub fn new(config: ComposerConfig) -> Self {
        let size_override = config.fixed_size;
        Self {
            config,
            passes: Vec::new(),
            read: None,
            write: None,
            size_override,
            stats: ComposerStats::default(),
        }
    }

    /// Append a pass
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        log::debug!("Composer: added pass '{}'", pass.name());
        self.passes.push(pass);
    }

    /// Insert a pass at `index` (clamped to the chain length)
    pub fn insert_pass(&mut self, index: usize, pass: Box<dyn Pass>) {
        let index = index.min(self.passes.len());
        log::debug!("Composer: inserted pass '{}' at {}", pass.name(), index);
        self.passes.insert(index, pass);
    }

    /// Number of passes, enabled or not
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Borrow a pass
    pub fn pass(&self, index: usize) -> Option<&(dyn Pass + 'static)> {
        self.passes.get(index).map(|pass| pass.as_ref())
    }

    /// Mutably borrow a pass, e.g. to toggle `enabled`
    pub fn pass_mut(&mut self, index: usize) -> Option<&mut (dyn Pass + 'static)> {
        self.passes.get_mut(index).map(|pass| pass.as_mut())
    }

    /// Counters of the last [`render`](Self::render)
    pub fn stats(&self) -> &ComposerStats {
        &self.stats
    }

    /// Target the next pass reads from
    pub fn read_target(&self) -> Option<&RenderTarget> {
        self.read.as_ref()
    }

    /// Target the next pass writes to
    pub fn write_target(&self) -> Option<&RenderTarget> {
        self.write.as_ref()
    }

    fn desired_size(&self, renderer: &Renderer) -> (u32, u32) {
        self.size_override.unwrap_or_else(|| renderer.output_size())
    }

    fn release_targets(&mut self, renderer: &mut Renderer) {
        for target in [self.read.take(), self.write.take()].into_iter().flatten() {
            renderer.release_render_target(&target);
        }
    }

    fn allocate_targets(&mut self, renderer: &mut Renderer, first: Option<RenderTarget>, size: (u32, u32)) -> RenderResult<()> {
        self.release_targets(renderer);
        let read = match first {
            Some(target) => target,
            None => renderer.create_render_target(size.0, size.1, self.config.depth_buffer, "composer_a")?,
        };
        let (width, height) = read.size();
        let write = renderer.create_render_target(width, height, read.depth_buffer, "composer_b")?;
        self.read = Some(read);
        self.write = Some(write);

        log::debug!("Composer targets allocated at {}x{}", width, height);
        for pass in &mut self.passes {
            pass.set_size(renderer, width, height)?;
        }
        Ok(())
    }

    fn ensure_targets(&mut self, renderer: &mut Renderer) -> RenderResult<()> {
        let size = self.desired_size(renderer);
        let current = self.read.as_ref().zip(self.write.as_ref()).map(|(read, write)| (read.size(), write.size()));
        match current {
            Some((read, write)) if read == size && write == size => Ok(()),
            _ => self.allocate_targets(renderer, None, size),
        }
    }

    /// Replace target A with `target` (or a fresh one at the renderer's size); B is resized to match
    pub fn reset(&mut self, renderer: &mut Renderer, target: Option<RenderTarget>) -> RenderResult<()> {
        let size = match &target {
            Some(target) => target.size(),
            None => renderer.output_size(),
        };
        self.size_override = target.as_ref().map(RenderTarget::size).or(self.config.fixed_size);
        self.allocate_targets(renderer, target, size)
    }

    /// Reallocate both targets at a fixed size and notify every pass
    pub fn set_size(&mut self, renderer: &mut Renderer, width: u32, height: u32) -> RenderResult<()> {
        self.size_override = Some((width, height));
        self.allocate_targets(renderer, None, (width, height))
    }

    /// Run every enabled pass in order
    ///
    /// The renderer's externally set target is treated as the screen and is
    /// restored afterwards, even when a pass fails.
    pub fn render(
        &mut self,
        renderer: &mut Renderer,
        scene: &mut SceneGraph,
        root: NodeId,
        camera: &Camera,
        delta: f32,
    ) -> RenderResult<()> {
        self.stats = ComposerStats::default();
        self.ensure_targets(renderer)?;

        let screen = renderer.render_target().cloned();
        self.mark_screen_passes();

        let result = self.run_passes(renderer, scene, root, camera, delta, screen.clone());
        renderer.set_render_target(screen);

        log::trace!(
            "Composer ran {} passes with {} swaps",
            self.stats.passes_run,
            self.stats.swaps
        );
        result
    }

    /// An enabled pass draws to the screen when no later enabled pass swaps
    fn mark_screen_passes(&mut self) {
        let mut later_swap = false;
        for pass in self.passes.iter_mut().rev() {
            let state = pass.state_mut();
            if !state.enabled {
                state.render_to_screen = false;
                continue;
            }
            state.render_to_screen = !later_swap;
            later_swap |= state.need_swap;
        }
    }

    fn run_passes(
        &mut self,
        renderer: &mut Renderer,
        scene: &mut SceneGraph,
        root: NodeId,
        camera: &Camera,
        delta: f32,
        screen: Option<RenderTarget>,
    ) -> RenderResult<()> {
        let mut ctx = PassContext {
            renderer,
            scene,
            root,
            camera,
            screen,
        };

        for pass in &mut self.passes {
            if !pass.state().enabled {
                continue;
            }
            let (Some(write), Some(read)) = (self.write.clone(), self.read.clone()) else {
                continue;
            };

            pass.render(&mut ctx, &write, &read, delta)?;
            self.stats.passes_run += 1;

            if pass.state().need_swap {
                std::mem::swap(&mut self.read, &mut self.write);
                self.stats.swaps += 1;
            }
        }
        Ok(())
    }

    /// Free both targets and every pass's resources
    pub fn release(&mut self, renderer: &mut Renderer) {
        self.release_targets(renderer);
        for pass in &mut self.passes {
            pass.release(renderer);
        }
    }
}

impl Drop for EffectComposer {
    fn drop(&mut self) {
        if self.read.is_some() || self.write.is_some() {
            log::warn!("EffectComposer dropped with live render targets; call release() first");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RendererConfig;
    use crate::foundation::math::Vec3;
    use crate::postprocessing::PassState;
    use crate::render::RecordingBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<(RenderTarget, RenderTarget, bool)>>>;

    /// Records the (write, read) pair and flags it was run with
    #[derive(Debug)]
    struct RecordingPass {
        state: PassState,
        calls: Calls,
    }

    impl RecordingPass {
        fn new(need_swap: bool, calls: &Calls) -> Self {
            Self {
                state: PassState::new(need_swap),
                calls: calls.clone(),
            }
        }
    }

    impl Pass for RecordingPass {
        fn name(&self) -> &str {
            "recording"
        }

        fn state(&self) -> &PassState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut PassState {
            &mut self.state
        }

        fn render(
            &mut self,
            _ctx: &mut PassContext<'_>,
            write: &RenderTarget,
            read: &RenderTarget,
            _delta: f32,
        ) -> RenderResult<()> {
            self.calls
                .borrow_mut()
                .push((write.clone(), read.clone(), self.state.render_to_screen));
            Ok(())
        }
    }

    fn setup() -> (Renderer, SceneGraph, NodeId, Camera) {
        let renderer = Renderer::new(Box::new(RecordingBackend::new()), RendererConfig::default().with_output_size(320, 240));
        let mut scene = SceneGraph::new();
        let root = scene.create_node();
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 4.0 / 3.0, 0.1, 100.0);
        (renderer, scene, root, camera)
    }

    #[test]
    fn test_swaps_alternate_targets() {
        let (mut renderer, mut scene, root, camera) = setup();
        let calls = Calls::default();
        let mut composer = EffectComposer::new(ComposerConfig::default());
        composer.add_pass(Box::new(RecordingPass::new(true, &calls)));
        composer.add_pass(Box::new(RecordingPass::new(true, &calls)));

        composer.render(&mut renderer, &mut scene, root, &camera, 0.016).expect("compose");

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        // Second pass reads what the first wrote
        assert_eq!(calls[1].1, calls[0].0);
        assert_eq!(calls[1].0, calls[0].1);
        assert_eq!(composer.stats().swaps, 2);
        composer.release(&mut renderer);
    }

    #[test]
    fn test_targets_follow_output_size() {
        let (mut renderer, mut scene, root, camera) = setup();
        let calls = Calls::default();
        let mut composer = EffectComposer::new(ComposerConfig::default());
        composer.add_pass(Box::new(RecordingPass::new(true, &calls)));

        composer.render(&mut renderer, &mut scene, root, &camera, 0.016).expect("compose");
        assert_eq!(composer.read_target().map(RenderTarget::size), Some((320, 240)));

        composer.render(&mut renderer, &mut scene, root, &camera, 0.016).expect("compose");
        renderer.set_output_size(640, 480);
        composer.render(&mut renderer, &mut scene, root, &camera, 0.016).expect("compose");

        assert_eq!(composer.write_target().map(RenderTarget::size), Some((640, 480)));
        assert_eq!(renderer.backend_as::<RecordingBackend>().expect("backend").live_targets(), 2);

        composer.release(&mut renderer);
        assert_eq!(renderer.backend_as::<RecordingBackend>().expect("backend").live_targets(), 0);
    }

    #[test]
    fn test_reset_adopts_given_target() {
        let (mut renderer, mut scene, root, camera) = setup();
        let calls = Calls::default();
        let mut composer = EffectComposer::new(ComposerConfig::default());
        composer.add_pass(Box::new(RecordingPass::new(false, &calls)));

        let target = renderer.create_render_target(128, 64, true, "external").expect("target");
        composer.reset(&mut renderer, Some(target.clone())).expect("reset");
        assert_eq!(composer.read_target(), Some(&target));
        assert_eq!(composer.write_target().map(RenderTarget::size), Some((128, 64)));

        // Reset sizes stick across frames
        composer.render(&mut renderer, &mut scene, root, &camera, 0.016).expect("compose");
        assert_eq!(composer.read_target(), Some(&target));
        composer.release(&mut renderer);
    }

    #[test]
    fn test_screen_target_is_restored() {
        let (mut renderer, mut scene, root, camera) = setup();
        let screen = renderer.create_render_target(320, 240, true, "screen").expect("screen");
        renderer.set_render_target(Some(screen.clone()));

        let calls = Calls::default();
        let mut composer = EffectComposer::new(ComposerConfig::default());
        composer.add_pass(Box::new(RecordingPass::new(true, &calls)));
        composer.render(&mut renderer, &mut scene, root, &camera, 0.016).expect("compose");

        assert_eq!(renderer.render_target(), Some(&screen));
        composer.release(&mut renderer);
    }

    #[test]
    fn test_insert_pass_clamps_index() {
        let calls = Calls::default();
        let mut composer = EffectComposer::new(ComposerConfig::default());
        composer.add_pass(Box::new(RecordingPass::new(true, &calls)));
        composer.insert_pass(10, Box::new(RecordingPass::new(false, &calls)));
        composer.insert_pass(0, Box::new(RecordingPass::new(false, &calls)));

        assert_eq!(composer.pass_count(), 3);
        assert!(composer.pass(1).map(|p| p.state().need_swap).unwrap_or(false));
        assert!(!composer.pass(2).map(|p| p.state().need_swap).unwrap_or(true));
    }
}
