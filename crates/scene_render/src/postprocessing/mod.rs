//! Post-processing
//!
//! An [`EffectComposer`] re-renders a frame through an ordered chain of
//! [`Pass`]es that ping-pong between two off-screen targets.

pub mod bloom_pass;
pub mod clear_pass;
pub mod composer;
pub mod pass;
pub mod scene_pass;
pub mod shader_pass;

pub use bloom_pass::{build_kernel, BloomPass, MAX_KERNEL_SIZE};
pub use clear_pass::ClearPass;
pub use composer::{ComposerStats, EffectComposer};
pub use pass::{Pass, PassContext, PassState};
pub use scene_pass::ScenePass;
pub use shader_pass::{ShaderPass, DEFAULT_SAMPLER};
