//! # Rendering System
//!
//! Turns a [`SceneGraph`](crate::scene::SceneGraph) into draw calls against a
//! [`GpuBackend`].
//!
//! ## Architecture
//!
//! - **Renderer**: frame driver and API facade
//! - **RenderList**: per-frame culling, bucketing and depth sorting
//! - **StateCache**: last-applied GPU state, consulted before every transition
//! - **GpuBackend**: immediate-mode binding layer implemented per graphics API
//! - **RecordingBackend**: headless backend that records every call
//!
//! ## Frame Flow
//!
//! 1. World matrices are brought up to date from the root down
//! 2. The render list is rebuilt and sorted (opaque front-to-back, transparent back-to-front)
//! 3. Every listed buffer group uploads its dirty channels
//! 4. Items are drawn through the state cache

mod backend;
mod recording;
mod render_list;
mod renderer;
mod state_cache;


pub use backend::{
    BackendResult, BufferHandle, BufferKind, CameraUniforms, ClearFlags, FrontFace, GpuBackend,
    ObjectUniforms, ProgramHandle, RenderTarget, RenderTargetDescriptor, RenderTargetHandle,
    Topology, VertexAttribute,
};
pub use recording::{GpuCommand, RecordingBackend};
pub use render_list::{RenderItem, RenderList};
pub use renderer::{FrameOptions, FrameStats, Renderer};
pub use state_cache::StateCache;

use thiserror::Error;

use crate::scene::SceneError;

/// Rendering system errors
///
/// Comprehensive error types for all rendering operations, from resource
/// allocation to frame submission. Any error aborts the current frame.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A rendering operation failed during execution
    ///
    /// Raised for invalid draw requests such as rendering into a released
    /// target or drawing a group that was never realized.
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// Resource creation or management failed
    ///
    /// Occurs when GPU resources (buffers, programs, render targets) cannot be
    /// allocated. Fatal for the frame that requested them.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Backend-specific error occurred
    ///
    /// Wraps errors reported by the graphics API binding in a generic form.
    #[error("Backend error: {0}")]
    BackendError(String),

    /// The scene graph rejected an operation issued during rendering
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
