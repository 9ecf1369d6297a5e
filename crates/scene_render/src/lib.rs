//! # Scene Render
//!
//! A retained-mode 3D scene description that is turned, once per frame, into
//! draw calls against an immediate-mode GPU backend.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-backed node tree with short-circuiting transform propagation
//! - **Buffer Groups**: Geometry packed into 16-bit-indexable GPU buffers with per-channel dirty tracking
//! - **Render Lists**: Frustum culling plus stable opaque/transparent depth sorting
//! - **State Cache**: Redundant GPU state transitions are never emitted
//! - **Post-Processing**: Ping-pong effect composer with scene, shader, clear and bloom passes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_render::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut renderer = Renderer::new(Box::new(RecordingBackend::new()), RendererConfig::default());
//!     let mut graph = SceneGraph::new();
//!     let root = graph.create_node();
//!
//!     let program = renderer.backend_mut().create_program("basic")?;
//!     let material = Arc::new(BasicMaterial::new(program));
//!     let mesh = Mesh::new(Geometry::default(), MeshMaterial::single(material));
//!     let node = graph.create_mesh_node(mesh);
//!     graph.add_child(root, node)?;
//!
//!     let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 16.0 / 9.0, 0.1, 100.0);
//!     renderer.render(&mut graph, root, &camera)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;

pub mod foundation;
pub mod config;
pub mod scene;
pub mod geometry;
pub mod material;
pub mod render;
pub mod postprocessing;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        foundation::math::{Vec2, Vec3, Vec4, Mat4, Quat, Transform},
        scene::{SceneGraph, SceneNode, NodeId, NodeContent, Camera, SceneError, TraversalCursor},
        geometry::{Geometry, Face, Mesh, MeshMaterial, Channel, ChannelSet},
        material::{
            Material, MaterialId, BasicMaterial, ShaderMaterial, UniformValue,
            BlendState, BlendMode, BlendEquation, BlendFactor, Side, PolygonOffset,
            NormalShading, VertexColors,
        },
        render::{
            Renderer, RenderError, RenderResult, GpuBackend, RecordingBackend, GpuCommand,
            ProgramHandle, BufferHandle, RenderTarget, FrameStats,
        },
        postprocessing::{
            EffectComposer, Pass, PassState, PassContext, ScenePass, ShaderPass, ClearPass, BloomPass,
        },
        core::config::{ApplicationConfig, RendererConfig, ComposerConfig, EngineConfig},
        config::Config,
    };
}
