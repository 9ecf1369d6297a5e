//! Scene management system
//!
//! Retained-mode description of what to draw: a tree of positioned nodes,
//! some carrying meshes, viewed through a [`Camera`].
//!
//! ## Architecture
//!
//! ```text
//! SceneGraph (arena of SceneNode, NodeId handles)
//!      ↓ update_world_matrices
//! World matrices
//!      ↓ RenderList::project
//! Renderer
//! ```
//!
//! The graph:
//! - Owns every node; a parent owns its subtree, the parent link is a handle
//! - Rejects reparenting without a detach and any attachment that forms a cycle
//! - Detects structural mutation during non-borrowing traversal

mod bounds;
mod camera;
mod node;
mod scene_graph;
mod transform_propagator;

pub use bounds::{BoundingSphere, Frustum, Plane, AABB};
pub use camera::{Camera, Projection};
pub use node::{NodeContent, SceneNode};
pub use scene_graph::{Descendants, SceneError, SceneGraph, SceneResult, TraversalCursor};
pub use transform_propagator::update_world_matrices;

pub use crate::foundation::collections::NodeId;
