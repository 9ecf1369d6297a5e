//! Scene node
//!
//! A node owns its local transform and content. Structural links (parent and
//! children) are handles into the owning [`SceneGraph`](super::SceneGraph) and
//! are only changed through the graph.

use crate::foundation::collections::NodeId;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::geometry::Mesh;

/// Closed set of node payloads
#[derive(Debug, Default)]
pub enum NodeContent {
    /// Grouping node with no drawable
    #[default]
    Empty,
    /// Drawable mesh
    Mesh(Mesh),
}

/// Positioned element of the scene tree
#[derive(Debug)]
pub struct SceneNode {
    /// Optional name for debugging
    pub name: Option<String>,
    /// Skipped by the render list together with its whole subtree when false
    pub visible: bool,
    /// Tested against the camera frustum when true
    pub frustum_culled: bool,
    /// Drawable payload
    pub content: NodeContent,

    transform: Transform,
    auto_update: bool,
    local_matrix: Mat4,
    world_matrix: Mat4,
    local_needs_update: bool,
    world_needs_update: bool,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) generation: u64,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new(NodeContent::Empty)
    }
}

impl SceneNode {
    /// Detached node at the origin
    pub fn new(content: NodeContent) -> Self {
        Self {
            name: None,
            visible: true,
            frustum_culled: true,
            content,
            transform: Transform::identity(),
            auto_update: true,
            local_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
            local_needs_update: false,
            world_needs_update: true,
            parent: None,
            children: Vec::new(),
            generation: 0,
        }
    }

    /// Local position / rotation / scale
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Replace the whole local TRS
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.local_needs_update = true;
    }

    /// Set the local position
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
        self.local_needs_update = true;
    }

    /// Set the local orientation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
        self.local_needs_update = true;
    }

    /// Set the local scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
        self.local_needs_update = true;
    }

    /// Supply the local matrix directly
    ///
    /// Turns `auto_update` off so the TRS never overwrites it; turn it back on
    /// with [`set_auto_update`](Self::set_auto_update).
    pub fn set_local_matrix(&mut self, matrix: Mat4) {
        self.local_matrix = matrix;
        self.auto_update = false;
        self.world_needs_update = true;
    }

    /// Whether the local matrix is recomputed from the TRS
    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    /// Toggle local matrix recomputation from the TRS
    pub fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
        if auto_update {
            self.local_needs_update = true;
        }
    }

    /// Local matrix as of the last propagation
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local_matrix
    }

    /// World matrix as of the last propagation
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// World-space position as of the last propagation
    pub fn world_position(&self) -> Vec3 {
        Vec3::new(self.world_matrix.m14, self.world_matrix.m24, self.world_matrix.m34)
    }

    /// Parent handle, `None` for roots and detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child handles in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Bumped on every change to this node's child list
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mesh payload, if any
    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.content {
            NodeContent::Mesh(mesh) => Some(mesh),
            NodeContent::Empty => None,
        }
    }

    /// Mutable mesh payload, if any
    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.content {
            NodeContent::Mesh(mesh) => Some(mesh),
            NodeContent::Empty => None,
        }
    }

    pub(crate) fn mark_world_dirty(&mut self) {
        self.world_needs_update = true;
    }

    /// Recompute the local matrix if the TRS changed; returns whether the world matrix is stale
    pub(crate) fn refresh_local(&mut self) -> bool {
        if self.auto_update && self.local_needs_update {
            self.local_matrix = self.transform.to_matrix();
            self.world_needs_update = true;
        }
        self.local_needs_update = false;
        self.world_needs_update
    }

    pub(crate) fn set_world(&mut self, parent_world: Option<&Mat4>) {
        self.world_matrix = match parent_world {
            Some(parent) => parent * self.local_matrix,
            None => self.local_matrix,
        };
        self.world_needs_update = false;
    }
}
