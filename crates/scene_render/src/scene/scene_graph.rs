//! Scene graph arena
//!
//! Nodes live in a slotmap arena and refer to each other by [`NodeId`]. A
//! parent exclusively owns its subtree; the child's parent link is a plain
//! handle. Every structural change bumps a graph-wide generation counter so
//! non-borrowing traversals can detect that the tree changed under them.

use thiserror::Error;

use crate::foundation::collections::{HandleMap, NodeId};
use crate::geometry::Mesh;

use super::node::{NodeContent, SceneNode};
use super::transform_propagator;

/// Scene graph contract violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Handle is stale or was never issued by this graph
    #[error("Node {0:?} does not exist")]
    NodeNotFound(NodeId),

    /// Reparenting requires an explicit detach first
    #[error("Node {child:?} already has parent {parent:?}")]
    AlreadyHasParent {
        /// Node being attached
        child: NodeId,
        /// Its current parent
        parent: NodeId,
    },

    /// The child is the parent itself or one of its ancestors
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },

    /// `remove_child` was given a node that is not a child of `parent`
    #[error("Node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },

    /// Only detached nodes can be destroyed
    #[error("Node {0:?} is still attached to a parent")]
    StillAttached(NodeId),

    /// The graph changed structurally while a cursor was walking it
    #[error("Scene graph changed during traversal (generation {expected} -> {found})")]
    TraversalInvalidated {
        /// Generation captured by the cursor
        expected: u64,
        /// Current graph generation
        found: u64,
    },
}

/// Result type for scene graph operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Arena of scene nodes
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: HandleMap<NodeId, SceneNode>,
    generation: u64,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached empty node
    pub fn create_node(&mut self) -> NodeId {
        self.insert(SceneNode::new(NodeContent::Empty))
    }

    /// Insert a detached empty node with a debug name
    pub fn create_named_node(&mut self, name: impl Into<String>) -> NodeId {
        let mut node = SceneNode::new(NodeContent::Empty);
        node.name = Some(name.into());
        self.insert(node)
    }

    /// Insert a detached mesh node
    pub fn create_mesh_node(&mut self, mesh: Mesh) -> NodeId {
        self.insert(SceneNode::new(NodeContent::Mesh(mesh)))
    }

    /// Insert a prepared detached node
    pub fn insert(&mut self, mut node: SceneNode) -> NodeId {
        node.parent = None;
        node.children.clear();
        self.generation += 1;
        self.nodes.insert(node)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a handle refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Mutably borrow a node
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Borrow a node or fail with [`SceneError::NodeNotFound`]
    pub fn node(&self, id: NodeId) -> SceneResult<&SceneNode> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Mutably borrow a node or fail with [`SceneError::NodeNotFound`]
    pub fn node_mut(&mut self, id: NodeId) -> SceneResult<&mut SceneNode> {
        self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Graph-wide structural generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Attach a detached node as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        self.node(parent)?;
        if let Some(current) = self.node(child)?.parent {
            return Err(SceneError::AlreadyHasParent { child, parent: current });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::WouldCreateCycle { parent, child });
        }

        let parent_node = self.node_mut(parent)?;
        parent_node.children.push(child);
        parent_node.generation += 1;

        let child_node = self.node_mut(child)?;
        child_node.parent = Some(parent);
        child_node.mark_world_dirty();

        self.generation += 1;
        log::trace!("Attached {:?} under {:?}", child, parent);
        Ok(())
    }

    /// Detach `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        self.node(child)?;
        let parent_node = self.node_mut(parent)?;
        let position = parent_node
            .children
            .iter()
            .position(|&id| id == child)
            .ok_or(SceneError::NotAChild { parent, child })?;
        parent_node.children.remove(position);
        parent_node.generation += 1;

        let child_node = self.node_mut(child)?;
        child_node.parent = None;
        child_node.mark_world_dirty();

        self.generation += 1;
        log::trace!("Detached {:?} from {:?}", child, parent);
        Ok(())
    }

    /// Detach a node from whatever parent it has; no-op for roots
    pub fn detach(&mut self, node: NodeId) -> SceneResult<()> {
        match self.node(node)?.parent {
            Some(parent) => self.remove_child(parent, node),
            None => Ok(()),
        }
    }

    /// Remove a detached node and its whole subtree
    ///
    /// Returns the meshes that lived in the subtree so their GPU buffers can be
    /// released exactly once.
    pub fn destroy(&mut self, node: NodeId) -> SceneResult<Vec<Mesh>> {
        if self.node(node)?.parent.is_some() {
            return Err(SceneError::StillAttached(node));
        }

        let subtree: Vec<NodeId> = self.descendants(node).collect();
        let mut meshes = Vec::new();
        for id in &subtree {
            if let Some(removed) = self.nodes.remove(*id) {
                if let NodeContent::Mesh(mesh) = removed.content {
                    meshes.push(mesh);
                }
            }
        }

        self.generation += 1;
        log::debug!("Destroyed {} nodes ({} meshes)", subtree.len(), meshes.len());
        Ok(meshes)
    }

    /// Child handles of a node
    pub fn children(&self, node: NodeId) -> SceneResult<&[NodeId]> {
        Ok(self.node(node)?.children())
    }

    /// Depth-first pre-order walk of `root` and everything below it
    ///
    /// Borrows the graph, so the tree cannot change while it runs.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let stack = if self.contains(root) { vec![root] } else { Vec::new() };
        Descendants { graph: self, stack }
    }

    /// Non-borrowing depth-first cursor starting at `root`
    pub fn cursor(&self, root: NodeId) -> TraversalCursor {
        TraversalCursor {
            stack: if self.contains(root) { vec![root] } else { Vec::new() },
            generation: self.generation,
        }
    }

    /// Every node without a parent
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
    }

    /// Bring world matrices under `root` up to date; returns how many were recomputed
    pub fn update_world_matrices(&mut self, root: NodeId, force: bool) -> SceneResult<usize> {
        transform_propagator::update_world_matrices(self, root, force)
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }
}

/// Borrowing depth-first iterator
#[derive(Debug)]
pub struct Descendants<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some(node) = self.graph.get(id) {
            self.stack.extend(node.children.iter().rev());
        }
        Some(id)
    }
}

/// Depth-first cursor that does not borrow the graph between steps
///
/// Captures the graph generation on creation; a step after any structural
/// change fails with [`SceneError::TraversalInvalidated`].
#[derive(Debug, Clone)]
pub struct TraversalCursor {
    stack: Vec<NodeId>,
    generation: u64,
}

impl TraversalCursor {
    /// Advance to the next node in pre-order
    pub fn next(&mut self, graph: &SceneGraph) -> SceneResult<Option<NodeId>> {
        if graph.generation() != self.generation {
            return Err(SceneError::TraversalInvalidated {
                expected: self.generation,
                found: graph.generation(),
            });
        }
        let Some(id) = self.stack.pop() else {
            return Ok(None);
        };
        let node = graph.node(id)?;
        self.stack.extend(node.children.iter().rev());
        Ok(Some(id))
    }
}
