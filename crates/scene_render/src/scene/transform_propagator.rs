//! World matrix propagation
//!
//! Walks a subtree top-down. A node whose local matrix changed (or that was
//! reached with `force` set) recomputes `world = parent.world * local` and
//! forces every descendant to do the same; untouched branches are visited
//! without recomputing anything. Invisible nodes are updated like any other.

use crate::foundation::collections::NodeId;
use crate::foundation::math::Mat4;

use super::scene_graph::{SceneGraph, SceneResult};

/// Update world matrices under `root`, returning the number recomputed
///
/// The root uses its current parent's world matrix when it has one, so
/// updating a subtree of a larger tree stays consistent.
pub fn update_world_matrices(graph: &mut SceneGraph, root: NodeId, force: bool) -> SceneResult<usize> {
    let parent_world = match graph.node(root)?.parent() {
        Some(parent) => Some(*graph.node(parent)?.world_matrix()),
        None => None,
    };

    let mut recomputed = 0;
    let mut stack: Vec<(NodeId, bool, Option<Mat4>)> = vec![(root, force, parent_world)];

    while let Some((id, force, parent_world)) = stack.pop() {
        let node = graph.node_mut(id)?;
        let stale = node.refresh_local() || force;
        if stale {
            node.set_world(parent_world.as_ref());
            recomputed += 1;
        }

        let world = *node.world_matrix();
        stack.extend(node.children().iter().rev().map(|&child| (child, stale, Some(world))));
    }

    log::trace!("Recomputed {} world matrices", recomputed);
    Ok(recomputed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4Ext, Quat, Vec3};
    use approx::assert_relative_eq;

    fn three_level(graph: &mut SceneGraph) -> (NodeId, NodeId, NodeId) {
        let root = graph.create_node();
        let arm = graph.create_node();
        let hand = graph.create_node();
        graph.add_child(root, arm).expect("root -> arm");
        graph.add_child(arm, hand).expect("arm -> hand");

        graph.node_mut(arm).expect("arm").set_position(Vec3::new(1.0, 0.0, 0.0));
        graph.node_mut(hand).expect("hand").set_position(Vec3::new(0.0, 2.0, 0.0));
        (root, arm, hand)
    }

    fn assert_world_invariant(graph: &SceneGraph, root: NodeId) {
        for id in graph.descendants(root) {
            let node = graph.node(id).expect("node");
            let expected = match node.parent() {
                Some(parent) => graph.node(parent).expect("parent").world_matrix() * node.local_matrix(),
                None => *node.local_matrix(),
            };
            assert_relative_eq!(*node.world_matrix(), expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_world_is_parent_world_times_local() {
        let mut graph = SceneGraph::new();
        let (root, _, hand) = three_level(&mut graph);
        graph.node_mut(root).expect("root").set_rotation(Quat::from_axis_angle(&Vec3::z_axis(), 0.5));

        graph.update_world_matrices(root, false).expect("update");
        assert_world_invariant(&graph, root);
        assert!(graph.node(hand).expect("hand").world_position().norm() > 0.0);
    }

    #[test]
    fn test_ancestor_change_propagates_to_unchanged_descendants() {
        let mut graph = SceneGraph::new();
        let (root, arm, hand) = three_level(&mut graph);
        graph.update_world_matrices(root, false).expect("update");

        graph.node_mut(arm).expect("arm").set_position(Vec3::new(10.0, 0.0, 0.0));
        let recomputed = graph.update_world_matrices(root, false).expect("update");

        assert_eq!(recomputed, 2);
        assert_relative_eq!(
            graph.node(hand).expect("hand").world_position(),
            Vec3::new(10.0, 2.0, 0.0),
            epsilon = 1e-5
        );
        assert_world_invariant(&graph, root);
    }

    #[test]
    fn test_unchanged_tree_recomputes_nothing() {
        let mut graph = SceneGraph::new();
        let (root, _, _) = three_level(&mut graph);

        assert_eq!(graph.update_world_matrices(root, false).expect("first"), 3);
        assert_eq!(graph.update_world_matrices(root, false).expect("second"), 0);
        assert_eq!(graph.update_world_matrices(root, true).expect("forced"), 3);
    }

    #[test]
    fn test_invisible_nodes_are_still_updated() {
        let mut graph = SceneGraph::new();
        let (root, arm, hand) = three_level(&mut graph);
        graph.node_mut(arm).expect("arm").visible = false;

        graph.update_world_matrices(root, false).expect("update");
        assert_relative_eq!(
            graph.node(hand).expect("hand").world_position(),
            Vec3::new(1.0, 2.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_external_local_matrix_is_respected() {
        let mut graph = SceneGraph::new();
        let (root, arm, hand) = three_level(&mut graph);
        let scale = Mat4::new_scaling(3.0);
        graph.node_mut(arm).expect("arm").set_local_matrix(scale);

        graph.update_world_matrices(root, false).expect("update");
        assert_relative_eq!(
            graph.node(hand).expect("hand").world_position(),
            Vec3::new(0.0, 6.0, 0.0),
            epsilon = 1e-5
        );
        assert_relative_eq!(graph.node(arm).expect("arm").world_matrix().max_scale_on_axis(), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_reattached_subtree_picks_up_new_parent() {
        let mut graph = SceneGraph::new();
        let (root, arm, hand) = three_level(&mut graph);
        graph.update_world_matrices(root, false).expect("update");

        let other = graph.create_node();
        graph.node_mut(other).expect("other").set_position(Vec3::new(0.0, 0.0, -4.0));
        graph.add_child(root, other).expect("root -> other");
        graph.remove_child(arm, hand).expect("detach");
        graph.add_child(other, hand).expect("other -> hand");

        graph.update_world_matrices(root, false).expect("update");
        assert_relative_eq!(
            graph.node(hand).expect("hand").world_position(),
            Vec3::new(0.0, 2.0, -4.0),
            epsilon = 1e-5
        );
    }
}
