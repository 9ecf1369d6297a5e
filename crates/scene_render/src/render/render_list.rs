//! Render list for a single frame
//!
//! Collects the buffer groups of every visible mesh under a root, culls them
//! against the camera frustum and sorts them into two buckets:
//! opaque front-to-back (early-z) and transparent back-to-front (painter's
//! algorithm). Both sorts are stable, so items at equal depth keep the order
//! in which the scene walk produced them.

use std::sync::Arc;

use crate::foundation::collections::NodeId;
use crate::foundation::math::Mat4Ext;
use crate::material::Material;
use crate::scene::{Camera, SceneGraph, SceneResult};

/// One buffer group scheduled for drawing
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// Node holding the mesh
    pub node: NodeId,
    /// Index of the buffer group within the mesh
    pub group: usize,
    /// Resolved material
    pub material: Arc<dyn Material>,
    /// Normalized device depth of the node origin
    pub depth: f32,
}

/// Per-frame opaque and transparent buckets
#[derive(Debug, Default)]
pub struct RenderList {
    opaque: Vec<RenderItem>,
    transparent: Vec<RenderItem>,
    culled: usize,
    skipped: usize,
}

impl RenderList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every item and counter, keeping allocations
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
        self.culled = 0;
        self.skipped = 0;
    }

    /// Opaque bucket
    pub fn opaque(&self) -> &[RenderItem] {
        &self.opaque
    }

    /// Transparent bucket
    pub fn transparent(&self) -> &[RenderItem] {
        &self.transparent
    }

    /// Items in draw order: every opaque item, then every transparent one
    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
        self.opaque.iter().chain(self.transparent.iter())
    }

    /// Total number of items
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    /// Whether both buckets are empty
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    /// Mesh nodes rejected by the frustum test
    pub fn culled(&self) -> usize {
        self.culled
    }

    /// Buffer groups skipped for lack of a material
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Append an item to the bucket its material selects
    pub fn push(&mut self, item: RenderItem) {
        if item.material.is_transparent() {
            self.transparent.push(item);
        } else {
            self.opaque.push(item);
        }
    }

    /// Rebuild the list from the subtree under `root`
    ///
    /// World matrices must be current. Invisible nodes hide their whole
    /// subtree. Groups without a resolvable material are skipped and logged
    /// once per node.
    pub fn project(&mut self, graph: &mut SceneGraph, root: NodeId, camera: &Camera) -> SceneResult<()> {
        self.clear();

        let view_projection = camera.view_projection_matrix();
        let frustum = camera.frustum();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let node = graph.node_mut(id)?;
            if !node.visible {
                continue;
            }
            stack.extend(node.children().iter().rev());

            let world = *node.world_matrix();
            let frustum_culled = node.frustum_culled;
            let Some(mesh) = node.mesh_mut() else {
                continue;
            };

            if frustum_culled {
                if let Some(sphere) = mesh.bounding_sphere() {
                    let world_sphere = sphere.transformed(&world, world.max_scale_on_axis());
                    if !frustum.intersects_sphere(&world_sphere) {
                        self.culled += 1;
                        continue;
                    }
                }
            }

            let depth = view_projection.project_point(&world.translation_part()).z;
            let mut warned = false;
            for (index, group) in mesh.groups().iter().enumerate() {
                match mesh.material().resolve(group.material_index()) {
                    Some(material) => self.push(RenderItem {
                        node: id,
                        group: index,
                        material: Arc::clone(material),
                        depth,
                    }),
                    None => {
                        self.skipped += 1;
                        if !warned {
                            log::warn!(
                                "Skipping node {:?}: no material for material index {}",
                                id,
                                group.material_index()
                            );
                            warned = true;
                        }
                    }
                }
            }
        }

        log::trace!(
            "Render list: {} opaque, {} transparent, {} culled, {} skipped",
            self.opaque.len(),
            self.transparent.len(),
            self.culled,
            self.skipped
        );
        Ok(())
    }

    /// Sort opaque items front-to-back and transparent items back-to-front
    ///
    /// `sort_by` is a stable merge sort; `total_cmp` keeps NaN depths from
    /// breaking the ordering.
    pub fn sort(&mut self) {
        self.opaque.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        self.transparent.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::geometry::{Face, Geometry, Mesh, MeshMaterial};
    use crate::material::BasicMaterial;
    use crate::render::ProgramHandle;

    fn item(node: NodeId, material: &Arc<dyn Material>, depth: f32) -> RenderItem {
        RenderItem {
            node,
            group: 0,
            material: Arc::clone(material),
            depth,
        }
    }

    fn triangle_mesh(material: MeshMaterial) -> Mesh {
        let geometry = Geometry::new(
            vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.0, 0.5, 0.0),
            ],
            vec![Face::new(0, 1, 2)],
        );
        Mesh::new(geometry, material)
    }

    #[test]
    fn test_sort_directions() {
        let mut graph = SceneGraph::new();
        let near = graph.create_node();
        let far = graph.create_node();
        let opaque: Arc<dyn Material> = Arc::new(BasicMaterial::new(ProgramHandle(1)));
        let glass: Arc<dyn Material> = Arc::new(BasicMaterial::new(ProgramHandle(1)).with_opacity(0.5));

        let mut list = RenderList::new();
        list.push(item(far, &opaque, 0.8));
        list.push(item(near, &opaque, 0.2));
        list.push(item(near, &glass, 0.2));
        list.push(item(far, &glass, 0.8));
        list.sort();

        let opaque_depths: Vec<f32> = list.opaque().iter().map(|i| i.depth).collect();
        let transparent_depths: Vec<f32> = list.transparent().iter().map(|i| i.depth).collect();
        assert_eq!(opaque_depths, vec![0.2, 0.8]);
        assert_eq!(transparent_depths, vec![0.8, 0.2]);
    }

    #[test]
    fn test_project_skips_invisible_subtrees_and_missing_materials() {
        let mut graph = SceneGraph::new();
        let material: Arc<dyn Material> = Arc::new(BasicMaterial::new(ProgramHandle(1)));
        let root = graph.create_node();
        let hidden = graph.create_node();
        let under_hidden = graph.create_mesh_node(triangle_mesh(MeshMaterial::single(material.clone())));
        let bare = graph.create_mesh_node(triangle_mesh(MeshMaterial::None));
        let shown = graph.create_mesh_node(triangle_mesh(MeshMaterial::single(material)));
        graph.add_child(root, hidden).expect("attach");
        graph.add_child(hidden, under_hidden).expect("attach");
        graph.add_child(root, bare).expect("attach");
        graph.add_child(root, shown).expect("attach");
        graph.node_mut(hidden).expect("hidden").visible = false;
        graph.update_world_matrices(root, false).expect("update");

        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        let mut list = RenderList::new();
        list.project(&mut graph, root, &camera).expect("project");

        assert_eq!(list.len(), 1);
        assert_eq!(list.opaque()[0].node, shown);
        assert_eq!(list.skipped(), 1);
    }

    #[test]
    fn test_project_culls_outside_frustum_unless_disabled() {
        let mut graph = SceneGraph::new();
        let material: Arc<dyn Material> = Arc::new(BasicMaterial::new(ProgramHandle(1)));
        let root = graph.create_node();
        let behind = graph.create_mesh_node(triangle_mesh(MeshMaterial::single(material)));
        graph.add_child(root, behind).expect("attach");
        graph.node_mut(behind).expect("behind").set_position(Vec3::new(0.0, 0.0, 20.0));
        graph.update_world_matrices(root, false).expect("update");

        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        let mut list = RenderList::new();
        list.project(&mut graph, root, &camera).expect("project");
        assert!(list.is_empty());
        assert_eq!(list.culled(), 1);

        graph.node_mut(behind).expect("behind").frustum_culled = false;
        list.project(&mut graph, root, &camera).expect("project");
        assert_eq!(list.len(), 1);
    }
}
