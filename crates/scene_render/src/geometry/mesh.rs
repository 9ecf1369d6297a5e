//! Mesh: geometry bound to materials, plus the GPU buffer groups it owns

use std::sync::Arc;

use crate::material::Material;
use crate::render::{GpuBackend, RenderResult};
use crate::scene::BoundingSphere;

use super::buffer_group::{build_groups, GeometryGroup, UploadStats};
use super::dirty::ChannelSet;
use super::geometry::Geometry;

/// Material binding of a mesh
#[derive(Debug, Clone, Default)]
pub enum MeshMaterial {
    /// No material; every group is skipped at render time
    #[default]
    None,
    /// One material for every face
    Single(Arc<dyn Material>),
    /// Looked up by face material index; missing entries are skipped
    PerFace(Vec<Option<Arc<dyn Material>>>),
}

impl MeshMaterial {
    /// One material for every face
    pub fn single(material: Arc<dyn Material>) -> Self {
        Self::Single(material)
    }

    /// Per-face material list
    pub fn per_face(materials: Vec<Option<Arc<dyn Material>>>) -> Self {
        Self::PerFace(materials)
    }

    /// Material for a face material index
    pub fn resolve(&self, material_index: u32) -> Option<&Arc<dyn Material>> {
        match self {
            Self::None => None,
            Self::Single(material) => Some(material),
            Self::PerFace(materials) => materials.get(material_index as usize)?.as_ref(),
        }
    }
}

/// Drawable content of a scene node
///
/// The mesh exclusively owns its buffer groups; their GPU handles are freed
/// through [`Mesh::release`] (or by the renderer when the node is destroyed).
#[derive(Debug)]
pub struct Mesh {
    geometry: Geometry,
    material: MeshMaterial,
    groups: Vec<GeometryGroup>,
    retired: Vec<GeometryGroup>,
}

impl Mesh {
    /// Create a mesh and split its geometry into buffer groups
    pub fn new(geometry: Geometry, material: MeshMaterial) -> Self {
        let groups = build_groups(&geometry);
        Self {
            geometry,
            material,
            groups,
            retired: Vec::new(),
        }
    }

    /// Source geometry
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Material binding
    pub fn material(&self) -> &MeshMaterial {
        &self.material
    }

    /// Replace the material binding
    ///
    /// Channels a new material needs are uploaded lazily on the next frame.
    pub fn set_material(&mut self, material: MeshMaterial) {
        self.material = material;
    }

    /// Buffer groups in draw order
    pub fn groups(&self) -> &[GeometryGroup] {
        &self.groups
    }

    /// One buffer group
    pub fn group(&self, index: usize) -> Option<&GeometryGroup> {
        self.groups.get(index)
    }

    /// Edit geometry data in place and mark the listed channels dirty on every group
    ///
    /// The face list must keep its length and material indices; use
    /// [`set_geometry`](Self::set_geometry) for topology changes.
    pub fn update_geometry(&mut self, channels: ChannelSet, edit: impl FnOnce(&mut Geometry)) {
        edit(&mut self.geometry);
        if channels.contains(ChannelSet::VERTICES) {
            self.geometry.invalidate_bounds();
        }
        self.mark_dirty(channels);
    }

    /// Mark channels dirty on every group
    pub fn mark_dirty(&mut self, channels: ChannelSet) {
        for group in &mut self.groups {
            group.mark_all(channels);
        }
    }

    /// Replace the geometry and regroup; old GPU handles are freed on the next sync
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.retired.append(&mut self.groups);
        self.groups = build_groups(&geometry);
        self.geometry = geometry;
    }

    /// Object-space bounding sphere, computed on first use
    pub fn bounding_sphere(&mut self) -> Option<BoundingSphere> {
        self.geometry.bounding_sphere()
    }

    /// Realize and upload one group for drawing with `material`
    pub fn sync_group(
        &mut self,
        index: usize,
        backend: &mut dyn GpuBackend,
        material: &dyn Material,
        dispose: bool,
    ) -> RenderResult<UploadStats> {
        self.release_retired(backend);
        let Some(group) = self.groups.get_mut(index) else {
            return Ok(UploadStats::default());
        };
        group.realize(backend, material)?;
        group.update(backend, &self.geometry, material, dispose)
    }

    fn release_retired(&mut self, backend: &mut dyn GpuBackend) {
        for mut group in self.retired.drain(..) {
            group.release(backend);
        }
    }

    /// Free every GPU handle owned by this mesh
    pub fn release(&mut self, backend: &mut dyn GpuBackend) {
        self.release_retired(backend);
        for group in &mut self.groups {
            group.release(backend);
        }
    }
}
