//! GPU buffer groups
//!
//! A geometry is packed into one or more groups so every group can be drawn
//! with 16-bit indices. Faces are grouped by material index; a group that
//! would exceed [`MAX_GROUP_VERTICES`] overflows into a fresh group with the
//! same material index. Expansion is non-indexed: every triangle contributes
//! three fresh vertices.

use std::collections::HashMap;

use crate::foundation::math::Vec2;
use crate::material::{Material, NormalShading, VertexColors};
use crate::render::{
    BufferHandle, BufferKind, GpuBackend, RenderError, RenderResult, Topology, VertexAttribute,
};

use super::dirty::{Channel, ChannelSet, DirtyFlags};
use super::geometry::Geometry;

/// Largest vertex count addressable with 16-bit indices
pub const MAX_GROUP_VERTICES: usize = 65_535;

/// GPU buffer handles of one group, allocated once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupBuffers {
    /// Positions
    pub position: BufferHandle,
    /// Normals
    pub normal: BufferHandle,
    /// Colors
    pub color: BufferHandle,
    /// First UV set
    pub uv: BufferHandle,
    /// Second UV set
    pub uv2: BufferHandle,
    /// Triangle indices
    pub triangles: BufferHandle,
    /// Line indices (three segments per triangle)
    pub lines: BufferHandle,
}

impl GroupBuffers {
    fn allocate(backend: &mut dyn GpuBackend) -> RenderResult<Self> {
        let specs = [
            (BufferKind::Vertex, "position"),
            (BufferKind::Vertex, "normal"),
            (BufferKind::Vertex, "color"),
            (BufferKind::Vertex, "uv"),
            (BufferKind::Vertex, "uv2"),
            (BufferKind::Index, "triangles"),
            (BufferKind::Index, "lines"),
        ];

        let mut handles = Vec::with_capacity(specs.len());
        for (kind, label) in specs {
            match backend.create_buffer(kind, label) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // Give back what was already allocated so nothing leaks
                    for handle in handles {
                        backend.delete_buffer(handle);
                    }
                    return Err(err);
                }
            }
        }

        match handles[..] {
            [position, normal, color, uv, uv2, triangles, lines] => Ok(Self {
                position,
                normal,
                color,
                uv,
                uv2,
                triangles,
                lines,
            }),
            _ => Err(RenderError::ResourceCreationFailed(
                "buffer group allocation returned the wrong number of handles".to_string(),
            )),
        }
    }

    fn all(&self) -> [BufferHandle; 7] {
        [
            self.position,
            self.normal,
            self.color,
            self.uv,
            self.uv2,
            self.triangles,
            self.lines,
        ]
    }
}

/// CPU-side arrays filled before upload
#[derive(Debug, Default)]
struct StagingArrays {
    positions: Vec<f32>,
    normals: Vec<f32>,
    colors: Vec<f32>,
    uvs: Vec<f32>,
    uvs2: Vec<f32>,
    triangles: Vec<u16>,
    lines: Vec<u16>,
}

impl StagingArrays {
    fn sized_for(vertex_count: usize, material: &dyn Material) -> Self {
        let vec3s = |needed: bool| Vec::with_capacity(if needed { vertex_count * 3 } else { 0 });
        let vec2s = |needed: bool| Vec::with_capacity(if needed { vertex_count * 2 } else { 0 });

        Self {
            positions: vec3s(true),
            normals: vec3s(material.needs_normals() != NormalShading::None),
            colors: vec3s(material.needs_colors() != VertexColors::None),
            uvs: vec2s(material.needs_uv()),
            uvs2: vec2s(material.needs_uv2()),
            triangles: Vec::with_capacity(vertex_count),
            lines: Vec::with_capacity(vertex_count * 2),
        }
    }
}

/// Result of one group update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Buffers uploaded
    pub uploads: usize,
    /// Bytes uploaded
    pub bytes: usize,
}

impl std::ops::AddAssign for UploadStats {
    fn add_assign(&mut self, rhs: Self) {
        self.uploads += rhs.uploads;
        self.bytes += rhs.bytes;
    }
}

/// One 16-bit-indexable slice of a geometry, drawn with one material
#[derive(Debug)]
pub struct GeometryGroup {
    material_index: u32,
    overflow: u32,
    faces: Vec<usize>,
    dirty: DirtyFlags,
    buffers: Option<GroupBuffers>,
    staging: Option<StagingArrays>,
    uploaded_shading: NormalShading,
    uploaded_colors: VertexColors,
}

impl GeometryGroup {
    fn new(material_index: u32, overflow: u32) -> Self {
        Self {
            material_index,
            overflow,
            faces: Vec::new(),
            dirty: DirtyFlags::new(),
            buffers: None,
            staging: None,
            uploaded_shading: NormalShading::None,
            uploaded_colors: VertexColors::None,
        }
    }

    /// Material index shared by every face of the group
    pub fn material_index(&self) -> u32 {
        self.material_index
    }

    /// How many earlier groups with the same material index overflowed into this one
    pub fn overflow(&self) -> u32 {
        self.overflow
    }

    /// Indices of the geometry faces packed into this group
    pub fn faces(&self) -> &[usize] {
        &self.faces
    }

    /// Expanded vertex count (three per face)
    pub fn vertex_count(&self) -> usize {
        self.faces.len() * 3
    }

    /// Dirty state of every channel
    pub fn dirty(&self) -> &DirtyFlags {
        &self.dirty
    }

    /// Mark one channel as needing upload
    pub fn mark_dirty(&mut self, channel: Channel) {
        self.dirty.mark_dirty(channel);
    }

    /// Mark several channels as needing upload
    pub fn mark_all(&mut self, channels: ChannelSet) {
        self.dirty.mark_all(channels);
    }

    /// GPU handles, `None` before [`realize`](Self::realize)
    pub fn buffers(&self) -> Option<&GroupBuffers> {
        self.buffers.as_ref()
    }

    /// Whether GPU handles have been allocated
    pub fn is_realized(&self) -> bool {
        self.buffers.is_some()
    }

    /// Whether CPU staging arrays are currently held
    pub fn has_staging(&self) -> bool {
        self.staging.is_some()
    }

    /// Allocate GPU handles and staging arrays; idempotent
    pub fn realize(&mut self, backend: &mut dyn GpuBackend, material: &dyn Material) -> RenderResult<()> {
        if self.buffers.is_none() {
            let buffers = GroupBuffers::allocate(backend)?;
            log::debug!(
                "Realized buffer group (material {}, overflow {}, {} vertices)",
                self.material_index,
                self.overflow,
                self.vertex_count()
            );
            self.buffers = Some(buffers);
        }
        if self.staging.is_none() && self.dirty.any_dirty() {
            self.staging = Some(StagingArrays::sized_for(self.vertex_count(), material));
        }
        Ok(())
    }

    fn channel_needed(channel: Channel, geometry: &Geometry, material: &dyn Material) -> bool {
        match channel {
            Channel::Vertices | Channel::Elements => true,
            Channel::Normals => material.needs_normals() != NormalShading::None,
            Channel::Colors => material.needs_colors() != VertexColors::None,
            Channel::Uvs => material.needs_uv() && !geometry.uvs.is_empty(),
            Channel::Uv2 => material.needs_uv2() && !geometry.uvs2.is_empty(),
        }
    }

    /// Upload every dirty channel the material needs
    ///
    /// Dirty channels the material does not consume are deferred, and upload
    /// as soon as a material that needs them is bound. With `dispose` the
    /// staging arrays are dropped afterwards.
    pub fn update(
        &mut self,
        backend: &mut dyn GpuBackend,
        geometry: &Geometry,
        material: &dyn Material,
        dispose: bool,
    ) -> RenderResult<UploadStats> {
        // A different shading or color mode means the staged data is stale
        let shading = material.needs_normals();
        if shading != NormalShading::None && shading != self.uploaded_shading {
            self.dirty.mark_dirty(Channel::Normals);
        }
        let colors = material.needs_colors();
        if colors != VertexColors::None && colors != self.uploaded_colors {
            self.dirty.mark_dirty(Channel::Colors);
        }
        for channel in Channel::ALL {
            if Self::channel_needed(channel, geometry, material) {
                self.dirty.resume(channel);
            } else {
                self.dirty.defer(channel);
            }
        }

        let mut stats = UploadStats::default();
        if !self.dirty.any_dirty() {
            return Ok(stats);
        }

        let buffers = self.buffers.ok_or_else(|| {
            RenderError::RenderingFailed("buffer group updated before realize".to_string())
        })?;
        let vertex_count = self.vertex_count();
        let staging = self
            .staging
            .get_or_insert_with(|| StagingArrays::sized_for(vertex_count, material));
        let faces = &self.faces;

        for channel in Channel::ALL {
            self.dirty.upload_with(channel, || -> RenderResult<()> {
                match channel {
                    Channel::Vertices => {
                        fill_positions(&mut staging.positions, geometry, faces);
                        upload(backend, buffers.position, &staging.positions, &mut stats)
                    }
                    Channel::Normals => {
                        fill_normals(&mut staging.normals, geometry, faces, shading);
                        upload(backend, buffers.normal, &staging.normals, &mut stats)
                    }
                    Channel::Colors => {
                        fill_colors(&mut staging.colors, geometry, faces, colors);
                        upload(backend, buffers.color, &staging.colors, &mut stats)
                    }
                    Channel::Uvs => {
                        fill_uvs(&mut staging.uvs, &geometry.uvs, faces);
                        upload(backend, buffers.uv, &staging.uvs, &mut stats)
                    }
                    Channel::Uv2 => {
                        fill_uvs(&mut staging.uvs2, &geometry.uvs2, faces);
                        upload(backend, buffers.uv2, &staging.uvs2, &mut stats)
                    }
                    Channel::Elements => {
                        fill_elements(&mut staging.triangles, &mut staging.lines, faces.len());
                        upload(backend, buffers.triangles, &staging.triangles, &mut stats)?;
                        upload(backend, buffers.lines, &staging.lines, &mut stats)
                    }
                }
            })?;
        }

        if shading != NormalShading::None && !self.dirty.is_dirty(Channel::Normals) {
            self.uploaded_shading = shading;
        }
        if colors != VertexColors::None && !self.dirty.is_dirty(Channel::Colors) {
            self.uploaded_colors = colors;
        }
        if dispose {
            self.staging = None;
        }

        log::trace!(
            "Buffer group (material {}) uploaded {} buffers, {} bytes",
            self.material_index,
            stats.uploads,
            stats.bytes
        );
        Ok(stats)
    }

    /// Bind the vertex attributes the material consumes
    pub fn bind_attributes(&self, backend: &mut dyn GpuBackend, material: &dyn Material) -> RenderResult<()> {
        let buffers = self.realized_buffers()?;
        backend.bind_vertex_buffer(VertexAttribute::Position, buffers.position);
        if material.needs_normals() != NormalShading::None {
            backend.bind_vertex_buffer(VertexAttribute::Normal, buffers.normal);
        }
        if material.needs_colors() != VertexColors::None {
            backend.bind_vertex_buffer(VertexAttribute::Color, buffers.color);
        }
        if material.needs_uv() {
            backend.bind_vertex_buffer(VertexAttribute::Uv, buffers.uv);
        }
        if material.needs_uv2() {
            backend.bind_vertex_buffer(VertexAttribute::Uv2, buffers.uv2);
        }
        Ok(())
    }

    /// Bind the matching index buffer and issue the draw
    pub fn draw(&self, backend: &mut dyn GpuBackend, wireframe: bool) -> RenderResult<()> {
        let buffers = self.realized_buffers()?;
        let face_count = u32::try_from(self.faces.len())
            .map_err(|_| RenderError::RenderingFailed("buffer group face count overflow".to_string()))?;
        if wireframe {
            backend.bind_index_buffer(buffers.lines);
            backend.draw_elements(Topology::Lines, face_count * 6)
        } else {
            backend.bind_index_buffer(buffers.triangles);
            backend.draw_elements(Topology::Triangles, face_count * 3)
        }
    }

    fn realized_buffers(&self) -> RenderResult<&GroupBuffers> {
        self.buffers.as_ref().ok_or_else(|| {
            RenderError::RenderingFailed("buffer group drawn before realize".to_string())
        })
    }

    /// Free every GPU handle; later calls do nothing
    pub fn release(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(buffers) = self.buffers.take() {
            for handle in buffers.all() {
                backend.delete_buffer(handle);
            }
            log::debug!("Released buffer group (material {})", self.material_index);
        }
        self.staging = None;
        self.dirty.mark_all(ChannelSet::all());
    }
}

impl Drop for GeometryGroup {
    fn drop(&mut self) {
        if let Some(buffers) = &self.buffers {
            log::warn!(
                "Buffer group (material {}) dropped with live GPU buffers {:?}; call release() first",
                self.material_index,
                buffers.all()
            );
        }
    }
}

/// Split a geometry's faces into 16-bit-indexable groups
///
/// Groups appear in order of first use. A group is keyed by
/// `(material_index, overflow)`; appending a triangle that would push it past
/// [`MAX_GROUP_VERTICES`] starts the next overflow group for that material.
pub fn build_groups(geometry: &Geometry) -> Vec<GeometryGroup> {
    let mut groups: Vec<GeometryGroup> = Vec::new();
    let mut open: HashMap<u32, usize> = HashMap::new();

    for (face_index, face) in geometry.faces.iter().enumerate() {
        let material_index = face.material_index;
        let slot = match open.get(&material_index) {
            Some(&slot) if groups[slot].vertex_count() + 3 <= MAX_GROUP_VERTICES => slot,
            Some(&slot) => {
                let overflow = groups[slot].overflow + 1;
                groups.push(GeometryGroup::new(material_index, overflow));
                groups.len() - 1
            }
            None => {
                groups.push(GeometryGroup::new(material_index, 0));
                groups.len() - 1
            }
        };
        open.insert(material_index, slot);
        groups[slot].faces.push(face_index);
    }

    log::debug!(
        "Split {} faces into {} buffer groups",
        geometry.faces.len(),
        groups.len()
    );
    groups
}

fn upload<T: bytemuck::Pod>(
    backend: &mut dyn GpuBackend,
    buffer: BufferHandle,
    data: &[T],
    stats: &mut UploadStats,
) -> RenderResult<()> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    backend.upload_buffer(buffer, bytes)?;
    stats.uploads += 1;
    stats.bytes += bytes.len();
    Ok(())
}

fn fill_positions(out: &mut Vec<f32>, geometry: &Geometry, faces: &[usize]) {
    out.clear();
    for face in faces.iter().filter_map(|&i| geometry.faces.get(i)) {
        for index in face.indices() {
            out.extend_from_slice(geometry.vertex(index).as_slice());
        }
    }
}

fn fill_normals(out: &mut Vec<f32>, geometry: &Geometry, faces: &[usize], shading: NormalShading) {
    out.clear();
    for face in faces.iter().filter_map(|&i| geometry.faces.get(i)) {
        let normals = match (shading, face.vertex_normals) {
            (NormalShading::Smooth, Some(normals)) => normals,
            _ => [face.normal; 3],
        };
        for normal in &normals {
            out.extend_from_slice(normal.as_slice());
        }
    }
}

fn fill_colors(out: &mut Vec<f32>, geometry: &Geometry, faces: &[usize], mode: VertexColors) {
    out.clear();
    for face in faces.iter().filter_map(|&i| geometry.faces.get(i)) {
        let colors = match (mode, face.vertex_colors) {
            (VertexColors::Vertex, Some(colors)) => colors,
            _ => [face.color; 3],
        };
        for color in &colors {
            out.extend_from_slice(color.as_slice());
        }
    }
}

fn fill_uvs(out: &mut Vec<f32>, layer: &[[Vec2; 3]], faces: &[usize]) {
    out.clear();
    for &face in faces {
        match layer.get(face) {
            Some(uvs) => {
                for uv in uvs {
                    out.extend_from_slice(uv.as_slice());
                }
            }
            None => out.extend_from_slice(&[0.0; 6]),
        }
    }
}

fn fill_elements(triangles: &mut Vec<u16>, lines: &mut Vec<u16>, face_count: usize) {
    triangles.clear();
    lines.clear();
    // face_count * 3 never exceeds MAX_GROUP_VERTICES, so every index fits in u16
    for face in 0..face_count {
        let base = (face * 3) as u16;
        let (a, b, c) = (base, base + 1, base + 2);
        triangles.extend_from_slice(&[a, b, c]);
        lines.extend_from_slice(&[a, b, a, c, b, c]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::geometry::{ChannelState, Face};
    use crate::material::BasicMaterial;
    use crate::render::{ProgramHandle, RecordingBackend};

    fn strip(face_count: usize, material_index: u32) -> Geometry {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let faces = (0..face_count)
            .map(|_| Face::new(0, 1, 2).with_material_index(material_index))
            .collect();
        Geometry::new(vertices, faces)
    }

    fn release_all(groups: &mut [GeometryGroup], backend: &mut RecordingBackend) {
        for group in groups {
            group.release(backend);
        }
    }

    #[test]
    fn test_groups_follow_material_indices() {
        let mut geometry = strip(4, 0);
        geometry.faces[1].material_index = 1;
        geometry.faces[3].material_index = 1;

        let groups = build_groups(&geometry);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].faces(), &[0, 2]);
        assert_eq!(groups[1].faces(), &[1, 3]);
    }

    #[test]
    fn test_exactly_full_group_does_not_overflow() {
        let groups = build_groups(&strip(MAX_GROUP_VERTICES / 3, 0));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].vertex_count(), MAX_GROUP_VERTICES);

        let groups = build_groups(&strip(MAX_GROUP_VERTICES / 3 + 1, 0));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].overflow(), 1);
        assert_eq!(groups[1].vertex_count(), 3);
    }

    #[test]
    fn test_update_uploads_only_needed_channels() {
        let mut backend = RecordingBackend::new();
        let material = BasicMaterial::new(ProgramHandle(1));
        let geometry = strip(2, 0);
        let mut groups = build_groups(&geometry);
        let group = &mut groups[0];

        group.realize(&mut backend, &material).expect("realize");
        let stats = group.update(&mut backend, &geometry, &material, false).expect("update");

        // positions + triangle indices + line indices
        assert_eq!(stats.uploads, 3);
        assert_eq!(stats.bytes, 2 * 9 * 4 + 6 * 2 + 12 * 2);
        assert_eq!(group.dirty().state(Channel::Normals), ChannelState::Deferred);
        assert!(!group.dirty().any_dirty());

        release_all(&mut groups, &mut backend);
    }

    #[test]
    fn test_static_group_stays_clean_without_staging() {
        let mut backend = RecordingBackend::new();
        let material = BasicMaterial::new(ProgramHandle(1));
        let geometry = strip(2, 0);
        let mut groups = build_groups(&geometry);

        for _ in 0..2 {
            groups[0].realize(&mut backend, &material).expect("realize");
            groups[0].update(&mut backend, &geometry, &material, true).expect("update");
        }
        groups[0].realize(&mut backend, &material).expect("realize");
        assert!(!groups[0].has_staging());
        let stats = groups[0].update(&mut backend, &geometry, &material, true).expect("update");
        assert_eq!(stats, UploadStats::default());
        assert!(!groups[0].dirty().any_dirty());

        release_all(&mut groups, &mut backend);
    }

    #[test]
    fn test_deferred_uvs_upload_once_a_material_needs_them() {
        let mut backend = RecordingBackend::new();
        let plain = BasicMaterial::new(ProgramHandle(1));
        let mapped = BasicMaterial::new(ProgramHandle(1)).with_map();
        let mut geometry = strip(1, 0);
        geometry.uvs = vec![[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]];
        let mut groups = build_groups(&geometry);

        groups[0].realize(&mut backend, &plain).expect("realize");
        groups[0].update(&mut backend, &geometry, &plain, true).expect("plain");
        assert_eq!(groups[0].dirty().state(Channel::Uvs), ChannelState::Deferred);

        let stats = groups[0].update(&mut backend, &geometry, &mapped, true).expect("mapped");
        assert_eq!(stats.uploads, 1);
        assert_eq!(stats.bytes, 3 * 2 * 4);
        assert_eq!(groups[0].dirty().state(Channel::Uvs), ChannelState::Clean);

        release_all(&mut groups, &mut backend);
    }

    #[test]
    fn test_shading_change_reuploads_normals() {
        let mut backend = RecordingBackend::new();
        let flat = BasicMaterial::new(ProgramHandle(1)).with_shading(NormalShading::Flat);
        let smooth = BasicMaterial::new(ProgramHandle(1)).with_shading(NormalShading::Smooth);
        let geometry = strip(1, 0);
        let mut groups = build_groups(&geometry);

        groups[0].realize(&mut backend, &flat).expect("realize");
        groups[0].update(&mut backend, &geometry, &flat, false).expect("flat");
        let again = groups[0].update(&mut backend, &geometry, &flat, false).expect("flat again");
        assert_eq!(again.uploads, 0);

        let switched = groups[0].update(&mut backend, &geometry, &smooth, false).expect("smooth");
        assert_eq!(switched.uploads, 1);

        release_all(&mut groups, &mut backend);
    }

    #[test]
    fn test_dispose_drops_staging_and_regenerates() {
        let mut backend = RecordingBackend::new();
        let material = BasicMaterial::new(ProgramHandle(1));
        let geometry = strip(1, 0);
        let mut groups = build_groups(&geometry);

        groups[0].realize(&mut backend, &material).expect("realize");
        groups[0].update(&mut backend, &geometry, &material, true).expect("update");
        assert!(!groups[0].has_staging());

        groups[0].mark_dirty(Channel::Vertices);
        let stats = groups[0].update(&mut backend, &geometry, &material, true).expect("update");
        assert_eq!(stats.uploads, 1);

        release_all(&mut groups, &mut backend);
    }

    #[test]
    fn test_element_indices_cover_lines() {
        let mut triangles = Vec::new();
        let mut lines = Vec::new();
        fill_elements(&mut triangles, &mut lines, 2);

        assert_eq!(triangles, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(&lines[..6], &[0, 1, 0, 2, 1, 2]);
        assert_eq!(lines.len(), 12);
    }

    #[test]
    fn test_release_frees_handles_once() {
        let mut backend = RecordingBackend::new();
        let material = BasicMaterial::new(ProgramHandle(1));
        let mut groups = build_groups(&strip(1, 0));

        groups[0].realize(&mut backend, &material).expect("realize");
        groups[0].realize(&mut backend, &material).expect("realize is idempotent");
        assert_eq!(backend.live_buffers(), 7);

        groups[0].release(&mut backend);
        groups[0].release(&mut backend);
        assert_eq!(backend.live_buffers(), 0);
        assert!(!groups[0].is_realized());
    }

    #[test]
    fn test_failed_realize_leaks_nothing() {
        let mut backend = RecordingBackend::new().with_allocation_limit(3);
        let material = BasicMaterial::new(ProgramHandle(1));
        let mut groups = build_groups(&strip(1, 0));

        let result = groups[0].realize(&mut backend, &material);
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
        assert_eq!(backend.live_buffers(), 0);
    }
}
