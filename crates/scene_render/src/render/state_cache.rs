//! GPU state cache
//!
//! Remembers the last state the renderer applied so redundant transitions
//! are never sent to the backend. `None` means "unknown" and always forces
//! the next set. The cache is owned by the renderer and threaded through the
//! draw loop; nothing here is global.

use crate::material::{BlendEquation, BlendFactor, Material, MaterialId, PolygonOffset, Side};

use super::backend::{BufferHandle, FrontFace, GpuBackend, ProgramHandle};

/// Last-applied GPU state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateCache {
    depth_test: Option<bool>,
    depth_write: Option<bool>,
    face_culling: Option<bool>,
    front_face: Option<FrontFace>,
    blend_enabled: Option<bool>,
    blend_equation: Option<BlendEquation>,
    blend_func: Option<(BlendFactor, BlendFactor)>,
    polygon_offset_enabled: Option<bool>,
    polygon_offset: Option<(f32, f32)>,
    line_width: Option<f32>,
    program: Option<ProgramHandle>,
    material: Option<(MaterialId, u64)>,
    geometry: Option<BufferHandle>,
}

/// Store `value` in `slot`; true when it differed
fn transition<T: PartialEq + Copy>(slot: &mut Option<T>, value: T) -> bool {
    if *slot == Some(value) {
        return false;
    }
    *slot = Some(value);
    true
}

impl StateCache {
    /// Cache with every field unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; the next set of every field is emitted
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Currently bound program
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    /// Apply a material's fixed-function state, returning the number of transitions emitted
    pub fn apply_material(&mut self, backend: &mut dyn GpuBackend, material: &dyn Material) -> usize {
        let mut changes = 0;

        match material.blending().resolve() {
            None => {
                if transition(&mut self.blend_enabled, false) {
                    backend.set_blend_enabled(false);
                    changes += 1;
                }
            }
            Some(blend) => {
                if transition(&mut self.blend_enabled, true) {
                    backend.set_blend_enabled(true);
                    changes += 1;
                }
                if transition(&mut self.blend_equation, blend.equation) {
                    backend.set_blend_equation(blend.equation);
                    changes += 1;
                }
                if transition(&mut self.blend_func, (blend.src, blend.dst)) {
                    backend.set_blend_func(blend.src, blend.dst);
                    changes += 1;
                }
            }
        }

        changes += self.set_depth_test(backend, material.depth_test());
        changes += self.set_depth_write(backend, material.depth_write());
        changes += self.set_polygon_offset(backend, material.polygon_offset());
        changes += self.set_side(backend, material.side());

        if material.is_wireframe() && transition(&mut self.line_width, material.wireframe_line_width()) {
            backend.set_line_width(material.wireframe_line_width());
            changes += 1;
        }

        changes
    }

    /// Enable or disable depth testing
    pub fn set_depth_test(&mut self, backend: &mut dyn GpuBackend, enabled: bool) -> usize {
        if transition(&mut self.depth_test, enabled) {
            backend.set_depth_test(enabled);
            return 1;
        }
        0
    }

    /// Enable or disable depth writes
    pub fn set_depth_write(&mut self, backend: &mut dyn GpuBackend, enabled: bool) -> usize {
        if transition(&mut self.depth_write, enabled) {
            backend.set_depth_write(enabled);
            return 1;
        }
        0
    }

    fn set_polygon_offset(&mut self, backend: &mut dyn GpuBackend, offset: Option<PolygonOffset>) -> usize {
        let mut changes = 0;
        if transition(&mut self.polygon_offset_enabled, offset.is_some()) {
            backend.set_polygon_offset_enabled(offset.is_some());
            changes += 1;
        }
        if let Some(offset) = offset {
            if transition(&mut self.polygon_offset, (offset.factor, offset.units)) {
                backend.set_polygon_offset(offset.factor, offset.units);
                changes += 1;
            }
        }
        changes
    }

    fn set_side(&mut self, backend: &mut dyn GpuBackend, side: Side) -> usize {
        let mut changes = 0;
        let culling = side != Side::Double;
        if transition(&mut self.face_culling, culling) {
            backend.set_face_culling(culling);
            changes += 1;
        }
        let winding = match side {
            Side::Front => Some(FrontFace::CounterClockwise),
            Side::Back => Some(FrontFace::Clockwise),
            Side::Double => None,
        };
        if let Some(winding) = winding {
            if transition(&mut self.front_face, winding) {
                backend.set_front_face(winding);
                changes += 1;
            }
        }
        changes
    }

    /// Make `program` current; true when it was not already bound
    ///
    /// A rebind invalidates the bound material, since uniforms are per program.
    pub fn bind_program(&mut self, backend: &mut dyn GpuBackend, program: ProgramHandle) -> bool {
        if !transition(&mut self.program, program) {
            return false;
        }
        backend.use_program(program);
        self.material = None;
        true
    }

    /// Forget the bound program so the next bind is emitted
    pub fn reset_program(&mut self) {
        self.program = None;
        self.material = None;
    }

    /// Record the material whose uniforms are about to be sent; true when they must be sent
    pub fn bind_material(&mut self, material: &dyn Material) -> bool {
        transition(&mut self.material, (material.id(), material.uniforms_version()))
    }

    /// Record the buffer group whose attributes are about to be bound; true when they must be bound
    pub fn bind_geometry(&mut self, key: BufferHandle) -> bool {
        transition(&mut self.geometry, key)
    }

    /// Forget the bound geometry (after drawing something outside the cache, e.g. a full-screen quad)
    pub fn forget_geometry(&mut self) {
        self.geometry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{BasicMaterial, BlendState};
    use crate::render::{GpuCommand, RecordingBackend};

    #[test]
    fn test_first_apply_sets_everything_then_nothing() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let material = BasicMaterial::new(ProgramHandle(1));

        let first = cache.apply_material(&mut backend, &material);
        assert!(first > 0);
        assert_eq!(first, backend.state_change_count());

        backend.clear_commands();
        assert_eq!(cache.apply_material(&mut backend, &material), 0);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_only_differences_are_emitted() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let opaque = BasicMaterial::new(ProgramHandle(1));
        let additive = BasicMaterial::new(ProgramHandle(1)).with_blending(BlendState::ADDITIVE);

        cache.apply_material(&mut backend, &opaque);
        backend.clear_commands();
        let changes = cache.apply_material(&mut backend, &additive);

        assert_eq!(changes, 1);
        assert_eq!(
            backend.commands(),
            &[GpuCommand::BlendFunc(BlendFactor::SrcAlpha, BlendFactor::One)]
        );
    }

    #[test]
    fn test_double_sided_disables_culling_and_keeps_winding() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let front = BasicMaterial::new(ProgramHandle(1));
        let double = BasicMaterial::new(ProgramHandle(1)).with_side(Side::Double);

        cache.apply_material(&mut backend, &front);
        backend.clear_commands();
        cache.apply_material(&mut backend, &double);

        assert_eq!(backend.commands(), &[GpuCommand::FaceCulling(false)]);
    }

    #[test]
    fn test_program_rebind_invalidates_material() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let material = BasicMaterial::new(ProgramHandle(1));

        assert!(cache.bind_program(&mut backend, ProgramHandle(1)));
        assert!(cache.bind_material(&material));
        assert!(!cache.bind_program(&mut backend, ProgramHandle(1)));
        assert!(!cache.bind_material(&material));

        assert!(cache.bind_program(&mut backend, ProgramHandle(2)));
        assert!(cache.bind_material(&material));
    }

    #[test]
    fn test_reset_forces_next_set() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let material = BasicMaterial::new(ProgramHandle(1));
        cache.apply_material(&mut backend, &material);

        cache.reset();
        assert!(cache.apply_material(&mut backend, &material) > 0);
    }

    #[test]
    fn test_line_width_only_for_wireframe_and_only_on_change() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let solid = BasicMaterial::new(ProgramHandle(1));
        let wire = BasicMaterial::new(ProgramHandle(1)).with_wireframe(2.0);
        let same_width = BasicMaterial::new(ProgramHandle(1)).with_wireframe(2.0);
        let wider = BasicMaterial::new(ProgramHandle(1)).with_wireframe(3.0);

        cache.apply_material(&mut backend, &solid);
        assert!(!backend.commands().iter().any(|c| matches!(c, GpuCommand::LineWidth(_))));

        backend.clear_commands();
        cache.apply_material(&mut backend, &wire);
        assert_eq!(backend.commands(), &[GpuCommand::LineWidth(2.0)]);

        backend.clear_commands();
        assert_eq!(cache.apply_material(&mut backend, &same_width), 0);
        assert_eq!(cache.apply_material(&mut backend, &solid), 0);

        cache.apply_material(&mut backend, &wider);
        assert_eq!(backend.commands(), &[GpuCommand::LineWidth(3.0)]);
    }

    #[test]
    fn test_polygon_offset_toggles_are_elided() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let plain = BasicMaterial::new(ProgramHandle(1));
        let decal = BasicMaterial::new(ProgramHandle(1)).with_polygon_offset(-1.0, -4.0);
        let other_decal = BasicMaterial::new(ProgramHandle(1)).with_polygon_offset(-1.0, -4.0);

        cache.apply_material(&mut backend, &plain);
        backend.clear_commands();
        cache.apply_material(&mut backend, &decal);
        assert_eq!(
            backend.commands(),
            &[
                GpuCommand::PolygonOffsetEnabled(true),
                GpuCommand::PolygonOffset { factor: -1.0, units: -4.0 },
            ]
        );

        backend.clear_commands();
        assert_eq!(cache.apply_material(&mut backend, &other_decal), 0);

        cache.apply_material(&mut backend, &plain);
        assert_eq!(backend.commands(), &[GpuCommand::PolygonOffsetEnabled(false)]);

        // Re-enabling with the remembered parameters only flips the switch
        backend.clear_commands();
        cache.apply_material(&mut backend, &decal);
        assert_eq!(backend.commands(), &[GpuCommand::PolygonOffsetEnabled(true)]);
    }

    #[test]
    fn test_uniform_key_tracks_edits_and_clones() {
        let mut cache = StateCache::new();
        let mut material = BasicMaterial::new(ProgramHandle(1));
        assert!(cache.bind_material(&material));
        assert!(!cache.bind_material(&material));

        material.set_opacity(0.5);
        assert!(cache.bind_material(&material));

        let copy = material.clone();
        assert!(cache.bind_material(&copy));
        assert!(cache.bind_material(&material));
    }
}
