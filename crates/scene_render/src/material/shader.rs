//! Material driven by a caller-supplied program and uniform table
//!
//! Used by the post-processing passes: the pass rewrites uniforms (input
//! texture, blur direction, ...) before every full-screen draw.

use std::collections::BTreeMap;

use crate::render::{BackendResult, GpuBackend, ProgramHandle};

use super::{BlendState, Material, MaterialId, Side, UniformValue};

/// Program + uniform table material
#[derive(Debug)]
pub struct ShaderMaterial {
    id: MaterialId,
    program: ProgramHandle,
    uniforms: BTreeMap<String, UniformValue>,
    version: u64,
    /// Optional name for debugging
    pub name: Option<String>,
    /// Blending configuration
    pub blending: BlendState,
    /// Drawn in the transparent bucket when used on scene meshes
    pub transparent: bool,
    /// Depth testing
    pub depth_test: bool,
    /// Depth writes
    pub depth_write: bool,
    /// Rendered faces
    pub side: Side,
    /// Whether the first UV set is uploaded
    pub uses_uv: bool,
}

impl ShaderMaterial {
    /// Create a full-screen style material: no depth, both faces, no blending
    pub fn new(program: ProgramHandle) -> Self {
        Self {
            id: MaterialId::next(),
            program,
            uniforms: BTreeMap::new(),
            version: 0,
            name: None,
            blending: BlendState::NONE,
            transparent: false,
            depth_test: false,
            depth_write: false,
            side: Side::Double,
            uses_uv: true,
        }
    }

    /// Set the material name for debugging
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set blending
    pub fn with_blending(mut self, blending: BlendState) -> Self {
        self.blending = blending;
        self
    }

    /// Set a uniform at construction time
    pub fn with_uniform(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.set_uniform(name, value);
        self
    }

    /// Set or replace a uniform value
    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        let name = name.into();
        if self.uniforms.get(&name) == Some(&value) {
            return;
        }
        self.uniforms.insert(name, value);
        self.version += 1;
    }

    /// Read back a uniform value
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }
}

// A clone gets its own id so the state cache never mistakes its uniforms
// for the original's.
impl Clone for ShaderMaterial {
    fn clone(&self) -> Self {
        Self {
            id: MaterialId::next(),
            program: self.program,
            uniforms: self.uniforms.clone(),
            version: self.version,
            name: self.name.clone(),
            blending: self.blending,
            transparent: self.transparent,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            side: self.side,
            uses_uv: self.uses_uv,
        }
    }
}

impl Material for ShaderMaterial {
    fn id(&self) -> MaterialId {
        self.id
    }

    fn program(&self) -> ProgramHandle {
        self.program
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn needs_uv(&self) -> bool {
        self.uses_uv
    }

    fn is_transparent(&self) -> bool {
        self.transparent
    }

    fn blending(&self) -> BlendState {
        self.blending
    }

    fn depth_test(&self) -> bool {
        self.depth_test
    }

    fn depth_write(&self) -> bool {
        self.depth_write
    }

    fn side(&self) -> Side {
        self.side
    }

    fn uniforms_version(&self) -> u64 {
        self.version
    }

    fn bind_uniforms(&self, backend: &mut dyn GpuBackend) -> BackendResult<()> {
        for (name, value) in &self.uniforms {
            backend.set_uniform(name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_bumps_only_on_change() {
        let mut material = ShaderMaterial::new(ProgramHandle(3));
        material.set_uniform("opacity", UniformValue::Float(1.0));
        let version = material.uniforms_version();

        material.set_uniform("opacity", UniformValue::Float(1.0));
        assert_eq!(material.uniforms_version(), version);

        material.set_uniform("opacity", UniformValue::Float(0.5));
        assert_eq!(material.uniforms_version(), version + 1);
        assert_eq!(material.uniform("opacity"), Some(&UniformValue::Float(0.5)));
    }

    #[test]
    fn test_clone_keeps_uniforms_under_new_id() {
        let original =
            ShaderMaterial::new(ProgramHandle(3)).with_uniform("opacity", UniformValue::Float(0.5));
        let mut copy = original.clone();
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.uniform("opacity"), Some(&UniformValue::Float(0.5)));

        copy.set_uniform("opacity", UniformValue::Float(1.0));
        assert_eq!(original.uniform("opacity"), Some(&UniformValue::Float(0.5)));
    }
}
