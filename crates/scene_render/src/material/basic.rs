//! General-purpose material with plain parameters
//!
//! `BasicMaterial` covers the fixed-function surface of the pipeline: every
//! capability the renderer asks about is a field with a `with_*` builder.

use crate::foundation::math::Vec3;
use crate::render::{BackendResult, GpuBackend, ProgramHandle};

use super::{
    BlendState, Material, MaterialId, NormalShading, PolygonOffset, Side, UniformValue, VertexColors,
};

/// Material resource with explicit capability flags
///
/// Uniform state (`color`, `opacity`) is private: its setters bump the
/// version the state cache keys uploads on.
#[derive(Debug)]
pub struct BasicMaterial {
    id: MaterialId,
    program: ProgramHandle,
    color: Vec3,
    opacity: f32,
    version: u64,
    /// Optional name for debugging
    pub name: Option<String>,
    /// Drawn in the transparent bucket
    pub transparent: bool,
    /// Drawn as lines
    pub wireframe: bool,
    /// Line width for wireframe draws
    pub wireframe_line_width: f32,
    /// Blending configuration
    pub blending: BlendState,
    /// Depth testing
    pub depth_test: bool,
    /// Depth writes
    pub depth_write: bool,
    /// Depth bias
    pub polygon_offset: Option<PolygonOffset>,
    /// Rendered faces
    pub side: Side,
    /// Normal data consumed
    pub shading: NormalShading,
    /// Color data consumed
    pub vertex_colors: VertexColors,
    /// Whether a color map is sampled (needs the first UV set)
    pub uses_map: bool,
    /// Whether a light map is sampled (needs the second UV set)
    pub uses_light_map: bool,
}

impl BasicMaterial {
    /// Create an opaque, unlit material running `program`
    pub fn new(program: ProgramHandle) -> Self {
        Self {
            id: MaterialId::next(),
            program,
            color: Vec3::new(1.0, 1.0, 1.0),
            opacity: 1.0,
            version: 0,
            name: None,
            transparent: false,
            wireframe: false,
            wireframe_line_width: 1.0,
            blending: BlendState::NORMAL,
            depth_test: true,
            depth_write: true,
            polygon_offset: None,
            side: Side::Front,
            shading: NormalShading::None,
            vertex_colors: VertexColors::None,
            uses_map: false,
            uses_light_map: false,
        }
    }

    /// Set the material name for debugging
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the diffuse color
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.set_color(color);
        self
    }

    /// Make the material transparent with the given opacity
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self.transparent = true;
        self
    }

    /// Diffuse color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Opacity in 0.0-1.0
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Change the diffuse color
    pub fn set_color(&mut self, color: Vec3) {
        if self.color != color {
            self.color = color;
            self.version += 1;
        }
    }

    /// Change the opacity; the transparent bucket is left as is
    pub fn set_opacity(&mut self, opacity: f32) {
        if self.opacity != opacity {
            self.opacity = opacity;
            self.version += 1;
        }
    }

    /// Toggle the transparent bucket explicitly
    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Draw as wireframe lines
    pub fn with_wireframe(mut self, line_width: f32) -> Self {
        self.wireframe = true;
        self.wireframe_line_width = line_width;
        self
    }

    /// Set blending
    pub fn with_blending(mut self, blending: BlendState) -> Self {
        self.blending = blending;
        self
    }

    /// Set depth test and depth write
    pub fn with_depth(mut self, test: bool, write: bool) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self
    }

    /// Set polygon offset
    pub fn with_polygon_offset(mut self, factor: f32, units: f32) -> Self {
        self.polygon_offset = Some(PolygonOffset::new(factor, units));
        self
    }

    /// Set rendered faces
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Set normal shading
    pub fn with_shading(mut self, shading: NormalShading) -> Self {
        self.shading = shading;
        self
    }

    /// Set vertex color source
    pub fn with_vertex_colors(mut self, vertex_colors: VertexColors) -> Self {
        self.vertex_colors = vertex_colors;
        self
    }

    /// Sample a color map through the first UV set
    pub fn with_map(mut self) -> Self {
        self.uses_map = true;
        self
    }

    /// Sample a light map through the second UV set
    pub fn with_light_map(mut self) -> Self {
        self.uses_light_map = true;
        self
    }
}

// A clone is a distinct resource: its uniforms are tracked separately.
impl Clone for BasicMaterial {
    fn clone(&self) -> Self {
        Self {
            id: MaterialId::next(),
            program: self.program,
            color: self.color,
            opacity: self.opacity,
            version: self.version,
            name: self.name.clone(),
            transparent: self.transparent,
            wireframe: self.wireframe,
            wireframe_line_width: self.wireframe_line_width,
            blending: self.blending,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            polygon_offset: self.polygon_offset,
            side: self.side,
            shading: self.shading,
            vertex_colors: self.vertex_colors,
            uses_map: self.uses_map,
            uses_light_map: self.uses_light_map,
        }
    }
}

impl Material for BasicMaterial {
    fn id(&self) -> MaterialId {
        self.id
    }

    fn uniforms_version(&self) -> u64 {
        self.version
    }

    fn program(&self) -> ProgramHandle {
        self.program
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn needs_uv(&self) -> bool {
        self.uses_map || self.uses_light_map
    }

    fn needs_uv2(&self) -> bool {
        self.uses_light_map
    }

    fn needs_normals(&self) -> NormalShading {
        self.shading
    }

    fn needs_colors(&self) -> VertexColors {
        self.vertex_colors
    }

    fn is_transparent(&self) -> bool {
        self.transparent
    }

    fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    fn wireframe_line_width(&self) -> f32 {
        self.wireframe_line_width
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

    fn polygon_offset(&self) -> Option<PolygonOffset> {
        self.polygon_offset
    }

    fn side(&self) -> Side {
        self.side
    }

    fn bind_uniforms(&self, backend: &mut dyn GpuBackend) -> BackendResult<()> {
        backend.set_uniform("diffuse", &UniformValue::Vec3(self.color));
        backend.set_uniform("opacity", &UniformValue::Float(self.opacity));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materials_get_distinct_ids() {
        let a = BasicMaterial::new(ProgramHandle(1));
        let b = BasicMaterial::new(ProgramHandle(1));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_light_map_needs_both_uv_sets() {
        let material = BasicMaterial::new(ProgramHandle(1)).with_light_map();
        assert!(material.needs_uv());
        assert!(material.needs_uv2());
    }

    #[test]
    fn test_opacity_moves_to_transparent_bucket() {
        let material = BasicMaterial::new(ProgramHandle(1)).with_opacity(0.5);
        assert!(material.is_transparent());
    }

    #[test]
    fn test_clone_gets_fresh_id() {
        let red = BasicMaterial::new(ProgramHandle(1)).with_color(Vec3::new(1.0, 0.0, 0.0));
        let copy = red.clone();
        assert_ne!(copy.id(), red.id());
        assert_eq!(copy.color(), red.color());
        assert_eq!(copy.program(), red.program());
    }

    #[test]
    fn test_setters_bump_uniform_version() {
        let mut material = BasicMaterial::new(ProgramHandle(1));
        let start = material.uniforms_version();

        material.set_color(Vec3::new(0.0, 0.0, 1.0));
        let after_color = material.uniforms_version();
        assert!(after_color > start);

        // Same value: nothing to re-send
        material.set_color(Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(material.uniforms_version(), after_color);

        material.set_opacity(0.25);
        assert!(material.uniforms_version() > after_color);
        assert!(!material.is_transparent());
    }
}
