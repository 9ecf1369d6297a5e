//! Fixed-function GPU state requested by materials
//!
//! These are the values the [`StateCache`](crate::render::StateCache) diffs
//! against before emitting any backend call.

/// Blending presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Blending disabled
    None,
    /// Standard alpha blending
    Normal,
    /// Additive blending for glows and particles
    Additive,
    /// Destination darkened by source color
    Subtractive,
    /// Multiplicative blending
    Multiply,
    /// Caller-supplied equation and factors
    Custom,
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    /// src + dst
    Add,
    /// src - dst
    Subtract,
    /// dst - src
    ReverseSubtract,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
}

/// Blending requested by a material
///
/// `equation`, `src` and `dst` are only consulted for [`BlendMode::Custom`];
/// every other mode maps to a fixed combination through [`BlendState::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Preset
    pub mode: BlendMode,
    /// Equation for custom blending
    pub equation: BlendEquation,
    /// Source factor for custom blending
    pub src: BlendFactor,
    /// Destination factor for custom blending
    pub dst: BlendFactor,
}

/// Concrete blend configuration after resolving presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedBlend {
    /// Equation
    pub equation: BlendEquation,
    /// Source factor
    pub src: BlendFactor,
    /// Destination factor
    pub dst: BlendFactor,
}

impl BlendState {
    /// Blending disabled
    pub const NONE: Self = Self::preset(BlendMode::None);
    /// Standard alpha blending
    pub const NORMAL: Self = Self::preset(BlendMode::Normal);
    /// Additive blending
    pub const ADDITIVE: Self = Self::preset(BlendMode::Additive);

    const fn preset(mode: BlendMode) -> Self {
        Self {
            mode,
            equation: BlendEquation::Add,
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::OneMinusSrcAlpha,
        }
    }

    /// Custom blending with explicit equation and factors
    pub const fn custom(equation: BlendEquation, src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            mode: BlendMode::Custom,
            equation,
            src,
            dst,
        }
    }

    /// Map the preset to concrete GPU values; `None` means blending is disabled
    pub const fn resolve(&self) -> Option<ResolvedBlend> {
        let (equation, src, dst) = match self.mode {
            BlendMode::None => return None,
            BlendMode::Normal => (BlendEquation::Add, BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            BlendMode::Additive => (BlendEquation::Add, BlendFactor::SrcAlpha, BlendFactor::One),
            BlendMode::Subtractive => (BlendEquation::Add, BlendFactor::Zero, BlendFactor::OneMinusSrcColor),
            BlendMode::Multiply => (BlendEquation::Add, BlendFactor::Zero, BlendFactor::SrcColor),
            BlendMode::Custom => (self.equation, self.src, self.dst),
        };
        Some(ResolvedBlend { equation, src, dst })
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Which faces of a triangle are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Front faces only (back faces culled)
    #[default]
    Front,
    /// Back faces only (winding flipped)
    Back,
    /// Both faces (culling disabled)
    Double,
}

/// Depth bias used to prevent z-fighting for decals and overlays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffset {
    /// Slope-scaled factor
    pub factor: f32,
    /// Constant units
    pub units: f32,
}

impl PolygonOffset {
    /// Create a polygon offset
    pub const fn new(factor: f32, units: f32) -> Self {
        Self { factor, units }
    }
}

/// Normal data a material consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NormalShading {
    /// No normals uploaded
    #[default]
    None,
    /// One constant normal per face
    Flat,
    /// Per-vertex normals interpolated across shared vertices
    Smooth,
}

/// Color data a material consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexColors {
    /// No colors uploaded
    #[default]
    None,
    /// One color per face
    Face,
    /// One color per face corner
    Vertex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_resolve() {
        assert_eq!(BlendState::NONE.resolve(), None);

        let additive = BlendState::ADDITIVE.resolve().expect("additive blends");
        assert_eq!(additive.src, BlendFactor::SrcAlpha);
        assert_eq!(additive.dst, BlendFactor::One);
    }

    #[test]
    fn test_custom_factors_only_matter_for_custom_mode() {
        let mut normal = BlendState::NORMAL;
        normal.src = BlendFactor::DstColor;
        assert_eq!(normal.resolve(), BlendState::NORMAL.resolve());

        let custom = BlendState::custom(BlendEquation::ReverseSubtract, BlendFactor::One, BlendFactor::One);
        let resolved = custom.resolve().expect("custom blends");
        assert_eq!(resolved.equation, BlendEquation::ReverseSubtract);
    }
}
