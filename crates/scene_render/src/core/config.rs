//! # Unified Configuration System
//!
//! Configuration structures for the renderer, the effect composer and the
//! surrounding application. Every struct is serde-serializable so the whole
//! tree can be loaded through [`Config`](crate::config::Config).
//!
//! ## Configuration Categories
//!
//! - **Renderer Config**: Clear behavior, sorting, staging-memory policy, output size
//! - **Composer Config**: Off-screen target allocation for the pass chain
//! - **Engine Config**: Logging and debug features
//! - **Application Config**: Aggregate of the above

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError, ConfigFormat};

/// # Renderer Configuration
///
/// Per-frame behavior of the [`Renderer`](crate::render::Renderer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Background clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
    /// Clear the active target before drawing each frame
    pub auto_clear: bool,
    /// Include the color buffer in automatic clears
    pub auto_clear_color: bool,
    /// Include the depth buffer in automatic clears
    pub auto_clear_depth: bool,
    /// Include the stencil buffer in automatic clears
    pub auto_clear_stencil: bool,
    /// Depth-sort the opaque and transparent buckets
    pub sort_objects: bool,
    /// Free CPU staging arrays right after each upload
    pub dispose_staging: bool,
    /// Initial output width in pixels
    pub output_width: u32,
    /// Initial output height in pixels
    pub output_height: u32,
}

impl RendererConfig {
    /// Create a new renderer configuration with defaults
    pub fn new() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            auto_clear: true,
            auto_clear_color: true,
            auto_clear_depth: true,
            auto_clear_stencil: true,
            sort_objects: true,
            dispose_staging: false,
            output_width: 800,
            output_height: 600,
        }
    }

    /// Set background clear color [R, G, B, A] (0.0-1.0 range)
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Enable or disable automatic clearing
    pub fn with_auto_clear(mut self, enabled: bool) -> Self {
        self.auto_clear = enabled;
        self
    }

    /// Enable or disable depth sorting of the render buckets
    pub fn with_sorting(mut self, enabled: bool) -> Self {
        self.sort_objects = enabled;
        self
    }

    /// Free staging arrays after upload
    pub fn with_dispose_staging(mut self, enabled: bool) -> Self {
        self.dispose_staging = enabled;
        self
    }

    /// Set the initial output size
    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_width = width;
        self.output_height = height;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Output size must be non-zero, got {}x{}",
                self.output_width, self.output_height
            )));
        }

        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "Clear color components must be in 0.0-1.0, got {:?}",
                self.clear_color
            )));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Composer Configuration
///
/// Controls how the [`EffectComposer`](crate::postprocessing::EffectComposer)
/// allocates its ping-pong targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Attach a depth buffer to both ping-pong targets
    pub depth_buffer: bool,
    /// Fixed target size; `None` follows the renderer's output size
    pub fixed_size: Option<(u32, u32)>,
}

impl ComposerConfig {
    /// Create a new composer configuration
    pub fn new() -> Self {
        Self {
            depth_buffer: true,
            fixed_size: None,
        }
    }

    /// Pin the targets to a fixed size
    pub fn with_fixed_size(mut self, width: u32, height: u32) -> Self {
        self.fixed_size = Some((width, height));
        self
    }

    /// Enable or disable depth attachments
    pub fn with_depth_buffer(mut self, enabled: bool) -> Self {
        self.depth_buffer = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.fixed_size {
            Some((0, _) | (_, 0)) => Err(ConfigError::Invalid(
                "Composer fixed size must be non-zero".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Engine Configuration
///
/// Core behavior configuration including logging and debug features.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level for the crate (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
    /// Whether to enable debug features
    pub debug_mode: bool,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: cfg!(debug_assertions),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable debug mode
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_level.as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(ConfigError::Invalid(format!("Unknown log level: {other}"))),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that encompasses all subsystems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Renderer configuration
    pub renderer: RendererConfig,
    /// Post-processing configuration
    pub composer: ComposerConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.renderer.validate()?;
        self.composer.validate()?;
        Ok(())
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ApplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_output_size_rejected() {
        let config = RendererConfig::new().with_output_size(0, 600);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [renderer]
            sort_objects = false
            output_width = 1920
            output_height = 1080

            [engine]
            log_level = "debug"
        "#;

        let config = ApplicationConfig::from_str_with_format(toml, ConfigFormat::Toml)
            .expect("config should parse");

        assert!(!config.renderer.sort_objects);
        assert_eq!(config.renderer.output_width, 1920);
        assert!(config.renderer.auto_clear);
        assert_eq!(config.engine.log_level, "debug");
        assert!(config.composer.depth_buffer);
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = ApplicationConfig {
            composer: ComposerConfig::new().with_fixed_size(256, 256),
            ..Default::default()
        };
        let text = config.to_string_with_format(ConfigFormat::Ron).expect("serialize");
        let parsed = ApplicationConfig::from_str_with_format(&text, ConfigFormat::Ron).expect("parse");

        assert_eq!(parsed.composer.fixed_size, Some((256, 256)));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = EngineConfig::new().with_log_level("loud");
        assert!(config.validate().is_err());
    }
}
