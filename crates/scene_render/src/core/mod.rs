//! # Core Module
//!
//! Shared abstractions used by every subsystem of the crate.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration for the renderer, composer and application

pub mod config;

pub use config::{
    ApplicationConfig,
    EngineConfig,
    RendererConfig,
    ComposerConfig,
};
