//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and operations
//! - Handle-based collections for the scene arena
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod logging;
