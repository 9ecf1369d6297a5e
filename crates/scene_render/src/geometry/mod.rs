//! Geometry and its GPU representation
//!
//! - [`Geometry`]: face-list source data
//! - [`GeometryGroup`]: 16-bit-indexable GPU buffers built from a geometry
//! - [`DirtyFlags`]: per-channel upload tracking
//! - [`Mesh`]: geometry + material binding, owns its groups

mod buffer_group;
mod dirty;
#[allow(clippy::module_inception)]
mod geometry;
mod mesh;

pub use buffer_group::{build_groups, GeometryGroup, GroupBuffers, UploadStats, MAX_GROUP_VERTICES};
pub use dirty::{Channel, ChannelSet, ChannelState, DirtyFlags};
pub use geometry::{Face, Geometry};
pub use mesh::{Mesh, MeshMaterial};
