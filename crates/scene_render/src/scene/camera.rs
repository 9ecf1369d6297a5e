//! # Camera
//!
//! Look-at camera producing the view and projection matrices the render list
//! and the backend consume.
//!
//! ## Design Principles
//! - **Not a scene node**: the camera is passed to every render call, so one
//!   graph can be drawn from several viewpoints in the same frame
//! - **On-demand matrices**: nothing is cached; every query recomputes

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::CameraUniforms;

use super::bounds::Frustum;

/// Projection model of a camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        /// Width / height
        aspect: f32,
    },
    /// Orthographic projection with an explicit view volume
    Orthographic {
        /// Left edge of the view volume
        left: f32,
        /// Right edge of the view volume
        right: f32,
        /// Bottom edge of the view volume
        bottom: f32,
        /// Top edge of the view volume
        top: f32,
    },
}

/// 3D Camera for perspective and orthographic projections
///
/// # Coordinate System
/// Right-handed, Y-up view space looking down -Z. Clip space z is in
/// [-1, 1], so normalized depth grows from the near plane (-1) to the far
/// plane (1).
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Projection model
    pub projection: Projection,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,
}

impl Camera {
    /// Create a new perspective camera with standard Y-up orientation
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    ///
    /// The camera looks at the origin until [`look_at`](Self::look_at) is called.
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            projection: Projection::Perspective {
                fov_y: utils::deg_to_rad(fov_degrees),
                aspect,
            },
            near,
            far,
        }
    }

    /// Create an orthographic camera with a symmetric view volume of the given half-size
    pub fn orthographic(position: Vec3, half_width: f32, half_height: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            projection: Projection::Orthographic {
                left: -half_width,
                right: half_width,
                bottom: -half_height,
                top: half_height,
            },
            near,
            far,
        }
    }

    /// Update camera position in world space
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Configure camera to look at a specific point with custom up vector
    ///
    /// The up vector doesn't need to be perpendicular to the view direction;
    /// the look-at construction orthonormalizes it.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// Update the aspect ratio after a viewport change
    ///
    /// Orthographic cameras keep their height and rescale their width.
    pub fn set_aspect_ratio(&mut self, new_aspect: f32) {
        match &mut self.projection {
            Projection::Perspective { aspect, .. } => *aspect = new_aspect,
            Projection::Orthographic { left, right, bottom, top } => {
                let half_width = (*top - *bottom) * 0.5 * new_aspect;
                let center = (*left + *right) * 0.5;
                *left = center - half_width;
                *right = center + half_width;
            }
        }
    }

    /// World-to-camera transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Camera-to-clip transform
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y, aspect } => Mat4::perspective(fov_y, aspect, self.near, self.far),
            Projection::Orthographic { left, right, bottom, top } => {
                Mat4::orthographic(left, right, bottom, top, self.near, self.far)
            }
        }
    }

    /// Projection * view
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space view frustum
    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(&self.view_projection_matrix())
    }

    /// Uniform block sent whenever a program is bound
    pub fn uniforms(&self) -> CameraUniforms {
        CameraUniforms {
            projection: self.projection_matrix(),
            view: self.view_matrix(),
            camera_position: self.position,
        }
    }
}
