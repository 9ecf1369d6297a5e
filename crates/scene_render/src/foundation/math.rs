//! Math utilities and types
//!
//! Provides the fundamental math types shared by the scene graph, the render
//! list builder and the post-processing chain.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in parent space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix
    ///
    /// Scale is applied first, then rotation, then translation.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Create a transform from a transformation matrix
    ///
    /// Assumes the matrix has no shear and strictly positive scale.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
        let scale = Vec3::new(scale_x, scale_y, scale_z);

        let rotation_matrix = Matrix3::new(
            matrix.m11 / scale_x, matrix.m12 / scale_y, matrix.m13 / scale_z,
            matrix.m21 / scale_x, matrix.m22 / scale_y, matrix.m23 / scale_z,
            matrix.m31 / scale_x, matrix.m32 / scale_y, matrix.m33 / scale_z,
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create an OpenGL-style perspective projection (clip z in [-1, 1])
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an OpenGL-style orthographic projection
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Translation part of an affine matrix
    fn translation_part(&self) -> Vec3;

    /// Largest column scale of the upper 3x3 block
    fn max_scale_on_axis(&self) -> f32;

    /// Transform a point and divide by w
    fn project_point(&self, point: &Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }

    fn max_scale_on_axis(&self) -> f32 {
        let sx = self.m11 * self.m11 + self.m21 * self.m21 + self.m31 * self.m31;
        let sy = self.m12 * self.m12 + self.m22 * self.m22 + self.m32 * self.m32;
        let sz = self.m13 * self.m13 + self.m23 * self.m23 + self.m33 * self.m33;
        sx.max(sy).max(sz).sqrt()
    }

    fn project_point(&self, point: &Vec3) -> Vec3 {
        let clip = self * Vec4::new(point.x, point.y, point.z, 1.0);
        // w == 0 only for points on the camera plane; leave them unnormalized
        if clip.w.abs() <= f32::EPSILON {
            return clip.xyz();
        }
        clip.xyz() / clip.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_order_scale_rotate_translate() {
        let transform = Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::from_axis_angle(&Vec3::z_axis(), constants::PI * 0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        // (1,0,0) scaled -> (2,0,0), rotated 90 deg about Z -> (0,2,0), translated -> (10,2,0)
        let p = transform.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 2.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_transform_matrix_roundtrip() {
        let transform = Transform {
            position: Vec3::new(1.0, -2.0, 3.0),
            rotation: Quat::from_euler_angles(0.3, 0.2, 0.1),
            scale: Vec3::new(1.5, 2.0, 0.5),
        };
        let decomposed = Transform::from_matrix(&transform.to_matrix());

        assert_relative_eq!(decomposed.position, transform.position, epsilon = EPSILON);
        assert_relative_eq!(decomposed.scale, transform.scale, epsilon = EPSILON);
        assert_relative_eq!(decomposed.rotation, transform.rotation, epsilon = EPSILON);
    }

    #[test]
    fn test_max_scale_on_axis() {
        let m = Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 4.0, 2.0));
        assert_relative_eq!(m.max_scale_on_axis(), 4.0, epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_depth_range() {
        let projection = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 1.0, 100.0);
        let near = projection.project_point(&Vec3::new(0.0, 0.0, -1.0));
        let far = projection.project_point(&Vec3::new(0.0, 0.0, -100.0));

        assert_relative_eq!(near.z, -1.0, epsilon = 1e-4);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-4);
    }
}
