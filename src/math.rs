// Math utilities for the mirror renderer

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::error::SceneError;

/// Normals shorter than this are treated as degenerate.
const MIN_NORMAL_LENGTH: f32 = 1e-6;

/// Represents a 3D transformation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Create a new transform
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Create an identity transform
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Create a transform from a position and XYZ euler angles in degrees.
    pub fn from_euler_degrees(position: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Self {
        let rotation = Quat::from_euler(
            glam::EulerRot::XYZ,
            rotation_degrees.x.to_radians(),
            rotation_degrees.y.to_radians(),
            rotation_degrees.z.to_radians(),
        );
        Self::new(position, rotation, scale)
    }

    /// Generate transformation matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            self.rotation,
            self.position
        )
    }

    /// Matrix for transforming normals (inverse transpose of the upper 3x3).
    pub fn normal_matrix(&self) -> Mat4 {
        let matrix = self.matrix();
        if matrix.determinant().abs() <= f32::EPSILON {
            return Mat4::IDENTITY;
        }
        matrix.inverse().transpose()
    }

    /// Transform a local-space direction by rotation and scale, without translation.
    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * (self.scale * direction)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// An infinite plane through `point` with unit `normal`.
///
/// The side the normal points to is the "front" side: points there have a
/// positive signed distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    point: Vec3,
    normal: Vec3,
}

impl Plane {
    /// Build a plane, normalizing `normal`.
    ///
    /// Fails with [`SceneError::DegenerateGeometry`] when the normal is zero,
    /// too short to normalize, or not finite.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Result<Self, SceneError> {
        let length = normal.length();
        if !length.is_finite() || length < MIN_NORMAL_LENGTH || !point.is_finite() {
            return Err(SceneError::DegenerateGeometry {
                reason: format!("plane normal {normal} at {point} cannot be normalized"),
            });
        }
        Ok(Self {
            point,
            normal: normal / length,
        })
    }

    pub fn point(&self) -> Vec3 {
        self.point
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Signed distance of `x` from the plane along the normal.
    pub fn signed_distance(&self, x: Vec3) -> f32 {
        (x - self.point).dot(self.normal)
    }

    /// Mirror image of a point: `X' = X - 2 * dot(X - P, N) * N`.
    pub fn reflect_point(&self, x: Vec3) -> Vec3 {
        x - 2.0 * self.signed_distance(x) * self.normal
    }

    /// Mirror image of a direction (translation-free part of the reflection).
    pub fn reflect_direction(&self, direction: Vec3) -> Vec3 {
        direction - 2.0 * direction.dot(self.normal) * self.normal
    }

    /// Plane as `(a, b, c, d)` with `a*x + b*y + c*z + d = signed distance`.
    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(-self.normal.dot(self.point))
    }
}
