// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rigid transforms produced by registration
//!
//! Rotation is stored as a unit quaternion, so it is always proper
//! (determinant +1). Applied as rotate, then translate.

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector3};

/// Rotation + translation mapping source coordinates into target coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub const fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(UnitQuaternion::identity(), translation)
    }

    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self::new(rotation, Vector3::zeros())
    }

    /// Build from a 3x3 rotation matrix that is already orthonormal with
    /// determinant +1 (e.g. a reflection-corrected Kabsch result)
    pub fn from_rotation_matrix(rotation: &Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rotation = Rotation3::from_matrix_unchecked(*rotation);
        Self::new(UnitQuaternion::from_rotation_matrix(&rotation), translation)
    }

    #[inline]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }

    #[inline]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    pub fn transform_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// `self ∘ other`: applies `other` first, then `self`
    ///
    /// As matrices this is `self.to_matrix4() * other.to_matrix4()`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            rotation: inv_rotation,
            translation: inv_rotation * (-self.translation),
        }
    }

    /// 4x4 homogeneous matrix
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        let rot = self.rotation.to_rotation_matrix();
        mat.fixed_view_mut::<3, 3>(0, 0).copy_from(rot.matrix());
        mat[(0, 3)] = self.translation.x;
        mat[(1, 3)] = self.translation.y;
        mat[(2, 3)] = self.translation.z;
        mat
    }

    /// Column-major 16 element array (WebGL / three.js `Matrix4.fromArray`)
    pub fn to_column_major(&self) -> [f64; 16] {
        let mat = self.to_matrix4();
        let mut out = [0.0; 16];
        out.copy_from_slice(mat.as_slice());
        out
    }

    /// Determinant of the rotation part
    pub fn rotation_determinant(&self) -> f64 {
        self.rotation.to_rotation_matrix().matrix().determinant()
    }

    /// Rotation angle in radians, in [0, π]
    ///
    /// `atan2` form stays accurate near zero, where `acos(w)` loses half
    /// the significant digits.
    pub fn rotation_angle(&self) -> f64 {
        let q = self.rotation.quaternion();
        2.0 * q.imag().norm().atan2(q.scalar().abs())
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.rotation_angle() < epsilon && self.translation.norm() < epsilon
    }
}
