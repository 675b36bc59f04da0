//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) types so users don't need to
//! depend on it directly. The [`Transform`] type holds an entity's local
//! rotation, translation, and scale, each with its own presence bit.
//!
//! ## Conventions
//!
//! glam uses column vectors, so a point is transformed as `M * p` and the
//! right-most factor applies first. A local matrix is `T * R * S`: scale
//! first, then rotation, then translation.

use bitflags::bitflags;

pub use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

bitflags! {
    /// Which parts of a [`Transform`] were authored. A missing part is skipped
    /// when building the local matrix.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransformMask: u8 {
        const ROTATION = 1 << 0;
        const TRANSLATION = 1 << 1;
        const SCALE = 1 << 2;
    }
}

/// A local transform: rotation, translation, and scale, plus a mask of which
/// of the three are present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
    pub mask: TransformMask,
}

impl Transform {
    /// Identity transform with no presence bits set.
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
        scale: Vec3::ONE,
        mask: TransformMask::empty(),
    };

    /// Create a transform with only a translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::IDENTITY.with_translation(translation)
    }

    /// Create a transform at the given position.
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    /// Create a transform with only a rotation.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self::IDENTITY.with_rotation(rotation)
    }

    /// Create a transform with only a scale.
    pub fn from_scale(scale: Vec3) -> Self {
        Self::IDENTITY.with_scale(scale)
    }

    /// Return a copy with the translation set and marked present.
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self.mask |= TransformMask::TRANSLATION;
        self
    }

    /// Return a copy with the rotation set and marked present.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self.mask |= TransformMask::ROTATION;
        self
    }

    /// Return a copy with the scale set and marked present.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self.mask |= TransformMask::SCALE;
        self
    }

    /// Compute the local matrix.
    ///
    /// Scale, rotation, and translation are applied to a point in that order,
    /// each only when its bit is set. This order is part of the scene format
    /// contract: swapping it moves vertices.
    pub fn matrix(&self) -> Mat4 {
        let mut local = Mat4::IDENTITY;
        if self.mask.contains(TransformMask::SCALE) {
            local = Mat4::from_scale(self.scale) * local;
        }
        if self.mask.contains(TransformMask::ROTATION) {
            local = Mat4::from_quat(self.rotation) * local;
        }
        if self.mask.contains(TransformMask::TRANSLATION) {
            local = Mat4::from_translation(self.translation) * local;
        }
        local
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Inverse-transpose of a model matrix, for transforming normals.
///
/// For uniform scale this equals the rotation part of the model matrix; for
/// non-uniform scale it keeps normals perpendicular to their surfaces.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    let upper = Mat3::from_mat4(model);
    if upper.determinant().abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    Mat4::from_mat3(upper.inverse().transpose())
}
