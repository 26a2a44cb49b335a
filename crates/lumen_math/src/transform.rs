// Transform helpers for instanced geometry.
//
// glam::Mat4 already provides transform_point3(), transform_vector3() and inverse().

use glam::{Mat3, Mat4, Vec3};

use crate::{normalize_or, Aabb};

/// Extension trait for Mat4 with the extra transforms instancing needs.
pub trait Mat4Ext {
    /// World-space box around all 8 transformed corners of `aabb`.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Inverse-transpose of the upper 3x3, for carrying normals through
    /// non-uniform scale.
    fn normal_matrix(&self) -> Mat3;

    /// Transform a surface normal and renormalize it.
    fn transform_normal(&self, normal: Vec3) -> Vec3 {
        normalize_or(self.normal_matrix() * normal, normal)
    }
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }

        let (lo, hi) = (aabb.min, aabb.max);
        let mut result = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            result.grow(self.transform_point3(corner));
        }
        result
    }

    fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(*self).inverse().transpose()
    }
}
