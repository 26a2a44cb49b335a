// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod frustum;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use frustum::{Plane, ViewFrustum, PLANE_BOTTOM, PLANE_LEFT, PLANE_RIGHT, PLANE_TOP};
pub use ray::Ray;
pub use transform::Mat4Ext;

/// Normalize `v`, returning `fallback` when the vector has no usable length.
///
/// Degenerate normals and zero-length directions would otherwise turn into NaN
/// and poison every pixel they touch.
#[inline]
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq > 1e-20 && len_sq.is_finite() {
        v / len_sq.sqrt()
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_or_regular() {
        let n = normalize_or(Vec3::new(0.0, 3.0, 4.0), Vec3::Y);
        assert!((n.length() - 1.0).abs() < 1e-6);
        assert!((n.z - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_or_degenerate() {
        assert_eq!(normalize_or(Vec3::ZERO, Vec3::Y), Vec3::Y);
        assert_eq!(normalize_or(Vec3::splat(f32::NAN), Vec3::X), Vec3::X);
    }
}
