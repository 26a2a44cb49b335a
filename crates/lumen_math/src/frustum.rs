//! Four-sided view frustum built from camera viewport corners.
//!
//! Used for reprojecting world points into a previous frame's screen space
//! and for projecting hit points into a textured spotlight's image plane.

use crate::{normalize_or, Vec2, Vec3};

pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_TOP: usize = 2;
pub const PLANE_BOTTOM: usize = 3;

/// A plane stored as unit normal plus distance from the origin.
///
/// A point P lies on the positive (inside) side when `dot(normal, P) - distance > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Plane through `point` with the given (not necessarily unit) normal.
    pub fn from_normal_point(normal: Vec3, point: Vec3) -> Self {
        let normal = normalize_or(normal, Vec3::ZERO);
        Self {
            normal,
            distance: normal.dot(point),
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.distance
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::ZERO,
            distance: 0.0,
        }
    }
}

/// Side planes of a pinhole frustum, all facing inward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewFrustum {
    pub planes: [Plane; 4],
}

impl ViewFrustum {
    /// Build the four side planes from the eye position and three viewport corners.
    ///
    /// `top_left`, `top_right` and `bottom_left` span the image plane; screen
    /// coordinates run from 0 at the left/top edge to 1 at the right/bottom edge.
    pub fn from_corners(position: Vec3, top_left: Vec3, top_right: Vec3, bottom_left: Vec3) -> Self {
        let down = top_left - bottom_left;
        let across = top_right - top_left;

        let left = down.cross(top_left - position);
        let right = (top_right - position).cross(down);
        let top = across.cross(top_left - position);
        let bottom = (bottom_left - position).cross(across);

        let mut planes = [Plane::default(); 4];
        planes[PLANE_LEFT] = Plane::from_normal_point(left, position);
        planes[PLANE_RIGHT] = Plane::from_normal_point(right, position);
        planes[PLANE_TOP] = Plane::from_normal_point(top, position);
        planes[PLANE_BOTTOM] = Plane::from_normal_point(bottom, position);
        Self { planes }
    }

    /// Signed distances to the left, right, top and bottom planes.
    pub fn distances(&self, p: Vec3) -> [f32; 4] {
        [
            self.planes[PLANE_LEFT].signed_distance(p),
            self.planes[PLANE_RIGHT].signed_distance(p),
            self.planes[PLANE_TOP].signed_distance(p),
            self.planes[PLANE_BOTTOM].signed_distance(p),
        ]
    }

    /// Normalized screen position of `p`, or `None` when it falls outside
    /// the frustum (or exactly on its apex).
    pub fn screen_coords(&self, p: Vec3) -> Option<Vec2> {
        let [d_left, d_right, d_top, d_bottom] = self.distances(p);
        let horizontal = d_left + d_right;
        let vertical = d_top + d_bottom;
        if horizontal <= 0.0 || vertical <= 0.0 {
            return None;
        }

        let uv = Vec2::new(d_left / horizontal, d_top / vertical);
        if (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y) {
            Some(uv)
        } else {
            None
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        self.distances(p).iter().all(|&d| d >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Eye at the origin looking down +Z with a 2x2 image plane at z=1.
    fn unit_frustum() -> ViewFrustum {
        ViewFrustum::from_corners(
            Vec3::ZERO,
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, -1.0, 1.0),
        )
    }

    #[test]
    fn test_center_is_inside() {
        let f = unit_frustum();
        assert!(f.contains(Vec3::new(0.0, 0.0, 5.0)));
        for d in f.distances(Vec3::new(0.0, 0.0, 5.0)) {
            assert!(d > 0.0);
        }
    }

    #[test]
    fn test_behind_is_outside() {
        let f = unit_frustum();
        assert!(!f.contains(Vec3::new(0.0, 0.0, -5.0)));
        assert!(f.screen_coords(Vec3::new(0.0, 0.0, -5.0)).is_none());
    }

    #[test]
    fn test_screen_coords_corners() {
        let f = unit_frustum();

        let center = f.screen_coords(Vec3::new(0.0, 0.0, 3.0)).unwrap();
        assert!((center - Vec2::splat(0.5)).length() < 1e-5);

        // Top-left corner of the image plane maps to (0, 0)
        let tl = f.screen_coords(Vec3::new(-0.999, 0.999, 1.0)).unwrap();
        assert!(tl.x < 0.01 && tl.y < 0.01);

        // Right half, lower half
        let br = f.screen_coords(Vec3::new(0.5, -0.5, 1.0)).unwrap();
        assert!((br.x - 0.75).abs() < 1e-4);
        assert!((br.y - 0.75).abs() < 1e-4);
    }

    #[test]
    fn test_screen_coords_depth_invariant() {
        let f = unit_frustum();
        let near = f.screen_coords(Vec3::new(0.25, 0.1, 2.0)).unwrap();
        let far = f.screen_coords(Vec3::new(0.5, 0.2, 4.0)).unwrap();
        assert!((near - far).length() < 1e-5);
    }

    #[test]
    fn test_outside_side_rejected() {
        let f = unit_frustum();
        assert!(f.screen_coords(Vec3::new(3.0, 0.0, 1.0)).is_none());
    }
}
