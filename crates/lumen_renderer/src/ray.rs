//! Ray type used by the integrator.

use lumen_math::Vec3;

/// Distance bound of a ray that has not hit anything yet.
pub const FAR: f32 = f32::INFINITY;

/// A ray with a distance bound and medium state.
///
/// `t` starts at [`FAR`] and is tightened to the hit distance by scene
/// queries, so after a query `hit_point()` is the closest intersection.
/// `inside` tracks whether the ray travels through a dielectric.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
    pub t: f32,
    pub inside: bool,
    /// Set on rays traced for the debug viewer.
    pub debug: bool,
}

impl Ray {
    /// Unbounded ray. `direction` must be normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::bounded(origin, direction, FAR)
    }

    /// Ray that only reports hits closer than `t`. Used for shadow rays.
    pub fn bounded(origin: Vec3, direction: Vec3, t: f32) -> Self {
        Self {
            origin,
            direction,
            t,
            inside: false,
            debug: false,
        }
    }

    pub fn with_inside(mut self, inside: bool) -> Self {
        self.inside = inside;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    #[inline]
    pub fn as_math(&self) -> lumen_math::Ray {
        lumen_math::Ray::new(self.origin, self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ray_is_unbounded() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert_eq!(ray.t, FAR);
        assert!(!ray.inside);
        assert!(!ray.debug);
    }

    #[test]
    fn test_builders() {
        let ray = Ray::bounded(Vec3::ONE, -Vec3::Y, 2.0).with_inside(true).with_debug(true);
        assert_eq!(ray.t, 2.0);
        assert!(ray.inside);
        assert!(ray.debug);
        assert_eq!(ray.at(1.0), Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(ray.as_math().origin, Vec3::ONE);
    }
}
