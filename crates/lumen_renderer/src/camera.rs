//! Thin-lens camera with a view frustum and a previous-frame snapshot.

use lumen_math::{normalize_or, UVec2, Vec2, Vec3, ViewFrustum};

use crate::{Ray, Scene};

pub const DEFAULT_POSITION: Vec3 = Vec3::new(-1.793, 1.109, 6.860);
pub const DEFAULT_TARGET: Vec3 = Vec3::new(0.0, 0.109, 2.0);
pub const DEFAULT_FOV: f32 = 50.0;
pub const DEFAULT_FOCUS_DISTANCE: f32 = 10.0;
pub const DEFAULT_DEFOCUS_RADIUS: f32 = 0.02;
pub const MAX_FOCUS_DISTANCE: f32 = 300.0;
pub const MAX_FOV: f32 = 180.0;

/// Focus changes smaller than this do not count as camera movement.
const FOCUS_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    /// Vertical field of view in degrees.
    fov: f32,
    aspect: f32,
    focus_distance: f32,
    defocus_radius: f32,

    forward: Vec3,
    right: Vec3,
    up: Vec3,

    viewport_width: f32,
    viewport_height: f32,
    viewport_u: Vec3,
    viewport_v: Vec3,
    top_left: Vec3,
    top_right: Vec3,
    bottom_left: Vec3,

    defocus_u: Vec3,
    defocus_v: Vec3,

    frustum: ViewFrustum,
    prev_position: Vec3,
    prev_frustum: ViewFrustum,
    moved: bool,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self::looking_at(DEFAULT_POSITION, DEFAULT_TARGET, aspect)
    }

    pub fn looking_at(position: Vec3, target: Vec3, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            target,
            fov: DEFAULT_FOV,
            aspect,
            focus_distance: DEFAULT_FOCUS_DISTANCE,
            defocus_radius: DEFAULT_DEFOCUS_RADIUS,
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            viewport_width: 0.0,
            viewport_height: 0.0,
            viewport_u: Vec3::ZERO,
            viewport_v: Vec3::ZERO,
            top_left: Vec3::ZERO,
            top_right: Vec3::ZERO,
            bottom_left: Vec3::ZERO,
            defocus_u: Vec3::ZERO,
            defocus_v: Vec3::ZERO,
            frustum: ViewFrustum::default(),
            prev_position: position,
            prev_frustum: ViewFrustum::default(),
            moved: false,
        };
        camera.update();
        camera.prev_frustum = camera.frustum;
        camera
    }

    fn update(&mut self) {
        self.forward = normalize_or(self.target - self.position, Vec3::NEG_Z);
        self.right = normalize_or(Vec3::Y.cross(self.forward), Vec3::X);
        self.up = self.forward.cross(self.right);

        self.viewport_height = 2.0 * (self.fov.to_radians() * 0.5).tan() * self.focus_distance;
        self.viewport_width = self.viewport_height * self.aspect;
        self.viewport_u = self.viewport_width * self.right;
        self.viewport_v = self.viewport_height * -self.up;

        self.top_left =
            self.position + self.focus_distance * self.forward - self.viewport_u * 0.5 - self.viewport_v * 0.5;
        self.top_right = self.top_left + self.viewport_u;
        self.bottom_left = self.top_left + self.viewport_v;

        self.defocus_u = self.right * self.defocus_radius;
        self.defocus_v = self.up * self.defocus_radius;

        self.frustum = ViewFrustum::from_corners(self.position, self.top_left, self.top_right, self.bottom_left);
        self.moved = true;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update();
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.update();
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.position = position;
        self.target = target;
        self.update();
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(1.0, MAX_FOV - 1.0);
        self.update();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update();
    }

    pub fn set_focus_distance(&mut self, distance: f32) {
        self.focus_distance = distance.clamp(f32::EPSILON, MAX_FOCUS_DISTANCE);
        self.update();
    }

    pub fn set_defocus_radius(&mut self, radius: f32) {
        self.defocus_radius = radius.max(0.0);
        self.update();
    }

    /// Focus on whatever lies straight ahead, capped at [`MAX_FOCUS_DISTANCE`].
    /// Returns whether the focus distance changed.
    pub fn auto_focus(&mut self, scene: &Scene) -> bool {
        let ray = Ray::new(self.position, self.forward);
        let distance = scene
            .intersect(&ray)
            .map_or(MAX_FOCUS_DISTANCE, |hit| hit.distance.min(MAX_FOCUS_DISTANCE));

        if (distance - self.focus_distance).abs() <= FOCUS_TOLERANCE {
            return false;
        }
        self.set_focus_distance(distance);
        true
    }

    /// Primary ray through `pixel` (continuous coordinates, origin at the
    /// top-left corner). `lens` is a unit-disk sample for depth of field.
    pub fn primary_ray(&self, pixel: Vec2, resolution: UVec2, lens: Option<Vec2>) -> Ray {
        let u = pixel.x / resolution.x as f32;
        let v = pixel.y / resolution.y as f32;
        let focus_point = self.top_left + u * self.viewport_u + v * self.viewport_v;

        let origin = match lens {
            Some(disk) => self.position + disk.x * self.defocus_u + disk.y * self.defocus_v,
            None => self.position,
        };
        Ray::new(origin, normalize_or(focus_point - origin, self.forward))
    }

    /// Snapshot the current view as the previous frame's and clear the
    /// movement flag. Called once after each rendered frame.
    pub fn end_frame(&mut self) {
        self.prev_position = self.position;
        self.prev_frustum = self.frustum;
        self.moved = false;
    }

    /// Whether any parameter changed since the last [`Camera::end_frame`].
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Screen position of `p` as seen by the previous frame's camera.
    pub fn reproject(&self, p: Vec3) -> Option<Vec2> {
        self.prev_frustum.screen_coords(p)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn focus_distance(&self) -> f32 {
        self.focus_distance
    }

    pub fn defocus_radius(&self) -> f32 {
        self.defocus_radius
    }

    /// Viewport width and height at the focus distance.
    pub fn viewport_size(&self) -> Vec2 {
        Vec2::new(self.viewport_width, self.viewport_height)
    }

    pub fn frustum(&self) -> &ViewFrustum {
        &self.frustum
    }

    pub fn previous_position(&self) -> Vec3 {
        self.prev_position
    }

    pub fn previous_frustum(&self) -> &ViewFrustum {
        &self.prev_frustum
    }
}
