//! Light set: analytic lights, one quad area light and an environment dome.
//!
//! Every light evaluates `intensity(hit)`: incident radiance times the
//! cosine term, zero when a shadow ray toward the light is blocked.

use std::f32::consts::PI;
use std::sync::Arc;

use lumen_core::{FilterMode, SamplePolicy, Texture, WrapMode};
use lumen_math::{normalize_or, Vec2, Vec3, Vec4, ViewFrustum};

use crate::{Color, EvalContext, Intersection, Ray, Sampler};

/// Cosine of the inner spot cone (20 degrees).
pub const SPOT_INNER_COS: f32 = 0.939_692_6;
/// Cosine of the outer spot cone (22.5 degrees).
pub const SPOT_OUTER_COS: f32 = 0.887_010_8;

pub const TEXTURED_SPOT_VIEWPORT_HEIGHT: f32 = 2.309_401;
pub const TEXTURED_SPOT_VIEWPORT_DISTANCE: f32 = 2.0;

const SKYDOME_POLICY: SamplePolicy = SamplePolicy::new(WrapMode::Looped, FilterMode::Linear);
const PROJECTOR_POLICY: SamplePolicy = SamplePolicy::new(WrapMode::Clamped, FilterMode::Linear);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Point,
    Directional,
    Spot,
    TexturedSpot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Color,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Unit direction the light travels in.
    pub direction: Vec3,
    pub color: Color,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    /// Unit direction of the cone axis.
    pub direction: Vec3,
    pub color: Color,
    pub strength: f32,
}

impl SpotLight {
    pub fn aimed(position: Vec3, target: Vec3, color: Color, strength: f32) -> Self {
        Self {
            position,
            direction: normalize_or(target - position, -Vec3::Y),
            color,
            strength,
        }
    }

    /// Smooth falloff between the inner and outer cone, for a unit vector
    /// pointing from the light toward the shaded point.
    pub fn falloff(&self, to_point: Vec3) -> f32 {
        let theta = to_point.dot(self.direction);
        ((theta - SPOT_OUTER_COS) / (SPOT_INNER_COS - SPOT_OUTER_COS)).clamp(0.0, 1.0)
    }
}

/// A spotlight projecting an image through its own frustum.
#[derive(Debug, Clone)]
pub struct TexturedSpotlight {
    position: Vec3,
    target: Vec3,
    frustum: ViewFrustum,
    texture: Arc<Texture<Vec4>>,
    pub strength: f32,
}

impl TexturedSpotlight {
    pub fn new(position: Vec3, target: Vec3, texture: Arc<Texture<Vec4>>, strength: f32) -> Self {
        let mut light = Self {
            position,
            target,
            frustum: ViewFrustum::default(),
            texture,
            strength,
        };
        light.aim(position, target);
        light
    }

    /// Move the projector and rebuild its frustum.
    pub fn aim(&mut self, position: Vec3, target: Vec3) {
        let forward = normalize_or(target - position, -Vec3::Y);
        let right = normalize_or(Vec3::Y.cross(forward), Vec3::X);
        let up = forward.cross(right);

        let height = TEXTURED_SPOT_VIEWPORT_HEIGHT;
        let width = height * self.texture.aspect();
        let across = right * width;
        let down = -up * height;

        let top_left = position + forward * TEXTURED_SPOT_VIEWPORT_DISTANCE - across * 0.5 - down * 0.5;
        self.frustum = ViewFrustum::from_corners(position, top_left, top_left + across, top_left + down);
        self.position = position;
        self.target = target;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Projected colour at `p`, black outside the frustum.
    pub fn projected(&self, p: Vec3) -> Color {
        match self.frustum.screen_coords(p) {
            Some(uv) => self
                .texture
                .sample(Vec2::new(uv.x, 1.0 - uv.y), PROJECTOR_POLICY)
                .truncate(),
            None => Color::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Light {
    Point(PointLight),
    Directional(DirectionalLight),
    Spot(SpotLight),
    TexturedSpot(TexturedSpotlight),
}

impl Light {
    pub fn kind(&self) -> LightKind {
        match self {
            Light::Point(_) => LightKind::Point,
            Light::Directional(_) => LightKind::Directional,
            Light::Spot(_) => LightKind::Spot,
            Light::TexturedSpot(_) => LightKind::TexturedSpot,
        }
    }

    pub fn is_enabled(&self, ctx: &EvalContext) -> bool {
        match self.kind() {
            LightKind::Point => ctx.point_lights,
            LightKind::Directional => ctx.directional_lights,
            LightKind::Spot => ctx.spot_lights,
            LightKind::TexturedSpot => ctx.textured_spot_lights,
        }
    }

    pub fn intensity(&self, hit: &Intersection, ctx: &EvalContext) -> Color {
        match self {
            Light::Point(light) => {
                let Some((dir, dist)) = visible_from(hit, light.position, ctx) else {
                    return Color::ZERO;
                };
                let cos = hit.normal.dot(dir).max(0.0);
                cos / (dist * dist) * light.color * light.strength
            }

            Light::Directional(light) => {
                let to_light = -light.direction;
                let shadow = Ray::new(hit.point + to_light * ctx.epsilon, to_light);
                if hit.scene.is_occluded(&shadow) {
                    return Color::ZERO;
                }
                hit.normal.dot(to_light).max(0.0) * light.color * light.strength
            }

            Light::Spot(light) => {
                let Some((dir, dist)) = visible_from(hit, light.position, ctx) else {
                    return Color::ZERO;
                };
                let cos = hit.normal.dot(dir).max(0.0);
                let falloff = light.falloff(-dir);
                cos * falloff / (dist * dist) * light.color * light.strength
            }

            Light::TexturedSpot(light) => {
                let projected = light.projected(hit.point);
                if projected == Color::ZERO {
                    return Color::ZERO;
                }
                let Some((dir, dist)) = visible_from(hit, light.position, ctx) else {
                    return Color::ZERO;
                };
                let cos = hit.normal.dot(dir).max(0.0);
                cos / (dist * dist) * projected * light.strength
            }
        }
    }
}

/// Unit direction and distance from the hit to `position`, or `None` when a
/// shadow ray between them is blocked.
fn visible_from(hit: &Intersection, position: Vec3, ctx: &EvalContext) -> Option<(Vec3, f32)> {
    let offset = position - hit.point;
    let dist = offset.length();
    if dist <= ctx.epsilon {
        return None;
    }
    let dir = offset / dist;
    let shadow = Ray::bounded(hit.point + dir * ctx.epsilon, dir, dist - ctx.epsilon);
    (!hit.scene.is_occluded(&shadow)).then_some((dir, dist))
}

/// Rectangular area light spanned by two edges from a corner. Emits on the
/// side of `edge_u x edge_v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadLight {
    pub corner: Vec3,
    pub edge_u: Vec3,
    pub edge_v: Vec3,
    pub color: Color,
    pub strength: f32,
}

impl QuadLight {
    pub fn normal(&self) -> Vec3 {
        normalize_or(self.edge_u.cross(self.edge_v), -Vec3::Y)
    }

    pub fn area(&self) -> f32 {
        self.edge_u.cross(self.edge_v).length()
    }

    pub fn center(&self) -> Vec3 {
        self.corner + (self.edge_u + self.edge_v) * 0.5
    }

    /// One-sample estimate using a uniformly random point on the quad.
    pub fn intensity(&self, hit: &Intersection, ctx: &EvalContext, sampler: &mut Sampler) -> Color {
        let point = self.corner + self.edge_u * sampler.next_f32() + self.edge_v * sampler.next_f32();
        let Some((dir, dist)) = visible_from(hit, point, ctx) else {
            return Color::ZERO;
        };
        let cos_light = self.normal().dot(-dir).max(0.0);
        let cos_surface = hit.normal.dot(dir).max(0.0);
        self.color * self.strength * self.area() * cos_light * cos_surface / (dist * dist)
    }
}

/// Equirectangular environment.
#[derive(Debug, Clone)]
pub struct Skydome {
    texture: Arc<Texture<Vec4>>,
}

impl Skydome {
    pub fn new(texture: Arc<Texture<Vec4>>) -> Self {
        Self { texture }
    }

    /// Radiance arriving from unit `direction`.
    pub fn sample(&self, direction: Vec3) -> Color {
        self.texture.sample(sphere_uv(direction), SKYDOME_POLICY).truncate()
    }

    /// One-sample ambient term: a random hemisphere direction, black if blocked.
    pub fn ambient(&self, hit: &Intersection, ctx: &EvalContext, sampler: &mut Sampler) -> Color {
        hemisphere_ambient(hit, ctx, sampler, |dir| self.sample(dir))
    }
}

/// Equirectangular UV of a unit direction.
pub fn sphere_uv(direction: Vec3) -> Vec2 {
    let u = ((-direction.z).atan2(direction.x) + PI) / (2.0 * PI);
    let v = (-direction.y).clamp(-1.0, 1.0).acos() / PI;
    Vec2::new(u, v)
}

fn hemisphere_ambient(
    hit: &Intersection,
    ctx: &EvalContext,
    sampler: &mut Sampler,
    radiance: impl Fn(Vec3) -> Color,
) -> Color {
    let dir = sampler.hemisphere_direction(hit.normal);
    let probe = Ray::new(hit.point + dir * ctx.epsilon, dir);
    if hit.scene.is_occluded(&probe) {
        return Color::ZERO;
    }
    hit.normal.dot(dir).max(0.0) * radiance(dir)
}

/// All lights of a scene.
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    pub lights: Vec<Light>,
    pub quad: Option<QuadLight>,
    pub skydome: Option<Skydome>,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// Sum of all enabled analytic lights.
    pub fn direct_light(&self, hit: &Intersection, ctx: &EvalContext) -> Color {
        self.lights
            .iter()
            .filter(|light| light.is_enabled(ctx))
            .map(|light| light.intensity(hit, ctx))
            .sum()
    }

    /// Analytic lights plus the area light and an ambient term: the skydome
    /// when enabled, otherwise the flat miss colour.
    pub fn direct_light_with_environment(
        &self,
        hit: &Intersection,
        ctx: &EvalContext,
        sampler: &mut Sampler,
    ) -> Color {
        let mut result = self.direct_light(hit, ctx);

        if ctx.quad_light {
            if let Some(quad) = &self.quad {
                result += quad.intensity(hit, ctx, sampler);
            }
        }

        result += match self.active_skydome(ctx) {
            Some(sky) => sky.ambient(hit, ctx, sampler),
            None => hemisphere_ambient(hit, ctx, sampler, |_| ctx.miss_color),
        };
        result
    }

    /// Radiance of a ray that left the scene.
    pub fn miss_color(&self, direction: Vec3, ctx: &EvalContext) -> Color {
        match self.active_skydome(ctx) {
            Some(sky) => sky.sample(direction),
            None => ctx.miss_color,
        }
    }

    fn active_skydome(&self, ctx: &EvalContext) -> Option<&Skydome> {
        self.skydome.as_ref().filter(|_| ctx.skydome)
    }
}
