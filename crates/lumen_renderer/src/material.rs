//! Surface scattering.
//!
//! Materials are a closed set of variants dispatched with `match`. Every
//! variant scatters (none absorb outright); the integrator still handles a
//! `None` result as a terminal event.

use std::sync::Arc;

use lumen_core::{PackedTexel, SamplePolicy, Texture};
use lumen_math::{normalize_or, Vec3};

use crate::{EvalContext, Intersection, Ray, Sampler};

/// Color type alias (linear RGB)
pub type Color = Vec3;

pub const DEFAULT_IOR: f32 = 1.5;
pub const GLOSSY_SPECULAR_CHANCE: f32 = 0.5;
pub const GLOSSY_SMOOTHNESS: f32 = 0.5;
pub const FRESNEL_GLOSSY_SMOOTHNESS: f32 = 0.75;
/// Index of refraction used by the Fresnel-weighted glossy coin flip.
pub const FRESNEL_GLOSSY_IOR: f32 = 2.0;
/// Texels with less coverage than this are treated as holes.
const ALPHA_CUTOFF: f32 = 0.5;

/// How a glossy surface decides between its specular and diffuse lobes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecularChance {
    /// Constant probability of taking the mirror lobe.
    Fixed(f32),
    /// Schlick reflectance at the incidence angle.
    Fresnel,
}

impl SpecularChance {
    fn probability(&self, cos_theta: f32) -> f32 {
        match *self {
            SpecularChance::Fixed(p) => p,
            SpecularChance::Fresnel => schlick(cos_theta, FRESNEL_GLOSSY_IOR),
        }
    }
}

/// Variant tag, used to retarget a material without supplying a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Diffuse,
    Metallic,
    Dielectric,
    Glossy,
    Textured,
}

#[derive(Debug, Clone)]
pub enum Material {
    /// Lambertian reflector, optionally emissive.
    Diffuse { albedo: Color, emission: Color },
    /// Perfect mirror.
    Metallic,
    /// Glass-like interface with Beer-Lambert absorption inside.
    Dielectric { absorption: Color, ior: f32 },
    /// Stochastic blend of a diffuse bounce and a mirror bounce.
    Glossy {
        albedo: Color,
        smoothness: f32,
        specular: SpecularChance,
    },
    /// Glossy surface whose albedo, roughness and coverage come from a texture.
    Textured {
        texture: Arc<Texture<PackedTexel>>,
        policy: SamplePolicy,
        specular: SpecularChance,
    },
}

/// Outgoing ray plus the weight it carries.
#[derive(Debug, Clone, Copy)]
pub struct ScatterResult {
    pub ray: Ray,
    pub attenuation: Color,
}

impl Material {
    pub fn diffuse(albedo: Color) -> Self {
        Material::Diffuse {
            albedo,
            emission: Color::ZERO,
        }
    }

    pub fn emissive(albedo: Color, emission: Color) -> Self {
        Material::Diffuse { albedo, emission }
    }

    pub fn dielectric(ior: f32, absorption: Color) -> Self {
        Material::Dielectric { absorption, ior }
    }

    pub fn glossy(albedo: Color) -> Self {
        Material::Glossy {
            albedo,
            smoothness: GLOSSY_SMOOTHNESS,
            specular: SpecularChance::Fixed(GLOSSY_SPECULAR_CHANCE),
        }
    }

    pub fn fresnel_glossy(albedo: Color) -> Self {
        Material::Glossy {
            albedo,
            smoothness: FRESNEL_GLOSSY_SMOOTHNESS,
            specular: SpecularChance::Fresnel,
        }
    }

    pub fn textured(texture: Arc<Texture<PackedTexel>>) -> Self {
        Material::Textured {
            texture,
            policy: SamplePolicy::default(),
            specular: SpecularChance::Fixed(0.0),
        }
    }

    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Diffuse { .. } => MaterialKind::Diffuse,
            Material::Metallic => MaterialKind::Metallic,
            Material::Dielectric { .. } => MaterialKind::Dielectric,
            Material::Glossy { .. } => MaterialKind::Glossy,
            Material::Textured { .. } => MaterialKind::Textured,
        }
    }

    /// Representative colour, used when switching variants.
    pub fn base_color(&self) -> Color {
        match self {
            Material::Diffuse { albedo, .. } | Material::Glossy { albedo, .. } => *albedo,
            Material::Textured { texture, .. } => {
                let sum: Color = texture.texels.iter().map(|t| t.albedo).sum();
                sum / texture.texels.len().max(1) as f32
            }
            Material::Metallic | Material::Dielectric { .. } => Color::splat(0.8),
        }
    }

    /// The same surface re-expressed as another variant with default
    /// parameters. Returns a clone when `kind` already matches.
    pub fn retarget(&self, kind: MaterialKind) -> Material {
        if self.kind() == kind {
            return self.clone();
        }
        let base = self.base_color();
        match kind {
            MaterialKind::Diffuse => Material::diffuse(base),
            MaterialKind::Metallic => Material::Metallic,
            MaterialKind::Dielectric => Material::dielectric(DEFAULT_IOR, Color::ZERO),
            MaterialKind::Glossy => Material::glossy(base),
            MaterialKind::Textured => Material::textured(Arc::new(Texture::solid(PackedTexel {
                albedo: base,
                ..Default::default()
            }))),
        }
    }

    /// Diffuse reflectance at the hit, multiplied into direct lighting.
    /// Pure specular variants have none.
    pub fn albedo(&self, hit: &Intersection) -> Color {
        match self {
            Material::Diffuse { albedo, .. } | Material::Glossy { albedo, .. } => *albedo,
            Material::Textured { texture, policy, .. } => {
                let texel = texture.sample(hit.uv, *policy);
                if texel.alpha < ALPHA_CUTOFF {
                    Color::ZERO
                } else {
                    texel.albedo
                }
            }
            Material::Metallic | Material::Dielectric { .. } => Color::ZERO,
        }
    }

    /// Whether the hit falls in a transparent hole of a textured surface.
    /// Such hits neither shade nor count as the primary surface.
    pub fn is_cutout(&self, hit: &Intersection) -> bool {
        match self {
            Material::Textured { texture, policy, .. } => texture.sample(hit.uv, *policy).alpha < ALPHA_CUTOFF,
            _ => false,
        }
    }

    pub fn emission(&self) -> Color {
        match self {
            Material::Diffuse { emission, .. } => *emission,
            _ => Color::ZERO,
        }
    }

    /// Scatter `ray` at `hit`. Every scattered origin is pushed off the
    /// surface by `ctx.epsilon`.
    pub fn scatter(
        &self,
        ray: &Ray,
        hit: &Intersection,
        ctx: &EvalContext,
        sampler: &mut Sampler,
    ) -> Option<ScatterResult> {
        let n = hit.normal;
        let eps = ctx.epsilon;

        match self {
            Material::Diffuse { albedo, .. } => {
                let dir = sampler.cosine_direction(n);
                Some(ScatterResult {
                    ray: Ray::new(hit.point + dir * eps, dir).with_inside(ray.inside),
                    attenuation: *albedo,
                })
            }

            Material::Metallic => {
                let dir = reflect(ray.direction, n);
                Some(ScatterResult {
                    ray: Ray::new(hit.point + dir * eps, dir).with_inside(ray.inside),
                    attenuation: Color::ONE,
                })
            }

            Material::Dielectric { absorption, ior } => {
                let (eta, attenuation) = if ray.inside {
                    (*ior, beer_lambert(*absorption, hit.distance))
                } else {
                    (1.0 / *ior, Color::ONE)
                };

                let cos_theta = (-ray.direction).dot(n).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

                let ray = if eta * sin_theta > 1.0 || schlick(cos_theta, eta) > sampler.next_f32() {
                    Ray::new(hit.point + n * eps, reflect(ray.direction, n)).with_inside(ray.inside)
                } else {
                    let dir = refract(ray.direction, n, cos_theta, eta);
                    Ray::new(hit.point - n * eps, dir).with_inside(!ray.inside)
                };
                Some(ScatterResult { ray, attenuation })
            }

            Material::Glossy {
                albedo,
                smoothness,
                specular,
            } => Some(glossy_bounce(ray, hit, *albedo, *smoothness, *specular, eps, sampler)),

            Material::Textured {
                texture,
                policy,
                specular,
            } => {
                let texel = texture.sample(hit.uv, *policy);
                if texel.alpha < ALPHA_CUTOFF {
                    // Cut-out: continue straight through the surface
                    return Some(ScatterResult {
                        ray: Ray::new(hit.point + ray.direction * eps, ray.direction)
                            .with_inside(ray.inside),
                        attenuation: Color::ONE,
                    });
                }
                let smoothness = 1.0 - texel.roughness.clamp(0.0, 1.0);
                Some(glossy_bounce(ray, hit, texel.albedo, smoothness, *specular, eps, sampler))
            }
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::diffuse(Color::splat(0.8))
    }
}

fn glossy_bounce(
    ray: &Ray,
    hit: &Intersection,
    albedo: Color,
    smoothness: f32,
    specular: SpecularChance,
    eps: f32,
    sampler: &mut Sampler,
) -> ScatterResult {
    let n = hit.normal;
    let cos_theta = (-ray.direction).dot(n).min(1.0);
    let diffuse = sampler.cosine_direction(n);
    let mirror = reflect(ray.direction, n);
    let is_specular = specular.probability(cos_theta) > sampler.next_f32();

    let dir = if is_specular {
        normalize_or(diffuse.lerp(mirror, smoothness), mirror)
    } else {
        diffuse
    };

    ScatterResult {
        ray: Ray::new(hit.point + dir * eps, dir).with_inside(ray.inside),
        attenuation: if is_specular { Color::ONE } else { albedo },
    }
}

/// Schlick's approximation of Fresnel reflectance for relative index `ior`.
#[inline]
pub fn schlick(cos_theta: f32, ior: f32) -> f32 {
    let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cos_theta).powi(5)
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract unit direction `d` through a surface with normal `n` facing
/// against it, where `eta` is the ratio of indices.
#[inline]
pub fn refract(d: Vec3, n: Vec3, cos_theta: f32, eta: f32) -> Vec3 {
    let r_perp = eta * (d + cos_theta * n);
    let r_para = -(1.0 - r_perp.length_squared()).abs().sqrt() * n;
    normalize_or(r_perp + r_para, -n)
}

/// Transmittance through `distance` of a medium with per-channel absorption.
#[inline]
pub fn beer_lambert(absorption: Color, distance: f32) -> Color {
    Color::new(
        (-absorption.x * distance).exp(),
        (-absorption.y * distance).exp(),
        (-absorption.z * distance).exp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_support, EvalContext, SampleSeed};

    fn sampler(i: u32) -> Sampler<'static> {
        Sampler::new(SampleSeed::new(i, i * 3, 0, 0), None)
    }

    #[test]
    fn test_diffuse_attenuation_is_albedo() {
        let albedo = Color::new(0.9, 0.5, 0.1);
        let material = Material::diffuse(albedo);
        let scene = test_support::floor_scene(material.clone());
        let ctx = EvalContext::default();

        for (i, dir) in [Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.7, -0.2, 0.1), Vec3::new(-0.3, -0.9, 0.4)]
            .into_iter()
            .enumerate()
        {
            let ray = Ray::new(Vec3::new(0.0, 2.0, 0.0), dir.normalize());
            let hit = scene.find_nearest(&ray).unwrap();
            let result = material.scatter(&ray, &hit, &ctx, &mut sampler(i as u32)).unwrap();
            assert_eq!(result.attenuation, albedo);
            assert!(result.ray.direction.dot(hit.normal) >= 0.0);
            // Origin lifted off the surface by epsilon along the new direction
            assert!((result.ray.origin - (hit.point + result.ray.direction * ctx.epsilon)).length() < 1e-6);
        }
    }

    #[test]
    fn test_metallic_mirrors() {
        let scene = test_support::floor_scene(Material::Metallic);
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0).normalize());
        let hit = scene.find_nearest(&ray).unwrap();
        let result = Material::Metallic
            .scatter(&ray, &hit, &EvalContext::default(), &mut sampler(1))
            .unwrap();

        assert_eq!(result.attenuation, Color::ONE);
        assert!((result.ray.direction - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn test_schlick_normal_incidence() {
        for ior in [1.33f32, 1.5, 2.4, 1.0 / 1.5] {
            let expected = ((1.0 - ior) / (1.0 + ior)).powi(2);
            assert_eq!(schlick(1.0, ior), expected);
        }
    }

    #[test]
    fn test_schlick_grazing() {
        assert!((schlick(0.0, 1.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_total_internal_reflection_always_reflects() {
        let glass = Material::dielectric(1.5, Color::ZERO);
        let scene = test_support::floor_scene(glass.clone());
        let ctx = EvalContext::default();

        // Inside the medium at 60 degrees: 1.5 * sin(60) > 1
        let dir = Vec3::new(60f32.to_radians().sin(), -60f32.to_radians().cos(), 0.0);
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 0.0), dir).with_inside(true);
        let hit = scene.find_nearest(&ray).unwrap();
        assert!(1.5 * (1.0 - dir.dot(hit.normal).powi(2)).sqrt() > 1.0);

        for i in 0..64 {
            let result = glass.scatter(&ray, &hit, &ctx, &mut sampler(i)).unwrap();
            assert!(result.ray.inside, "TIR must keep the ray inside");
            assert!(result.ray.direction.dot(hit.normal) > 0.0);
        }
    }

    #[test]
    fn test_dielectric_refraction_toggles_inside() {
        let glass = Material::dielectric(1.5, Color::ZERO);
        let scene = test_support::floor_scene(glass.clone());
        let ctx = EvalContext::default();

        // Straight down: reflectance 0.04, so most samples refract
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        let hit = scene.find_nearest(&ray).unwrap();
        let mut refracted = 0;
        for i in 0..100 {
            let result = glass.scatter(&ray, &hit, &ctx, &mut sampler(i)).unwrap();
            if result.ray.inside {
                refracted += 1;
                assert!((result.ray.direction + Vec3::Y).length() < 1e-5);
                assert!(result.ray.origin.y < 0.0);
            }
        }
        assert!(refracted > 80);
    }

    #[test]
    fn test_dielectric_absorbs_inside() {
        let absorption = Color::new(0.5, 0.0, 1.0);
        let glass = Material::dielectric(1.5, absorption);
        let scene = test_support::floor_scene(glass.clone());

        let ray = Ray::new(Vec3::new(0.0, 2.0, 0.0), -Vec3::Y).with_inside(true);
        let hit = scene.find_nearest(&ray).unwrap();
        let result = glass
            .scatter(&ray, &hit, &EvalContext::default(), &mut sampler(2))
            .unwrap();

        let expected = beer_lambert(absorption, 2.0);
        assert!((result.attenuation - expected).length() < 1e-5);
        assert_eq!(result.attenuation.y, 1.0);
    }

    #[test]
    fn test_glossy_lobes() {
        let albedo = Color::new(0.2, 0.4, 0.6);
        let material = Material::glossy(albedo);
        let scene = test_support::floor_scene(material.clone());
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        let hit = scene.find_nearest(&ray).unwrap();

        let (mut specular, mut diffuse) = (0, 0);
        for i in 0..200 {
            let r = material
                .scatter(&ray, &hit, &EvalContext::default(), &mut sampler(i))
                .unwrap();
            if r.attenuation == Color::ONE {
                specular += 1;
            } else {
                assert_eq!(r.attenuation, albedo);
                diffuse += 1;
            }
        }
        assert!(specular > 50 && diffuse > 50);
    }

    #[test]
    fn test_albedo_and_emission() {
        let scene = test_support::floor_scene(Material::default());
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        let hit = scene.find_nearest(&ray).unwrap();

        let lamp = Material::emissive(Color::ONE, Color::splat(4.0));
        assert_eq!(lamp.emission(), Color::splat(4.0));
        assert_eq!(lamp.albedo(&hit), Color::ONE);
        assert_eq!(Material::Metallic.albedo(&hit), Color::ZERO);
        assert_eq!(Material::Metallic.emission(), Color::ZERO);
    }

    #[test]
    fn test_textured_samples_albedo_and_cutout() {
        let texture = Arc::new(Texture::solid(PackedTexel {
            albedo: Color::new(1.0, 0.0, 0.0),
            ..Default::default()
        }));
        let material = Material::textured(texture);
        let scene = test_support::floor_scene(material.clone());
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        let hit = scene.find_nearest(&ray).unwrap();
        assert_eq!(material.albedo(&hit), Color::new(1.0, 0.0, 0.0));

        let hole = Material::textured(Arc::new(Texture::solid(PackedTexel {
            alpha: 0.0,
            ..Default::default()
        })));
        let r = hole
            .scatter(&ray, &hit, &EvalContext::default(), &mut sampler(0))
            .unwrap();
        assert_eq!(r.ray.direction, -Vec3::Y);
        assert_eq!(r.attenuation, Color::ONE);
        assert!(hole.is_cutout(&hit));
        assert_eq!(hole.albedo(&hit), Color::ZERO);
        assert!(!material.is_cutout(&hit));
    }

    #[test]
    fn test_retarget() {
        let red = Material::diffuse(Color::new(1.0, 0.0, 0.0));
        assert_eq!(red.retarget(MaterialKind::Metallic).kind(), MaterialKind::Metallic);

        let glossy = red.retarget(MaterialKind::Glossy);
        assert_eq!(glossy.base_color(), Color::new(1.0, 0.0, 0.0));

        let textured = red.retarget(MaterialKind::Textured);
        assert_eq!(textured.base_color(), Color::new(1.0, 0.0, 0.0));
    }
}
