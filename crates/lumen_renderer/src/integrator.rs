//! Iterative path integrator.
//!
//! Each bounce: intersect, add `throughput * (direct * albedo + emission)`,
//! scatter, multiply throughput by the scatter attenuation. A miss adds the
//! environment and ends the path. The bounce count is a hard cap.

use lumen_math::Vec3;

use crate::{Color, EvalContext, LightSet, Ray, RenderMode, RenderSettings, Sampler, Scene};

/// Length of the segment drawn for rays that leave the scene.
const MISS_SEGMENT_LENGTH: f32 = 100.0;

/// Where a camera path first hit the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimaryHit {
    pub point: Vec3,
    pub distance: f32,
}

/// Result of tracing one camera path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub radiance: Color,
    pub primary: Option<PrimaryHit>,
}

/// One recorded ray segment, for the debug viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugSegment {
    pub origin: Vec3,
    pub end: Vec3,
    /// Surface normal at `end`, `None` on a miss.
    pub normal: Option<Vec3>,
    /// Whether the segment ran through a dielectric.
    pub inside: bool,
}

/// Read-only view of everything a path needs, shared by all workers.
#[derive(Clone, Copy)]
pub struct Integrator<'a> {
    pub scene: &'a Scene,
    pub lights: &'a LightSet,
    pub ctx: EvalContext,
    pub mode: RenderMode,
    pub max_bounces: u32,
}

impl<'a> Integrator<'a> {
    /// Integrator for one frame with the given settings.
    pub fn new(scene: &'a Scene, lights: &'a LightSet, settings: &RenderSettings) -> Self {
        Self {
            scene,
            lights,
            ctx: settings.eval_context(),
            mode: settings.render_mode,
            max_bounces: settings.max_bounces,
        }
    }

    pub fn trace(&self, ray: Ray, sampler: &mut Sampler) -> PathSample {
        self.run(ray, sampler, None)
    }

    /// Like [`Integrator::trace`], also recording every segment.
    pub fn trace_debug(&self, ray: Ray, sampler: &mut Sampler, segments: &mut Vec<DebugSegment>) -> PathSample {
        self.run(ray.with_debug(true), sampler, Some(segments))
    }

    fn run(&self, mut ray: Ray, sampler: &mut Sampler, mut segments: Option<&mut Vec<DebugSegment>>) -> PathSample {
        let mut radiance = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut primary = None;

        for bounce in 0..self.max_bounces {
            // Bounce 0 continues the stream the camera ray was drawn from
            if bounce > 0 {
                sampler.begin_bounce(bounce);
            }

            let Some(hit) = self.scene.find_nearest(&ray) else {
                if let Some(segments) = segments.as_deref_mut() {
                    segments.push(DebugSegment {
                        origin: ray.origin,
                        end: ray.at(MISS_SEGMENT_LENGTH),
                        normal: None,
                        inside: ray.inside,
                    });
                }
                radiance += throughput * self.lights.miss_color(ray.direction, &self.ctx);
                break;
            };

            if let Some(segments) = segments.as_deref_mut() {
                segments.push(DebugSegment {
                    origin: ray.origin,
                    end: hit.point,
                    normal: Some(hit.normal),
                    inside: ray.inside,
                });
            }

            // Transparent texels: continue straight through without shading
            if hit.material.is_cutout(&hit) {
                ray = Ray::new(hit.point + ray.direction * self.ctx.epsilon, ray.direction)
                    .with_inside(ray.inside)
                    .with_debug(ray.debug);
                continue;
            }

            let albedo = hit.material.albedo(&hit);
            if primary.is_none() {
                primary = Some(PrimaryHit {
                    point: hit.point,
                    distance: hit.distance,
                });
                let preview = match self.mode {
                    RenderMode::Normals => Some((hit.normal + Vec3::ONE) * 0.5),
                    RenderMode::Depth => Some(Color::splat(0.1 * hit.distance)),
                    RenderMode::Albedo => Some(albedo),
                    RenderMode::Shaded => None,
                };
                if let Some(radiance) = preview {
                    return PathSample { radiance, primary };
                }
            }

            let emission = hit.material.emission();
            match hit.material.scatter(&ray, &hit, &self.ctx, sampler) {
                Some(scattered) => {
                    radiance += throughput * (self.lights.direct_light(&hit, &self.ctx) * albedo + emission);
                    throughput *= scattered.attenuation;
                    ray = scattered.ray.with_debug(ray.debug);
                }
                None => {
                    let direct = self.lights.direct_light_with_environment(&hit, &self.ctx, sampler);
                    radiance += throughput * (direct * albedo + emission);
                    break;
                }
            }
        }

        PathSample { radiance, primary }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_core::{PackedTexel, Texture};

    use super::*;
    use crate::{test_support, Light, Material, PointLight, SampleSeed};

    fn integrator<'a>(scene: &'a Scene, lights: &'a LightSet, mode: RenderMode, max_bounces: u32) -> Integrator<'a> {
        Integrator {
            scene,
            lights,
            ctx: EvalContext {
                point_lights: true,
                ..EvalContext::unlit()
            },
            mode,
            max_bounces,
        }
    }

    fn down_ray() -> Ray {
        Ray::new(test_support::FLOOR_OFFSET + Vec3::new(0.4, 3.0, -0.7), -Vec3::Y)
    }

    #[test]
    fn test_point_light_over_white_floor() {
        let scene = test_support::floor_scene(Material::diffuse(Color::ONE));
        let mut lights = LightSet::new();
        let hit_point = down_ray().at(3.0);
        lights.push(Light::Point(PointLight {
            position: hit_point + Vec3::Y * 2.0,
            color: Color::ONE,
            strength: 1.0,
        }));

        // One bounce: only the direct term at the primary hit
        let tracer = integrator(&scene, &lights, RenderMode::Shaded, 1);
        let mut sampler = Sampler::new(SampleSeed::new(0, 0, 0, 0), None);
        let sample = tracer.trace(down_ray(), &mut sampler);
        assert!((sample.radiance - Color::splat(0.25)).abs().max_element() < 1e-3);
        assert!((sample.primary.unwrap().distance - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_transparent_texels_are_not_shaded() {
        let hole = Texture::solid(PackedTexel {
            albedo: Color::ONE,
            alpha: 0.0,
            ..Default::default()
        });
        let scene = test_support::floor_scene(Material::textured(Arc::new(hole)));
        let mut lights = LightSet::new();
        lights.push(Light::Point(PointLight {
            position: down_ray().at(3.0) + Vec3::Y * 2.0,
            color: Color::ONE,
            strength: 1.0,
        }));

        for mode in [RenderMode::Shaded, RenderMode::Albedo, RenderMode::Normals, RenderMode::Depth] {
            let tracer = integrator(&scene, &lights, mode, 4);
            let mut sampler = Sampler::new(SampleSeed::new(0, 0, 0, 0), None);
            let sample = tracer.trace(down_ray(), &mut sampler);
            assert_eq!(sample.radiance, Color::ZERO, "{:?}", mode);
            assert!(sample.primary.is_none());
        }
    }

    #[test]
    fn test_new_from_settings() {
        let scene = Scene::new();
        let lights = LightSet::new();
        let settings = RenderSettings {
            render_mode: RenderMode::Depth,
            max_bounces: 3,
            epsilon: 0.01,
            ..RenderSettings::default()
        };
        let tracer = Integrator::new(&scene, &lights, &settings);
        assert_eq!(tracer.mode, RenderMode::Depth);
        assert_eq!(tracer.max_bounces, 3);
        assert_eq!(tracer.ctx.epsilon, 0.01);
    }

    #[test]
    fn test_no_lights_is_black() {
        let scene = test_support::floor_scene(Material::default());
        let lights = LightSet::new();
        let tracer = integrator(&scene, &lights, RenderMode::Shaded, 10);
        for i in 0..8 {
            let mut sampler = Sampler::new(SampleSeed::new(i, 0, 0, 0), None);
            assert_eq!(tracer.trace(down_ray(), &mut sampler).radiance, Color::ZERO);
        }
    }

    #[test]
    fn test_miss_returns_miss_color() {
        let scene = test_support::floor_scene(Material::default());
        let lights = LightSet::new();
        let mut tracer = integrator(&scene, &lights, RenderMode::Shaded, 4);
        tracer.ctx.miss_color = Color::new(0.2, 0.3, 0.4);

        let mut sampler = Sampler::new(SampleSeed::new(0, 0, 0, 0), None);
        let sample = tracer.trace(Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y), &mut sampler);
        assert_eq!(sample.radiance, Color::new(0.2, 0.3, 0.4));
        assert!(sample.primary.is_none());
    }

    #[test]
    fn test_emission_and_throughput() {
        let albedo = Color::new(0.5, 0.5, 0.5);
        let scene = test_support::floor_scene(Material::emissive(albedo, Color::splat(2.0)));
        let lights = LightSet::new();
        let mut tracer = integrator(&scene, &lights, RenderMode::Shaded, 1);
        tracer.ctx.miss_color = Color::ONE;

        // Bounce cap 1: emission only
        let mut sampler = Sampler::new(SampleSeed::new(0, 0, 0, 0), None);
        assert_eq!(tracer.trace(down_ray(), &mut sampler).radiance, Color::splat(2.0));

        // Bounce cap 2: emission plus albedo-weighted sky from the bounce off the floor
        tracer.max_bounces = 2;
        let mut sampler = Sampler::new(SampleSeed::new(0, 0, 0, 0), None);
        let radiance = tracer.trace(down_ray(), &mut sampler).radiance;
        assert!((radiance - Color::splat(2.5)).length() < 1e-5);
    }

    #[test]
    fn test_preview_modes() {
        let albedo = Color::new(0.1, 0.6, 0.3);
        let scene = test_support::floor_scene(Material::diffuse(albedo));
        let lights = LightSet::new();
        let mut sampler = Sampler::new(SampleSeed::new(0, 0, 0, 0), None);

        let normals = integrator(&scene, &lights, RenderMode::Normals, 10).trace(down_ray(), &mut sampler);
        assert!((normals.radiance - Color::new(0.5, 1.0, 0.5)).length() < 1e-5);

        let depth = integrator(&scene, &lights, RenderMode::Depth, 10).trace(down_ray(), &mut sampler);
        assert!((depth.radiance - Color::splat(0.3)).length() < 1e-5);

        let flat = integrator(&scene, &lights, RenderMode::Albedo, 10).trace(down_ray(), &mut sampler);
        assert_eq!(flat.radiance, albedo);
    }

    #[test]
    fn test_deterministic_for_equal_seeds() {
        let scene = test_support::floor_scene(Material::glossy(Color::new(0.7, 0.2, 0.9)));
        let mut lights = LightSet::new();
        lights.push(Light::Point(PointLight {
            position: Vec3::new(1.0, 3.0, 1.0),
            color: Color::ONE,
            strength: 4.0,
        }));
        let mut tracer = integrator(&scene, &lights, RenderMode::Shaded, 10);
        tracer.ctx.miss_color = Color::new(0.3, 0.5, 0.8);

        let seed = SampleSeed::new(17, 42, 9, 0);
        let ray = Ray::new(Vec3::new(-2.0, 2.0, 3.0), Vec3::new(0.4, -0.6, -0.5).normalize());
        let a = tracer.trace(ray, &mut Sampler::new(seed, None));
        let b = tracer.trace(ray, &mut Sampler::new(seed, None));
        assert_eq!(a.radiance.to_array(), b.radiance.to_array());
    }

    #[test]
    fn test_debug_segments() {
        let scene = test_support::floor_scene(Material::Metallic);
        let lights = LightSet::new();
        let tracer = integrator(&scene, &lights, RenderMode::Shaded, 5);
        let mut segments = Vec::new();
        let mut sampler = Sampler::new(SampleSeed::new(0, 0, 0, 0), None);
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0).normalize());
        tracer.trace_debug(ray, &mut sampler, &mut segments);

        // Mirror bounce, then escape
        assert_eq!(segments.len(), 2);
        assert!(segments[0].normal.is_some());
        assert!(segments[1].normal.is_none());
        assert!((segments[0].end - segments[1].origin).length() < 1e-2);
    }
}
