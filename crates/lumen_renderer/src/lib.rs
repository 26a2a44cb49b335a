//! Lumen Renderer - interactive CPU path tracing
//!
//! One path per pixel per frame, converged over time either by running
//! averages or by reprojecting the previous frame through its frustum.
//!
//! The scene, lights and settings are only mutated between frames; during
//! [`Renderer::tick`] they are shared read-only across rayon workers.

mod bvh;
mod camera;
mod debug;
mod integrator;
mod light;
mod material;
mod ray;
mod renderer;
mod sampling;
mod scene;
mod settings;
mod temporal;

pub use bvh::BvhNode;
pub use camera::{Camera, DEFAULT_FOCUS_DISTANCE, DEFAULT_FOV, MAX_FOCUS_DISTANCE};
pub use debug::DebugViewer;
pub use integrator::{DebugSegment, Integrator, PathSample, PrimaryHit};
pub use light::{
    sphere_uv, DirectionalLight, Light, LightKind, LightSet, PointLight, QuadLight, Skydome, SpotLight,
    TexturedSpotlight,
};
pub use material::{schlick, Color, Material, MaterialKind, ScatterResult, SpecularChance, DEFAULT_IOR};
pub use ray::{Ray, FAR};
pub use renderer::{color_to_rgba, linear_to_gamma, ImageBuffer, PerfReport, Renderer};
pub use sampling::{BlueNoise, SampleSeed, Sampler};
pub use scene::{Hit, Instance, Intersection, Mesh, Scene};
pub use settings::{ConvergeMode, EvalContext, RenderMode, RenderSettings, SettingsError, SettingsResult};
pub use temporal::{reprojected_index, Resolver, TemporalState};

pub use lumen_math::Vec3;
