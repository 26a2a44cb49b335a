//! Frame driver: camera update, parallel pixel loop, temporal resolve.

use std::time::{Duration, Instant};

use lumen_core::SplineAnimator;
use lumen_math::{UVec2, Vec2};
use rayon::prelude::*;

use crate::temporal::reprojected_index;
use crate::{
    BlueNoise, Camera, Color, ConvergeMode, DebugSegment, DebugViewer, Integrator, LightSet, PathSample, Ray,
    RenderSettings, SampleSeed, Sampler, Scene, TemporalState,
};

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear colour to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let to_byte = |c: f32| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
}

/// Displayed frame in linear radiance.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width * height) as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Gamma-corrected RGBA bytes, row-major from the top.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|&c| color_to_rgba(c)).collect()
    }
}

/// Running average of frame time.
#[derive(Debug, Clone, Copy)]
pub struct PerfReport {
    /// Smoothed frame time in milliseconds.
    pub average_ms: f32,
    pub fps: f32,
    pub mrays_per_second: f32,
    alpha: f32,
}

impl Default for PerfReport {
    fn default() -> Self {
        Self {
            average_ms: 10.0,
            fps: 0.0,
            mrays_per_second: 0.0,
            alpha: 1.0,
        }
    }
}

impl PerfReport {
    /// Fold in one frame. The first frames weigh heavily, settling at 5%.
    pub fn record(&mut self, elapsed: Duration, rays: u32) {
        let ms = elapsed.as_secs_f32() * 1000.0;
        self.average_ms = (1.0 - self.alpha) * self.average_ms + self.alpha * ms;
        if self.alpha > 0.05 {
            self.alpha *= 0.5;
        }
        let average = self.average_ms.max(f32::EPSILON);
        self.fps = 1000.0 / average;
        self.mrays_per_second = rays as f32 / average / 1000.0;
    }
}

pub struct Renderer {
    resolution: UVec2,
    scene: Scene,
    lights: LightSet,
    camera: Camera,
    settings: RenderSettings,
    temporal: TemporalState,
    output: ImageBuffer,
    blue_noise: Option<BlueNoise>,
    animator: Option<SplineAnimator>,
    debug: DebugViewer,
    frame: u32,
    perf: PerfReport,
}

impl Renderer {
    /// Create a renderer for a scene. The scene's top-level structure is
    /// rebuilt here.
    pub fn new(width: u32, height: u32, mut scene: Scene, lights: LightSet) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let settings = RenderSettings::default();
        scene.rebuild();

        log::info!("Renderer {}x{}, {} instances", width, height, scene.instances().len());

        Self {
            resolution: UVec2::new(width, height),
            scene,
            lights,
            camera: Camera::new(width as f32 / height as f32),
            temporal: TemporalState::new(UVec2::new(width, height), settings.converge_mode),
            settings,
            output: ImageBuffer::new(width, height),
            blue_noise: None,
            animator: None,
            debug: DebugViewer::new(width, height),
            frame: 0,
            perf: PerfReport::default(),
        }
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.set_settings(settings);
        self
    }

    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        self.resolution = UVec2::new(width, height);
        self.camera.set_aspect(width as f32 / height as f32);
        self.temporal.resize(self.resolution);
        self.output = ImageBuffer::new(width, height);
        self.debug = DebugViewer::new(width, height);
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Replace the settings. Converged pixels are discarded when anything
    /// but the debug viewer toggle changes.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        if !self.settings.invalidates(&settings) {
            self.settings = settings;
            return;
        }
        self.temporal.set_mode(settings.converge_mode);
        self.settings = settings;
        self.reset_accumulator();
        self.reset_history();
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutate the scene between frames. The TLAS is rebuilt and converged
    /// pixels are discarded.
    pub fn edit_scene<R>(&mut self, edit: impl FnOnce(&mut Scene) -> R) -> R {
        let result = edit(&mut self.scene);
        self.scene.rebuild();
        self.reset_accumulator();
        self.reset_history();
        result
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn edit_lights<R>(&mut self, edit: impl FnOnce(&mut LightSet) -> R) -> R {
        let result = edit(&mut self.lights);
        self.reset_accumulator();
        self.reset_history();
        result
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera edits are picked up by the next [`Renderer::tick`].
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_blue_noise(&mut self, noise: Option<BlueNoise>) {
        self.blue_noise = noise;
        self.reset_accumulator();
    }

    /// Play a camera path; the animator drives the camera until it finishes.
    pub fn set_animator(&mut self, animator: Option<SplineAnimator>) {
        self.animator = animator;
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_some()
    }

    pub fn reset_accumulator(&mut self) {
        self.temporal.reset_accumulator();
    }

    pub fn reset_history(&mut self) {
        self.temporal.reset_history();
    }

    /// Frames folded into the current image since the last reset.
    pub fn samples(&self) -> u32 {
        self.temporal.frames()
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn output(&self) -> &ImageBuffer {
        &self.output
    }

    pub fn debug_viewer(&self) -> &DebugViewer {
        &self.debug
    }

    pub fn debug_viewer_mut(&mut self) -> &mut DebugViewer {
        &mut self.debug
    }

    pub fn perf(&self) -> &PerfReport {
        &self.perf
    }

    /// Render one frame. `dt` is the time since the previous tick in
    /// milliseconds and only advances camera path playback.
    pub fn tick(&mut self, dt: f32) {
        let start = Instant::now();

        self.advance_animation(dt);
        if self.settings.auto_focus {
            self.camera.auto_focus(&self.scene);
        }
        if self.camera.has_moved() && self.settings.converge_mode == ConvergeMode::Accumulate {
            self.temporal.reset_accumulator();
        }

        self.render_frame();
        if self.settings.debug_viewer {
            self.render_debug_view();
        }

        self.temporal.end_frame();
        self.camera.end_frame();
        self.frame = self.frame.wrapping_add(1);

        self.perf.record(start.elapsed(), self.resolution.x * self.resolution.y);
        log::debug!(
            "{:5.2}ms ({:.1}fps) - {:.1}Mrays/s, {} spp",
            self.perf.average_ms,
            self.perf.fps,
            self.perf.mrays_per_second,
            self.temporal.frames()
        );
    }

    fn advance_animation(&mut self, dt: f32) {
        let Some(animator) = &mut self.animator else {
            return;
        };
        let finished = match animator.play(dt) {
            Some(waypoint) => {
                self.camera.look_at(waypoint.position, waypoint.target);
                false
            }
            None => {
                if let Some(last) = animator.current() {
                    self.camera.look_at(last.position, last.target);
                }
                true
            }
        };
        if finished {
            log::info!("Camera path finished");
            self.animator = None;
        }
    }

    fn render_frame(&mut self) {
        let resolution = self.resolution;
        let row_len = resolution.x as usize;
        // Field borrows only, so `temporal` and `output` stay mutably borrowable
        let integrator = Integrator::new(&self.scene, &self.lights, &self.settings);
        let camera = &self.camera;
        let settings = &self.settings;
        let noise = self.blue_noise.as_ref().filter(|_| settings.blue_noise);
        let frame = self.frame;
        let (cells, resolver) = self.temporal.split();

        self.output
            .pixels
            .par_chunks_mut(row_len)
            .zip(cells.par_chunks_mut(row_len))
            .enumerate()
            .for_each(|(y, (out_row, cell_row))| {
                for (x, (out, cell)) in out_row.iter_mut().zip(cell_row.iter_mut()).enumerate() {
                    let mut sampler = Sampler::new(SampleSeed::new(x as u32, y as u32, frame, 0), noise);
                    let ray = primary_ray(camera, settings, resolution, x as u32, y as u32, &mut sampler);
                    let PathSample { radiance, primary } = integrator.trace(ray, &mut sampler);

                    let history = match (resolver.mode(), primary) {
                        (ConvergeMode::Reproject, Some(hit)) => reprojected_index(
                            camera,
                            integrator.scene,
                            hit.point,
                            resolution,
                            settings.reprojection_tolerance,
                        ),
                        _ => None,
                    };
                    *out = resolver.resolve(cell, radiance, history, settings.history_weight);
                }
            });
    }

    /// Re-trace the debug row with the same seeds and draw it overhead.
    fn render_debug_view(&mut self) {
        let row = self.debug.row.min(self.resolution.y - 1);
        let columns: Vec<(u32, bool)> = self.debug.columns().collect();
        let noise = self.blue_noise.as_ref().filter(|_| self.settings.blue_noise);

        let mut paths: Vec<(Vec<DebugSegment>, bool)> = Vec::with_capacity(columns.len());
        let integrator = Integrator::new(&self.scene, &self.lights, &self.settings);
        for (x, selected) in columns {
            let mut sampler = Sampler::new(SampleSeed::new(x, row, self.frame, 0), noise);
            let ray = primary_ray(&self.camera, &self.settings, self.resolution, x, row, &mut sampler);
            let mut segments = Vec::new();
            integrator.trace_debug(ray, &mut sampler, &mut segments);
            paths.push((segments, selected));
        }

        self.debug.clear();
        for (segments, selected) in &paths {
            self.debug.draw_path(segments, *selected);
        }
        self.debug.draw_eye(self.camera.position());
    }
}

/// Camera ray for pixel `(x, y)`, jittered inside the pixel when
/// anti-aliasing and offset on the lens when depth of field is enabled.
fn primary_ray(
    camera: &Camera,
    settings: &RenderSettings,
    resolution: UVec2,
    x: u32,
    y: u32,
    sampler: &mut Sampler,
) -> Ray {
    let jitter = if settings.anti_aliasing {
        Vec2::new(sampler.next_f32(), sampler.next_f32())
    } else {
        Vec2::splat(0.5)
    };
    let lens = if settings.depth_of_field {
        Some(sampler.in_unit_disk())
    } else {
        None
    };
    camera.primary_ray(Vec2::new(x as f32, y as f32) + jitter, resolution, lens)
}
