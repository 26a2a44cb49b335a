//! Temporal convergence: progressive accumulation or frustum reprojection.
//!
//! In accumulate mode the accumulator holds a running sum per pixel. In
//! reproject mode it holds this frame's resolved colour and `history` the
//! previous frame's; the two are swapped at the end of every frame.

use lumen_math::{normalize_or, UVec2, Vec3};

use crate::{Camera, Color, ConvergeMode, Ray, Scene};

pub struct TemporalState {
    mode: ConvergeMode,
    resolution: UVec2,
    accumulator: Vec<Color>,
    history: Vec<Color>,
    frames: u32,
    history_valid: bool,
}

impl TemporalState {
    pub fn new(resolution: UVec2, mode: ConvergeMode) -> Self {
        let len = (resolution.x * resolution.y) as usize;
        Self {
            mode,
            resolution,
            accumulator: vec![Color::ZERO; len],
            history: vec![Color::ZERO; len],
            frames: 0,
            history_valid: false,
        }
    }

    pub fn mode(&self) -> ConvergeMode {
        self.mode
    }

    /// Switch modes. Both buffers are cleared when the mode changes.
    pub fn set_mode(&mut self, mode: ConvergeMode) {
        if self.mode != mode {
            self.mode = mode;
            self.reset_accumulator();
            self.reset_history();
        }
    }

    pub fn resize(&mut self, resolution: UVec2) {
        *self = Self::new(resolution, self.mode);
    }

    pub fn reset_accumulator(&mut self) {
        self.accumulator.fill(Color::ZERO);
        self.frames = 0;
    }

    pub fn reset_history(&mut self) {
        self.history.fill(Color::ZERO);
        self.history_valid = false;
    }

    /// Frames resolved since the last accumulator reset.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn history_valid(&self) -> bool {
        self.history_valid
    }

    /// Split into the mutable per-pixel cells and a read-only resolver, so
    /// rows of cells can be handed to different workers.
    pub fn split(&mut self) -> (&mut [Color], Resolver<'_>) {
        let resolver = Resolver {
            mode: self.mode,
            history: &self.history,
            history_valid: self.history_valid,
            frames: self.frames,
        };
        (self.accumulator.as_mut_slice(), resolver)
    }

    /// Finish a frame: count it and, when reprojecting, make this frame's
    /// result next frame's history.
    pub fn end_frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
        if self.mode == ConvergeMode::Reproject {
            std::mem::swap(&mut self.accumulator, &mut self.history);
            self.history_valid = true;
        }
    }
}

/// Per-frame resolve parameters.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    mode: ConvergeMode,
    history: &'a [Color],
    history_valid: bool,
    frames: u32,
}

impl Resolver<'_> {
    pub fn mode(&self) -> ConvergeMode {
        self.mode
    }

    /// Fold a fresh sample into `cell` and return the displayed colour.
    /// `history_index` is the previous-frame pixel that saw the same surface,
    /// if any.
    pub fn resolve(&self, cell: &mut Color, fresh: Color, history_index: Option<usize>, weight: f32) -> Color {
        match self.mode {
            ConvergeMode::None => {
                *cell = fresh;
                fresh
            }
            ConvergeMode::Accumulate => {
                *cell += fresh;
                *cell / (self.frames + 1) as f32
            }
            ConvergeMode::Reproject => {
                let history = history_index
                    .filter(|_| self.history_valid)
                    .and_then(|i| self.history.get(i));
                let resolved = match history {
                    Some(&previous) => weight * previous + (1.0 - weight) * fresh,
                    None => fresh,
                };
                *cell = resolved;
                resolved
            }
        }
    }
}

/// Find the previous-frame pixel that saw `point`.
///
/// The point is mapped through the previous frustum, then re-intersected
/// from the previous eye position; history is only trusted when that ray
/// lands within `tolerance` (squared distance) of the point.
pub fn reprojected_index(
    camera: &Camera,
    scene: &Scene,
    point: Vec3,
    resolution: UVec2,
    tolerance: f32,
) -> Option<usize> {
    let uv = camera.reproject(point)?;
    let px = ((uv.x * resolution.x as f32) as u32).min(resolution.x.saturating_sub(1));
    let py = ((uv.y * resolution.y as f32) as u32).min(resolution.y.saturating_sub(1));

    let eye = camera.previous_position();
    let ray = Ray::new(eye, normalize_or(point - eye, camera.forward()));
    let hit = scene.intersect(&ray)?;
    let seen = ray.at(hit.distance);

    (seen.distance_squared(point) < tolerance).then_some((py * resolution.x + px) as usize)
}
