//! Host-facing settings record and the evaluation context derived from it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Color;

/// Settings load/save errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings JSON")]
    Json(#[from] serde_json::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// What the integrator writes into each pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Primary hit normal mapped to `(n + 1) / 2`.
    Normals,
    /// Primary hit distance scaled by 0.1.
    Depth,
    /// Primary hit albedo.
    Albedo,
    #[default]
    Shaded,
}

/// How consecutive frames are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergeMode {
    /// Show each frame's fresh sample.
    None,
    /// Running average since the last reset.
    #[default]
    Accumulate,
    /// Blend with the previous frame through its frustum.
    Reproject,
}

/// Flat settings record edited by the host between frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub render_mode: RenderMode,
    pub converge_mode: ConvergeMode,
    pub max_bounces: u32,

    pub anti_aliasing: bool,
    pub depth_of_field: bool,
    pub auto_focus: bool,
    pub blue_noise: bool,

    pub point_lights: bool,
    pub directional_lights: bool,
    pub spot_lights: bool,
    pub textured_spot_lights: bool,
    pub quad_light: bool,
    pub skydome: bool,

    pub debug_viewer: bool,

    /// Surface offset applied to every scattered and shadow ray.
    pub epsilon: f32,
    /// Blend weight of reprojected history.
    pub history_weight: f32,
    /// Squared distance under which a reprojected hit counts as the same point.
    pub reprojection_tolerance: f32,
    /// Radiance of rays that escape the scene when the skydome is off.
    pub miss_color: Color,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Shaded,
            converge_mode: ConvergeMode::Accumulate,
            max_bounces: 10,
            anti_aliasing: true,
            depth_of_field: true,
            auto_focus: true,
            blue_noise: true,
            point_lights: false,
            directional_lights: false,
            spot_lights: false,
            textured_spot_lights: false,
            quad_light: true,
            skydome: true,
            debug_viewer: false,
            epsilon: 1e-3,
            history_weight: 0.8,
            reprojection_tolerance: 1e-3,
            miss_color: Color::ZERO,
        }
    }
}

impl RenderSettings {
    pub fn from_json(json: &str) -> SettingsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SettingsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded render settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SettingsResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether switching from `self` to `other` invalidates converged pixels.
    ///
    /// Only the debug viewer toggle is purely cosmetic.
    pub fn invalidates(&self, other: &RenderSettings) -> bool {
        let mut a = self.clone();
        a.debug_viewer = other.debug_viewer;
        a != *other
    }

    pub fn eval_context(&self) -> EvalContext {
        EvalContext {
            epsilon: self.epsilon,
            miss_color: self.miss_color,
            point_lights: self.point_lights,
            directional_lights: self.directional_lights,
            spot_lights: self.spot_lights,
            textured_spot_lights: self.textured_spot_lights,
            quad_light: self.quad_light,
            skydome: self.skydome,
        }
    }
}

/// Per-frame constants passed into materials, lights and the integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalContext {
    pub epsilon: f32,
    pub miss_color: Color,
    pub point_lights: bool,
    pub directional_lights: bool,
    pub spot_lights: bool,
    pub textured_spot_lights: bool,
    pub quad_light: bool,
    pub skydome: bool,
}

impl EvalContext {
    /// Context with every light type disabled.
    pub fn unlit() -> Self {
        Self {
            point_lights: false,
            directional_lights: false,
            spot_lights: false,
            textured_spot_lights: false,
            quad_light: false,
            skydome: false,
            ..Self::default()
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        RenderSettings::default().eval_context()
    }
}
