//! Camera path files and Catmull-Rom playback.
//!
//! A path file is plain text with one waypoint per line: six comma-separated
//! floats, `position.x,position.y,position.z,target.x,target.y,target.z`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use lumen_math::Vec3;
use thiserror::Error;

/// Default playback rate in path segments per millisecond of `dt`.
pub const DEFAULT_SPEED: f32 = 0.002;

#[derive(Error, Debug)]
pub enum SplineError {
    #[error("failed to read camera path {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write camera path {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected 6 comma-separated floats, got {content:?}")]
    Malformed { line: usize, content: String },
}

pub type SplineResult<T> = Result<T, SplineError>;

/// One camera key: where the eye is and what it looks at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub position: Vec3,
    pub target: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraPath {
    pub nodes: Vec<Waypoint>,
}

impl CameraPath {
    pub fn load(path: impl AsRef<Path>) -> SplineResult<Self> {
        let path = path.as_ref();
        log::info!("Loading camera path: {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| SplineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse path text. Blank lines are ignored.
    pub fn parse(text: &str) -> SplineResult<Self> {
        let mut nodes = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let malformed = || SplineError::Malformed {
                line: i + 1,
                content: line.to_string(),
            };
            let values = line
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| malformed())?;
            let [px, py, pz, tx, ty, tz] = values[..] else {
                return Err(malformed());
            };

            nodes.push(Waypoint {
                position: Vec3::new(px, py, pz),
                target: Vec3::new(tx, ty, tz),
            });
        }
        Ok(Self { nodes })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SplineResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_text()).map_err(|source| SplineError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Saved camera path ({} nodes): {}", self.nodes.len(), path.display());
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for n in &self.nodes {
            let (p, t) = (n.position, n.target);
            let _ = writeln!(out, "{},{},{},{},{},{}", p.x, p.y, p.z, t.x, t.y, t.z);
        }
        out
    }

    pub fn push(&mut self, waypoint: Waypoint) {
        self.nodes.push(waypoint);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Uniform Catmull-Rom interpolation between `b` (t=0) and `c` (t=1).
pub fn catmull_rom(a: Vec3, b: Vec3, c: Vec3, d: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((-t3 + 2.0 * t2 - t) * a
        + (3.0 * t3 - 5.0 * t2 + 2.0) * b
        + (-3.0 * t3 + 4.0 * t2 + t) * c
        + (t3 - t2) * d)
}

/// Plays a camera path back segment by segment.
///
/// Playback starts on the segment from node 1 to node 2 (node 0 only shapes
/// the first tangent) and ends once the segment index reaches `len - 2`.
#[derive(Clone, Debug)]
pub struct SplineAnimator {
    path: CameraPath,
    node: usize,
    time: f32,
    pub speed: f32,
    current: Option<Waypoint>,
}

impl SplineAnimator {
    pub fn new(path: CameraPath) -> Self {
        let mut animator = Self {
            path,
            node: 1,
            time: 0.0,
            speed: DEFAULT_SPEED,
            current: None,
        };
        animator.reset();
        animator
    }

    pub fn reset(&mut self) {
        self.time = 0.0;
        self.node = 1;
        self.current = self.path.nodes.get(self.node).copied();
    }

    /// Interpolated waypoint from the last `play` call.
    pub fn current(&self) -> Option<Waypoint> {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.path.len() < 4 || self.node + 2 > self.path.len()
    }

    /// Advance by `dt` and return the new camera key, or `None` once the
    /// path has been played to the end (or is too short to play).
    pub fn play(&mut self, dt: f32) -> Option<Waypoint> {
        if self.is_finished() {
            return None;
        }
        let n = &self.path.nodes;

        self.time += dt * self.speed;
        while self.time >= 1.0 {
            self.time -= 1.0;
            self.node += 1;
            if self.node >= n.len() - 2 {
                self.node = n.len() - 1;
                self.current = n.last().copied();
                return None;
            }
        }

        let i = self.node;
        let inner = i.saturating_sub(1);
        let outer = (i + 2).min(n.len() - 1);
        let waypoint = Waypoint {
            position: catmull_rom(n[inner].position, n[i].position, n[i + 1].position, n[outer].position, self.time),
            target: catmull_rom(n[inner].target, n[i].target, n[i + 1].target, n[outer].target, self.time),
        };
        self.current = Some(waypoint);
        Some(waypoint)
    }
}
