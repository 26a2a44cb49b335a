//! Overhead (x/z) debug view of the paths traced for one image row.

use lumen_math::{IVec2, Vec2, Vec3};

use crate::DebugSegment;

pub const DEFAULT_EVERY: u32 = 15;
pub const DEFAULT_ZOOM: f32 = 100.0;

type Rgba = [u8; 4];

const RED: Rgba = [255, 0, 0, 255];
const GREEN: Rgba = [0, 255, 0, 255];
const BLUE: Rgba = [0, 0, 255, 255];
const YELLOW: Rgba = [255, 255, 0, 255];
const WHITE: Rgba = [255, 255, 255, 255];
const CLEAR: Rgba = [0, 0, 0, 255];

fn dim(c: Rgba) -> Rgba {
    let scale = |v: u8| ((v as u32 * 100) >> 8) as u8;
    [scale(c[0]), scale(c[1]), scale(c[2]), c[3]]
}

pub struct DebugViewer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
    /// World x/z shown at the centre of the surface.
    pub position: Vec2,
    /// Pixels per world unit.
    pub zoom: f32,
    /// Image row whose paths are drawn.
    pub row: u32,
    every: u32,
    selected: u32,
}

impl DebugViewer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![CLEAR; (width * height) as usize],
            position: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
            row: height / 2,
            every: DEFAULT_EVERY,
            selected: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn every(&self) -> u32 {
        self.every
    }

    pub fn selected(&self) -> u32 {
        self.selected
    }

    /// Number of traced columns in the row.
    pub fn selection_count(&self) -> u32 {
        self.width / self.every
    }

    /// Trace every `every`-th pixel of the row.
    pub fn set_every(&mut self, every: u32) {
        self.every = every.max(1);
        self.selected = self.selected.min(self.selection_count());
    }

    pub fn select(&mut self, index: u32) {
        self.selected = index.min(self.selection_count());
    }

    /// Pixel columns to trace, each with whether it is the selected one.
    pub fn columns(&self) -> impl Iterator<Item = (u32, bool)> + '_ {
        (0..self.width)
            .step_by(self.every as usize)
            .enumerate()
            .map(move |(i, x)| (x, i as u32 == self.selected))
    }

    pub fn clear(&mut self) {
        self.pixels.fill(CLEAR);
    }

    /// Draw one recorded path. Bounces after the primary segment are only
    /// drawn for the selected path.
    pub fn draw_path(&mut self, segments: &[DebugSegment], selected: bool) {
        for (bounce, segment) in segments.iter().enumerate() {
            let (ray_color, normal_color, hit_color) = match (bounce == 0, selected) {
                (true, true) => (RED, BLUE, WHITE),
                (true, false) => (dim(RED), dim(BLUE), dim(WHITE)),
                (false, true) if segment.inside => (YELLOW, BLUE, WHITE),
                (false, true) => (GREEN, BLUE, WHITE),
                (false, false) => return,
            };

            let origin = self.to_pixel(segment.origin);
            let end = self.to_pixel(segment.end);
            self.line(origin, end, ray_color);

            if let Some(normal) = segment.normal {
                self.line(end, self.to_pixel(segment.end + normal), normal_color);
                self.bar(end - IVec2::ONE, end + IVec2::ONE, hit_color);
            }
        }
    }

    /// Mark the eye position.
    pub fn draw_eye(&mut self, position: Vec3) {
        let p = self.to_pixel(position);
        self.bar(p - IVec2::splat(2), p + IVec2::splat(2), WHITE);
    }

    pub fn to_pixel(&self, p: Vec3) -> IVec2 {
        let c = (Vec2::new(p.x, p.z) - self.position) * self.zoom;
        IVec2::new(c.x as i32, -c.y as i32) + IVec2::new(self.width as i32 / 2, self.height as i32 / 2)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        (x < self.width && y < self.height).then(|| self.pixels[(y * self.width + x) as usize])
    }

    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }

    fn plot(&mut self, x: i32, y: i32, color: Rgba) {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            self.pixels[(y as u32 * self.width + x as u32) as usize] = color;
        }
    }

    /// Bresenham line, clipped per pixel.
    fn line(&mut self, from: IVec2, to: IVec2, color: Rgba) {
        // Far miss segments can project to huge coordinates
        let limit = (self.width + self.height) as i32 * 4;
        let (from, to) = (from.clamp(IVec2::splat(-limit), IVec2::splat(limit)), to.clamp(IVec2::splat(-limit), IVec2::splat(limit)));

        let dx = (to.x - from.x).abs();
        let dy = -(to.y - from.y).abs();
        let sx = if from.x < to.x { 1 } else { -1 };
        let sy = if from.y < to.y { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (from.x, from.y);

        loop {
            self.plot(x, y, color);
            if x == to.x && y == to.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn bar(&mut self, min: IVec2, max: IVec2, color: Rgba) {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                self.plot(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_and_selection() {
        let mut viewer = DebugViewer::new(100, 50);
        assert_eq!(viewer.row, 25);
        let columns: Vec<_> = viewer.columns().collect();
        assert_eq!(columns.len(), 7);
        assert_eq!(columns[0], (0, true));
        assert_eq!(columns[1], (15, false));

        viewer.select(2);
        assert_eq!(viewer.columns().find(|c| c.1).map(|c| c.0), Some(30));

        viewer.select(1000);
        assert_eq!(viewer.selected(), viewer.selection_count());
        viewer.set_every(0);
        assert_eq!(viewer.every(), 1);
    }

    #[test]
    fn test_to_pixel() {
        let viewer = DebugViewer::new(200, 100);
        assert_eq!(viewer.to_pixel(Vec3::ZERO), IVec2::new(100, 50));
        // +z is drawn upward
        assert_eq!(viewer.to_pixel(Vec3::new(0.1, 5.0, 0.2)), IVec2::new(110, 30));
    }

    #[test]
    fn test_draw_path() {
        let mut viewer = DebugViewer::new(200, 100);
        let segments = [
            DebugSegment {
                origin: Vec3::new(-0.5, 0.0, 0.0),
                end: Vec3::ZERO,
                normal: Some(Vec3::Z * 0.1),
                inside: false,
            },
            DebugSegment {
                origin: Vec3::ZERO,
                end: Vec3::new(0.5, 0.0, 0.0),
                normal: None,
                inside: true,
            },
        ];

        viewer.draw_path(&segments, true);
        assert_eq!(viewer.pixel(60, 50), Some(RED));
        assert_eq!(viewer.pixel(100, 45), Some(BLUE));
        assert_eq!(viewer.pixel(101, 49), Some(WHITE));
        assert_eq!(viewer.pixel(140, 50), Some(YELLOW));

        viewer.clear();
        viewer.draw_path(&segments, false);
        assert_eq!(viewer.pixel(60, 50), Some(dim(RED)));
        assert_eq!(viewer.pixel(140, 50), Some(CLEAR));
        assert_eq!(viewer.to_rgba().len(), 200 * 100 * 4);
    }

    #[test]
    fn test_offscreen_line_is_clipped() {
        let mut viewer = DebugViewer::new(20, 20);
        viewer.line(IVec2::new(-1000, 10), IVec2::new(1000, 10), WHITE);
        assert!((0..20).all(|x| viewer.pixel(x, 10) == Some(WHITE)));
    }
}
