//! Texture loading, caching and sampling.
//!
//! Textures are stored bottom-up (row 0 is the bottom of the image) so that
//! `v = 0` samples the bottom edge. Sampling behaviour is picked per call
//! with a [`SamplePolicy`] (nearest/linear filtering combined with unchecked,
//! looped or clamped addressing).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use lumen_math::{normalize_or, Vec2, Vec3, Vec4};
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("texture not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("texture size mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// Addressing mode for coordinates outside `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    /// No wrapping. Out-of-range reads return the default texel.
    Unchecked,
    #[default]
    Looped,
    Clamped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplePolicy {
    pub wrap: WrapMode,
    pub filter: FilterMode,
}

impl SamplePolicy {
    pub const fn new(wrap: WrapMode, filter: FilterMode) -> Self {
        Self { wrap, filter }
    }
}

/// How 8-bit source values are interpreted on load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// Colour data, decoded to linear.
    Srgb,
    /// Raw data such as normal maps, roughness or noise.
    Linear,
}

/// A value that can live in a texture and be blended by bilinear filtering.
pub trait Texel: Copy + Default + Send + Sync + 'static {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Texel for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Texel for Vec3 {
    fn lerp(self, other: Self, t: f32) -> Self {
        Vec3::lerp(self, other, t)
    }
}

impl Texel for Vec4 {
    fn lerp(self, other: Self, t: f32) -> Self {
        Vec4::lerp(self, other, t)
    }
}

/// Material channels packed into a single texel so one lookup serves the
/// whole surface description.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackedTexel {
    pub albedo: Vec3,
    /// Tangent-space normal in `[-1, 1]`.
    pub normal: Vec3,
    pub roughness: f32,
    pub alpha: f32,
}

impl Default for PackedTexel {
    fn default() -> Self {
        Self {
            albedo: Vec3::ZERO,
            normal: Vec3::Z,
            roughness: 1.0,
            alpha: 1.0,
        }
    }
}

impl Texel for PackedTexel {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            albedo: self.albedo.lerp(other.albedo, t),
            normal: self.normal.lerp(other.normal, t),
            roughness: self.roughness + (other.roughness - self.roughness) * t,
            alpha: self.alpha + (other.alpha - self.alpha) * t,
        }
    }
}

/// A 2-D grid of texels.
#[derive(Clone, Debug)]
pub struct Texture<T> {
    pub width: u32,
    pub height: u32,
    /// Row-major, bottom row first.
    pub texels: Vec<T>,
    /// Source path (for debugging)
    pub path: String,
}

impl<T: Texel> Texture<T> {
    pub fn new(width: u32, height: u32, texels: Vec<T>, path: impl Into<String>) -> Self {
        debug_assert_eq!(texels.len(), (width * height) as usize);
        Self {
            width,
            height,
            texels,
            path: path.into(),
        }
    }

    /// 1x1 texture holding a single value.
    pub fn solid(value: T) -> Self {
        Self::new(1, 1, vec![value], "<solid>")
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Texel at integer coordinates, or the default texel when out of range.
    #[inline]
    pub fn texel(&self, x: i64, y: i64) -> T {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return T::default();
        }
        self.texels
            .get((y * self.width as i64 + x) as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Sample at `uv` with the given filtering and addressing.
    pub fn sample(&self, uv: Vec2, policy: SamplePolicy) -> T {
        let (w, h) = (self.width as f32, self.height as f32);
        match policy.filter {
            FilterMode::Nearest => {
                let x = (uv.x * w).floor() as i64;
                let y = (uv.y * h).floor() as i64;
                self.fetch(x, y, policy.wrap)
            }
            FilterMode::Linear => {
                let x = uv.x * w - 0.5;
                let y = uv.y * h - 0.5;
                let (x0, y0) = (x.floor(), y.floor());
                let (fx, fy) = (x - x0, y - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);

                let bottom = self
                    .fetch(x0, y0, policy.wrap)
                    .lerp(self.fetch(x0 + 1, y0, policy.wrap), fx);
                let top = self
                    .fetch(x0, y0 + 1, policy.wrap)
                    .lerp(self.fetch(x0 + 1, y0 + 1, policy.wrap), fx);
                bottom.lerp(top, fy)
            }
        }
    }

    #[inline]
    fn fetch(&self, x: i64, y: i64, wrap: WrapMode) -> T {
        let (w, h) = (self.width as i64, self.height as i64);
        match wrap {
            WrapMode::Unchecked => self.texel(x, y),
            WrapMode::Looped => self.texel(x.rem_euclid(w.max(1)), y.rem_euclid(h.max(1))),
            WrapMode::Clamped => self.texel(x.clamp(0, w - 1), y.clamp(0, h - 1)),
        }
    }

    /// Build a new texture of the same size by converting every texel.
    pub fn map<U: Texel>(&self, f: impl Fn(T) -> U) -> Texture<U> {
        Texture {
            width: self.width,
            height: self.height,
            texels: self.texels.iter().map(|&t| f(t)).collect(),
            path: self.path.clone(),
        }
    }

    /// Approximate size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.texels.len() * std::mem::size_of::<T>()
    }
}

impl Texture<Vec4> {
    /// Load an image file as linear RGBA floats.
    ///
    /// Float formats (HDR, EXR) are kept as-is; 8-bit sources are decoded
    /// according to `color_space`. The image is flipped so `v` points up.
    pub fn load(path: impl AsRef<Path>, color_space: ColorSpace) -> TextureResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TextureError::NotFound(path.to_path_buf()));
        }

        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let texture = Self::from_image(img.flipv(), color_space, path.to_string_lossy());

        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            path.display(),
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );
        Ok(texture)
    }

    /// Convert an already decoded image. No flip is applied here.
    pub fn from_image(img: DynamicImage, color_space: ColorSpace, path: impl Into<String>) -> Self {
        let is_float = matches!(img, DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_));
        let (width, height) = (img.width(), img.height());

        let texels = if is_float || color_space == ColorSpace::Linear {
            img.to_rgba32f()
                .pixels()
                .map(|p| Vec4::from_array(p.0))
                .collect()
        } else {
            img.to_rgba8()
                .pixels()
                .map(|p| {
                    Vec4::new(
                        srgb_to_linear(p[0]),
                        srgb_to_linear(p[1]),
                        srgb_to_linear(p[2]),
                        p[3] as f32 / 255.0,
                    )
                })
                .collect()
        };

        Self::new(width, height, texels, path)
    }
}

/// Pack albedo (+alpha), an optional normal map and an optional roughness map
/// into one texture. Maps must share the albedo's dimensions.
pub fn pack_material(
    albedo: &Texture<Vec4>,
    normal: Option<&Texture<Vec4>>,
    roughness: Option<&Texture<Vec4>>,
) -> TextureResult<Texture<PackedTexel>> {
    for map in [normal, roughness].into_iter().flatten() {
        if (map.width, map.height) != (albedo.width, albedo.height) {
            return Err(TextureError::DimensionMismatch {
                expected: (albedo.width, albedo.height),
                actual: (map.width, map.height),
            });
        }
    }

    let texels = albedo
        .texels
        .iter()
        .enumerate()
        .map(|(i, a)| PackedTexel {
            albedo: a.truncate(),
            normal: normal
                .map(|n| normalize_or(n.texels[i].truncate() * 2.0 - Vec3::ONE, Vec3::Z))
                .unwrap_or(Vec3::Z),
            roughness: roughness.map(|r| r.texels[i].x).unwrap_or(1.0),
            alpha: a.w,
        })
        .collect();

    Ok(Texture::new(albedo.width, albedo.height, texels, albedo.path.clone()))
}

/// Cache for loaded textures, keyed by the path they were requested with.
pub struct TextureCache {
    textures: HashMap<PathBuf, Arc<Texture<Vec4>>>,

    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load a texture from file, using the cache if available.
    pub fn load(&mut self, path: impl AsRef<Path>, color_space: ColorSpace) -> TextureResult<Arc<Texture<Vec4>>> {
        let path = path.as_ref();
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let texture = Arc::new(Texture::<Vec4>::load(self.resolve_path(path), color_space)?);
        self.textures.insert(path.to_path_buf(), texture.clone());
        Ok(texture)
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Arc<Texture<Vec4>>> {
        self.textures.get(path.as_ref()).cloned()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }

    pub fn total_size_bytes(&self) -> usize {
        self.textures.values().map(|t| t.size_bytes()).sum()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert an sRGB byte value to linear float.
pub fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 texture: bottom row 0, 1; top row 2, 3.
    fn ramp() -> Texture<f32> {
        Texture::new(2, 2, vec![0.0, 1.0, 2.0, 3.0], "<ramp>")
    }

    const NEAREST_LOOPED: SamplePolicy = SamplePolicy::new(WrapMode::Looped, FilterMode::Nearest);
    const NEAREST_CLAMPED: SamplePolicy = SamplePolicy::new(WrapMode::Clamped, FilterMode::Nearest);
    const LINEAR_CLAMPED: SamplePolicy = SamplePolicy::new(WrapMode::Clamped, FilterMode::Linear);

    #[test]
    fn test_solid_texture() {
        let tex = Texture::solid(Vec3::new(1.0, 0.5, 0.0));
        let s = tex.sample(Vec2::new(0.3, 0.9), SamplePolicy::default());
        assert!((s - Vec3::new(1.0, 0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_nearest_sampling() {
        let tex = ramp();
        assert_eq!(tex.sample(Vec2::new(0.25, 0.25), NEAREST_LOOPED), 0.0);
        assert_eq!(tex.sample(Vec2::new(0.75, 0.25), NEAREST_LOOPED), 1.0);
        assert_eq!(tex.sample(Vec2::new(0.25, 0.75), NEAREST_LOOPED), 2.0);
        assert_eq!(tex.sample(Vec2::new(0.75, 0.75), NEAREST_LOOPED), 3.0);
    }

    #[test]
    fn test_wrap_modes() {
        let tex = ramp();
        // One full period to the right lands on the same texel
        assert_eq!(tex.sample(Vec2::new(1.25, 0.25), NEAREST_LOOPED), 0.0);
        // Clamped sticks to the edge
        assert_eq!(tex.sample(Vec2::new(1.25, 0.25), NEAREST_CLAMPED), 1.0);
        // Unchecked falls off the texture
        let unchecked = SamplePolicy::new(WrapMode::Unchecked, FilterMode::Nearest);
        assert_eq!(tex.sample(Vec2::new(1.25, 0.25), unchecked), 0.0);
        assert_eq!(tex.sample(Vec2::new(0.75, 0.75), unchecked), 3.0);
    }

    #[test]
    fn test_linear_sampling() {
        let tex = ramp();
        // Dead centre averages all four texels
        let c = tex.sample(Vec2::splat(0.5), LINEAR_CLAMPED);
        assert!((c - 1.5).abs() < 1e-6);
        // Texel centres reproduce the texel exactly
        let t = tex.sample(Vec2::new(0.75, 0.25), LINEAR_CLAMPED);
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pack_material_defaults() {
        let albedo = Texture::solid(Vec4::new(0.2, 0.4, 0.6, 0.5));
        let packed = pack_material(&albedo, None, None).unwrap();
        let t = packed.texels[0];
        assert_eq!(t.albedo, Vec3::new(0.2, 0.4, 0.6));
        assert_eq!(t.alpha, 0.5);
        assert_eq!(t.normal, Vec3::Z);
        assert_eq!(t.roughness, 1.0);
    }

    #[test]
    fn test_pack_material_size_mismatch() {
        let albedo = Texture::solid(Vec4::ONE);
        let normal = Texture::new(2, 1, vec![Vec4::ONE; 2], "<n>");
        assert!(matches!(
            pack_material(&albedo, Some(&normal), None),
            Err(TextureError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Texture::<Vec4>::load("/definitely/not/here.png", ColorSpace::Srgb).unwrap_err();
        assert!(matches!(err, TextureError::NotFound(_)));
        assert!(err.to_string().contains("not/here.png"));
    }

    #[test]
    fn test_load_flips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_rows.png");

        // Image row 0 (top) is white, row 1 (bottom) is black
        let mut img = image::RgbaImage::new(1, 2);
        img.put_pixel(0, 0, image::Rgba([255, 255, 255, 255]));
        img.put_pixel(0, 1, image::Rgba([0, 0, 0, 255]));
        img.save(&path).unwrap();

        let tex = Texture::<Vec4>::load(&path, ColorSpace::Srgb).unwrap();
        assert_eq!(tex.texels[0].x, 0.0);
        assert!((tex.texels[1].x - 1.0).abs() < 1e-6);

        let mut cache = TextureCache::with_base_dir(dir.path());
        cache.load("two_rows.png", ColorSpace::Linear).unwrap();
        cache.load("two_rows.png", ColorSpace::Linear).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_srgb_to_linear() {
        assert!((srgb_to_linear(0) - 0.0).abs() < 0.001);
        assert!((srgb_to_linear(255) - 1.0).abs() < 0.001);

        let mid = srgb_to_linear(128);
        assert!(mid < 0.5);
        assert!(mid > 0.1);
    }
}
