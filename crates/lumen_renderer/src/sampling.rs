//! Deterministic random sampling.
//!
//! Every sample stream is keyed by `(x, y, frame, bounce)`, so tracing the
//! same pixel of the same frame twice produces the same path. An optional
//! tiling blue-noise texture replaces white noise for the lens and bounce
//! samples; it is offset per frame by the golden ratio so successive frames
//! see different values.

use std::path::Path;

use lumen_core::{ColorSpace, Texture, TextureResult};
use lumen_math::{normalize_or, Vec2, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

const GOLDEN_RATIO_FRACT: f32 = 0.618_034;

/// Identifies one sample stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleSeed {
    pub x: u32,
    pub y: u32,
    pub frame: u32,
    pub bounce: u32,
}

impl SampleSeed {
    pub fn new(x: u32, y: u32, frame: u32, bounce: u32) -> Self {
        Self { x, y, frame, bounce }
    }

    /// 64-bit key mixing all four coordinates.
    pub fn hash(&self) -> u64 {
        let pixel = mix64(((self.x as u64) << 32) | self.y as u64);
        let time = mix64(((self.frame as u64) << 32) | self.bounce as u64);
        mix64(pixel ^ time.rotate_left(17))
    }
}

/// SplitMix64 finalizer.
#[inline]
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Tiling blue-noise texture; each RGB channel holds an independent pattern.
#[derive(Clone, Debug)]
pub struct BlueNoise {
    texture: Texture<Vec4>,
}

impl BlueNoise {
    pub fn new(texture: Texture<Vec4>) -> Self {
        Self { texture }
    }

    /// Load a noise image. Values are used raw, without sRGB decoding.
    pub fn load(path: impl AsRef<Path>) -> TextureResult<Self> {
        let texture = Texture::<Vec4>::load(path, ColorSpace::Linear)?;
        log::info!("Blue noise: {}x{}", texture.width, texture.height);
        Ok(Self::new(texture))
    }

    /// Noise value in `[0, 1)` for a pixel, frame and channel.
    pub fn sample(&self, x: u32, y: u32, frame: u32, channel: usize) -> f32 {
        let tx = (x % self.texture.width.max(1)) as i64;
        let ty = (y % self.texture.height.max(1)) as i64;
        let value = self.texture.texel(tx, ty)[channel % 3];
        (value + frame as f32 * GOLDEN_RATIO_FRACT).fract()
    }
}

/// Random source for a single pixel path.
pub struct Sampler<'a> {
    seed: SampleSeed,
    rng: Xoshiro256PlusPlus,
    blue_noise: Option<&'a BlueNoise>,
}

impl<'a> Sampler<'a> {
    pub fn new(seed: SampleSeed, blue_noise: Option<&'a BlueNoise>) -> Self {
        Self {
            seed,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed.hash()),
            blue_noise,
        }
    }

    pub fn seed(&self) -> SampleSeed {
        self.seed
    }

    /// Restart the stream for another bounce of the same pixel and frame.
    pub fn begin_bounce(&mut self, bounce: u32) {
        self.seed.bounce = bounce;
        self.rng = Xoshiro256PlusPlus::seed_from_u64(self.seed.hash());
    }

    /// Uniform white noise in `[0, 1)`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// Two stratified values in `[0, 1)`: blue noise when available.
    ///
    /// Blue noise depends only on the pixel, frame and bounce, so repeated
    /// calls within one bounce return the same pair. The bounce-0 lens
    /// sample and the first cosine bounce share it.
    pub fn noise2(&mut self) -> Vec2 {
        match self.blue_noise {
            Some(noise) => {
                let SampleSeed { x, y, frame, bounce } = self.seed;
                let channel = bounce as usize % 3;
                Vec2::new(
                    noise.sample(x, y, frame, channel),
                    noise.sample(x, y, frame, channel + 1),
                )
            }
            None => Vec2::new(self.next_f32(), self.next_f32()),
        }
    }

    /// Point in the unit disk. Blue noise is tried first; a rejected
    /// candidate falls back to white-noise rejection sampling.
    pub fn in_unit_disk(&mut self) -> Vec2 {
        if self.blue_noise.is_some() {
            let p = self.noise2() * 2.0 - Vec2::ONE;
            if p.length_squared() < 1.0 {
                return p;
            }
        }
        loop {
            let p = Vec2::new(self.next_f32(), self.next_f32()) * 2.0 - Vec2::ONE;
            if p.length_squared() < 1.0 {
                return p;
            }
        }
    }

    /// Uniformly distributed direction on the unit sphere.
    pub fn unit_vector(&mut self) -> Vec3 {
        let u = Vec2::new(self.next_f32(), self.next_f32());
        sphere_from_square(u)
    }

    /// Uniform direction on the hemisphere around `normal`.
    pub fn hemisphere_direction(&mut self, normal: Vec3) -> Vec3 {
        let v = self.unit_vector();
        if v.dot(normal) < 0.0 {
            -v
        } else {
            v
        }
    }

    /// Cosine-weighted direction around `normal` (normal plus a unit vector).
    pub fn cosine_direction(&mut self, normal: Vec3) -> Vec3 {
        let u = self.noise2();
        normalize_or(normal + sphere_from_square(u), normal)
    }
}

/// Map the unit square onto the unit sphere (area preserving).
#[inline]
fn sphere_from_square(u: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = std::f32::consts::TAU * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}
