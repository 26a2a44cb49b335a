//! Lumen - headless host for the interactive path tracer.
//!
//! Builds a scene, ticks the renderer for a number of frames and writes the
//! converged image as a PNG.

mod demo;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbaImage;
use lumen_core::{CameraPath, ColorSpace, SplineAnimator, Texture};
use lumen_renderer::{BlueNoise, RenderSettings, Renderer, Skydome};

#[derive(Parser, Debug)]
#[command(version, about = "Interactive CPU path tracer, headless")]
struct Args {
    /// Width of the rendered image
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Height of the rendered image
    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Number of frames to tick
    #[arg(short, long, default_value_t = 64)]
    frames: u32,

    /// Simulated milliseconds per frame (drives camera path playback)
    #[arg(long, default_value_t = 16.0)]
    dt: f32,

    /// Output PNG
    #[arg(short, long, default_value = "lumen.png")]
    output: PathBuf,

    /// Wavefront OBJ scene; the built-in demo scene is used when omitted
    #[arg(long)]
    obj: Option<PathBuf>,

    /// Render settings JSON
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings as JSON and continue
    #[arg(long)]
    dump_settings: Option<PathBuf>,

    /// Equirectangular environment image
    #[arg(long)]
    skydome: Option<PathBuf>,

    /// Tiling blue-noise texture
    #[arg(long)]
    blue_noise: Option<PathBuf>,

    /// Image projected by the textured spotlight
    #[arg(long)]
    projector: Option<PathBuf>,

    /// Camera path (one `px,py,pz,tx,ty,tz` waypoint per line) to play
    #[arg(long)]
    camera_path: Option<PathBuf>,

    /// Also write the overhead debug view to this PNG
    #[arg(long)]
    debug_output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting Lumen");

    let mut settings = match &args.settings {
        Some(path) => RenderSettings::load(path)
            .with_context(|| format!("failed to load settings {}", path.display()))?,
        None => RenderSettings::default(),
    };
    if args.debug_output.is_some() {
        settings.debug_viewer = true;
    }
    if let Some(path) = &args.dump_settings {
        settings
            .save(path)
            .with_context(|| format!("failed to write settings {}", path.display()))?;
    }

    let scene = match &args.obj {
        Some(path) => demo::obj_scene(path)?,
        None => demo::demo_scene(),
    };

    let projector = args
        .projector
        .as_ref()
        .map(|path| {
            Texture::load(path, ColorSpace::Srgb)
                .with_context(|| format!("failed to load projector texture {}", path.display()))
        })
        .transpose()?
        .map(Arc::new);

    let mut lights = demo::demo_lights(projector);
    if let Some(path) = &args.skydome {
        let texture = Texture::load(path, ColorSpace::Srgb)
            .with_context(|| format!("failed to load skydome {}", path.display()))?;
        log::info!("Skydome: {}x{}", texture.width, texture.height);
        lights.skydome = Some(Skydome::new(Arc::new(texture)));
    }

    let mut renderer = Renderer::new(args.width, args.height, scene, lights).with_settings(settings);

    if let Some(path) = &args.blue_noise {
        let noise = BlueNoise::load(path).with_context(|| format!("failed to load blue noise {}", path.display()))?;
        renderer.set_blue_noise(Some(noise));
    }

    if let Some(path) = &args.camera_path {
        let camera_path =
            CameraPath::load(path).with_context(|| format!("failed to load camera path {}", path.display()))?;
        log::info!("Playing camera path with {} waypoints", camera_path.len());
        renderer.set_animator(Some(SplineAnimator::new(camera_path)));
    }

    let start = Instant::now();
    for _ in 0..args.frames {
        renderer.tick(args.dt);
    }
    let perf = renderer.perf();
    log::info!(
        "Rendered {} frames in {:.2}s ({:.2}ms avg, {:.1}Mrays/s), {} spp",
        args.frames,
        start.elapsed().as_secs_f32(),
        perf.average_ms,
        perf.mrays_per_second,
        renderer.samples()
    );

    let image = renderer.output();
    save_png(&args.output, image.width, image.height, image.to_rgba())?;

    if let Some(path) = &args.debug_output {
        let viewer = renderer.debug_viewer();
        save_png(path, viewer.width(), viewer.height(), viewer.to_rgba())?;
    }

    Ok(())
}

fn save_png(path: &Path, width: u32, height: u32, rgba: Vec<u8>) -> Result<()> {
    let image = RgbaImage::from_raw(width, height, rgba).context("image buffer size mismatch")?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
