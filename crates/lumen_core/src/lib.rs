//! Lumen Core - asset-side collaborators for the path tracer.
//!
//! This crate provides:
//!
//! - **Geometry**: `MeshData` index buffers and the `Triangle` soup the renderer consumes
//! - **Textures**: `Texture<T>` with wrap/filter sampling policies, packed material texels, a `TextureCache`
//! - **Import**: Wavefront OBJ loading via `tobj`
//! - **Camera paths**: comma-separated waypoint files and a Catmull-Rom animator
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::loader::load_obj;
//!
//! let meshes = load_obj("assets/sponza.obj")?;
//! let triangles: usize = meshes.iter().map(|m| m.mesh.triangle_count()).sum();
//! println!("Loaded {} meshes, {} triangles", meshes.len(), triangles);
//! ```

pub mod loader;
pub mod mesh;
pub mod spline;
pub mod texture;

// Re-export commonly used types
pub use loader::{load_obj, ImportedMesh, SceneError, SceneResult};
pub use mesh::{MeshData, Triangle};
pub use spline::{catmull_rom, CameraPath, SplineAnimator, SplineError, SplineResult, Waypoint};
pub use texture::{
    pack_material, ColorSpace, FilterMode, PackedTexel, SamplePolicy, Texel, Texture, TextureCache,
    TextureError, TextureResult, WrapMode,
};
