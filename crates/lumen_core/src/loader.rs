//! Wavefront OBJ import.
//!
//! Produces one [`ImportedMesh`] per OBJ object with its diffuse colour and
//! any texture paths resolved against the OBJ's directory. A file that cannot
//! be parsed, or that contains no triangles, is an error rather than a
//! partially filled scene.

use std::path::{Path, PathBuf};

use lumen_math::{Vec2, Vec3};
use thiserror::Error;

use crate::mesh::MeshData;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("scene file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to parse {}: {source}", path.display())]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("{} contains no triangles", .0.display())]
    Empty(PathBuf),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// A mesh plus the surface description the OBJ's material library gave it.
#[derive(Clone, Debug)]
pub struct ImportedMesh {
    pub name: String,
    pub mesh: MeshData,
    pub diffuse: Vec3,
    pub diffuse_texture: Option<PathBuf>,
    pub normal_texture: Option<PathBuf>,
}

/// Load every object in an OBJ file.
pub fn load_obj(path: impl AsRef<Path>) -> SceneResult<Vec<ImportedMesh>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SceneError::NotFound(path.to_path_buf()));
    }
    log::info!("Loading OBJ: {}", path.display());

    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )
    .map_err(|source| SceneError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    // A broken or missing .mtl only costs us the material data
    let materials = materials.unwrap_or_else(|e| {
        log::warn!("Material library for {} unusable: {}", path.display(), e);
        Vec::new()
    });
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

    let mut meshes = Vec::with_capacity(models.len());
    for model in models {
        let m = &model.mesh;
        if m.indices.is_empty() {
            continue;
        }

        let positions: Vec<Vec3> = m
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();
        let normals = (!m.normals.is_empty()).then(|| {
            m.normals
                .chunks_exact(3)
                .map(|n| Vec3::new(n[0], n[1], n[2]))
                .collect::<Vec<_>>()
        });
        let uvs = (!m.texcoords.is_empty()).then(|| {
            m.texcoords
                .chunks_exact(2)
                .map(|t| Vec2::new(t[0], t[1]))
                .collect::<Vec<_>>()
        });

        let mut mesh = MeshData::new_with_uvs(positions, m.indices.clone(), normals, uvs);
        mesh.ensure_normals();

        let material = m.material_id.and_then(|id| materials.get(id));
        let diffuse = material
            .and_then(|mat| mat.diffuse)
            .map(Vec3::from_array)
            .unwrap_or(Vec3::splat(0.8));
        let diffuse_texture = material
            .and_then(|mat| mat.diffuse_texture.as_deref())
            .map(|t| base_dir.join(t));
        let normal_texture = material
            .and_then(|mat| mat.normal_texture.as_deref())
            .map(|t| base_dir.join(t));

        log::debug!(
            "  {}: {} vertices, {} triangles",
            model.name,
            mesh.vertex_count(),
            mesh.triangle_count()
        );

        meshes.push(ImportedMesh {
            name: model.name,
            mesh,
            diffuse,
            diffuse_texture,
            normal_texture,
        });
    }

    if meshes.is_empty() {
        return Err(SceneError::Empty(path.to_path_buf()));
    }

    log::info!("Loaded {} meshes from {}", meshes.len(), path.display());
    Ok(meshes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const QUAD_OBJ: &str = "\
mtllib quad.mtl
o Floor
v -1 0 -1
v -1 0 1
v 1 0 1
v 1 0 -1
vt 0 1
vt 0 0
vt 1 0
vt 1 1
usemtl red
f 1/1 2/2 3/3 4/4
";

    const QUAD_MTL: &str = "\
newmtl red
Kd 1.0 0.0 0.0
map_Kd checker.png
";

    #[test]
    fn test_load_quad_with_material() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), QUAD_OBJ).unwrap();
        fs::write(dir.path().join("quad.mtl"), QUAD_MTL).unwrap();

        let meshes = load_obj(dir.path().join("quad.obj")).unwrap();
        assert_eq!(meshes.len(), 1);

        let floor = &meshes[0];
        assert_eq!(floor.name, "Floor");
        assert_eq!(floor.mesh.triangle_count(), 2);
        assert!(floor.mesh.has_uvs());
        // Normals computed from the CCW winding face +Y
        let normals = floor.mesh.normals.as_ref().unwrap();
        assert!(normals.iter().all(|n| (n.y - 1.0).abs() < 1e-5));
        assert_eq!(floor.diffuse, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(floor.diffuse_texture, Some(dir.path().join("checker.png")));
        assert!(floor.normal_texture.is_none());
    }

    #[test]
    fn test_missing_material_library_is_recoverable() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), QUAD_OBJ).unwrap();

        let meshes = load_obj(dir.path().join("quad.obj")).unwrap();
        assert_eq!(meshes[0].diffuse, Vec3::splat(0.8));
        assert!(meshes[0].diffuse_texture.is_none());
    }

    #[test]
    fn test_missing_file() {
        init_logging();
        let err = load_obj("/no/such/scene.obj").unwrap_err();
        assert!(matches!(err, SceneError::NotFound(_)));
    }

    #[test]
    fn test_empty_file_is_no_scene() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.obj");
        fs::write(&path, "# nothing here\n").unwrap();

        assert!(matches!(load_obj(&path), Err(SceneError::Empty(_))));
    }
}
