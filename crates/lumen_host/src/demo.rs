//! Built-in demo scene and OBJ scene assembly.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use lumen_core::{load_obj, pack_material, ColorSpace, ImportedMesh, MeshData, TextureCache};
use lumen_math::{Mat4, Quat, Vec3};
use lumen_renderer::{
    Color, DirectionalLight, Light, LightSet, Material, PointLight, QuadLight, Scene, SpotLight, TexturedSpotlight,
};

/// Floor, four boxes in different materials and an emissive panel that
/// matches the quad light.
pub fn demo_scene() -> Scene {
    let mut scene = Scene::new();

    let floor = scene.add_mesh("floor", &MeshData::plane(20.0), Material::diffuse(Color::splat(0.8)));
    scene.add_instance(floor, Mat4::IDENTITY);

    let cube = scene.add_mesh("cube", &MeshData::cuboid(Vec3::splat(0.5)), Material::default());
    let placements = [
        (Vec3::new(-1.8, 0.5, 2.0), 0.3, Material::diffuse(Color::new(0.8, 0.2, 0.2))),
        (Vec3::new(-0.6, 0.5, 2.0), -0.2, Material::Metallic),
        (Vec3::new(0.6, 0.5, 2.0), 0.5, Material::dielectric(1.5, Color::new(0.1, 0.4, 0.6))),
        (Vec3::new(1.8, 0.5, 2.0), 0.0, Material::fresnel_glossy(Color::new(0.2, 0.6, 0.3))),
    ];
    for (position, angle, material) in placements {
        let instance = scene.add_instance(
            cube,
            Mat4::from_rotation_translation(Quat::from_rotation_y(angle), position),
        );
        scene.set_instance_material(instance, material);
    }

    let panel = scene.add_mesh(
        "panel",
        &MeshData::plane(1.0),
        Material::emissive(Color::ONE, Color::splat(4.0)),
    );
    // Flip the plane to face down
    scene.add_instance(
        panel,
        Mat4::from_translation(Vec3::new(0.0, 3.0, 2.0)) * Mat4::from_rotation_x(std::f32::consts::PI),
    );

    scene
}

pub fn demo_lights(projector: Option<Arc<lumen_core::Texture<lumen_math::Vec4>>>) -> LightSet {
    let mut lights = LightSet::new();
    lights.push(Light::Point(PointLight {
        position: Vec3::new(-2.0, 3.0, 4.0),
        color: Color::ONE,
        strength: 8.0,
    }));
    lights.push(Light::Directional(DirectionalLight {
        direction: Vec3::new(-1.0, -1.0, -1.0).normalize(),
        color: Color::new(1.0, 0.95, 0.9),
        strength: 1.0,
    }));
    lights.push(Light::Spot(SpotLight::aimed(
        Vec3::new(0.0, 4.0, 2.0),
        Vec3::new(0.0, 0.0, 2.0),
        Color::ONE,
        20.0,
    )));
    if let Some(texture) = projector {
        lights.push(Light::TexturedSpot(TexturedSpotlight::new(
            Vec3::new(2.0, 4.0, 4.0),
            Vec3::new(0.6, 0.0, 2.0),
            texture,
            20.0,
        )));
    }

    lights.quad = Some(QuadLight {
        corner: Vec3::new(-0.5, 2.99, 1.5),
        edge_u: Vec3::X,
        edge_v: Vec3::Z,
        color: Color::ONE,
        strength: 4.0,
    });
    lights
}

/// Import an OBJ file as one mesh and instance per object. Missing material
/// textures fall back to the plain diffuse colour.
pub fn obj_scene(path: &Path) -> Result<Scene> {
    let meshes = load_obj(path).with_context(|| format!("failed to load scene {}", path.display()))?;

    let mut cache = TextureCache::new();
    let mut scene = Scene::new();
    for imported in &meshes {
        let material = obj_material(imported, &mut cache);
        let mesh = scene.add_mesh(imported.name.clone(), &imported.mesh, material);
        scene.add_instance(mesh, Mat4::IDENTITY);
    }

    log::info!(
        "Imported {} meshes, {} textures ({:.1} MB)",
        meshes.len(),
        cache.len(),
        cache.total_size_bytes() as f64 / (1024.0 * 1024.0)
    );
    Ok(scene)
}

fn obj_material(imported: &ImportedMesh, cache: &mut TextureCache) -> Material {
    let fallback = Material::diffuse(imported.diffuse);
    let Some(albedo_path) = &imported.diffuse_texture else {
        return fallback;
    };

    let albedo = match cache.load(albedo_path, ColorSpace::Srgb) {
        Ok(texture) => texture,
        Err(err) => {
            log::warn!("{}: {}, using flat colour", imported.name, err);
            return fallback;
        }
    };
    let normal = imported
        .normal_texture
        .as_ref()
        .and_then(|path| match cache.load(path, ColorSpace::Linear) {
            Ok(texture) => Some(texture),
            Err(err) => {
                log::warn!("{}: {}, ignoring normal map", imported.name, err);
                None
            }
        });

    match pack_material(&albedo, normal.as_deref(), None) {
        Ok(packed) => Material::textured(Arc::new(packed)),
        Err(err) => {
            log::warn!("{}: {}, using flat colour", imported.name, err);
            fallback
        }
    }
}
