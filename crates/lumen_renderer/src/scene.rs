//! Geometry and resource store.
//!
//! Owns meshes (triangle soup + bottom-level BVH + template material) and
//! instances (transform + independent material copy), and a top-level BVH
//! over instance bounds. The store is mutated only between frames; during
//! a frame it is shared read-only by all workers.

use lumen_core::{MeshData, Triangle};
use lumen_math::{Aabb, Mat3, Mat4, Mat4Ext, Vec2, Vec3};

use crate::{BvhNode, Material, MaterialKind, Ray};

/// Möller-Trumbore parallel-ray threshold.
const DET_EPSILON: f32 = 1e-9;

/// Raw result of an acceleration-structure query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub distance: f32,
    /// Barycentric weight of vertex 1.
    pub u: f32,
    /// Barycentric weight of vertex 2.
    pub v: f32,
    pub primitive: u32,
    pub instance: u32,
}

/// Shading information for the closest hit along a ray.
///
/// Borrowed from the scene for the duration of one shading step.
#[derive(Clone, Copy)]
pub struct Intersection<'a> {
    pub point: Vec3,
    /// Unit geometric normal, flipped to face the incoming ray.
    pub normal: Vec3,
    /// Unit direction of the incoming ray.
    pub incoming: Vec3,
    pub distance: f32,
    pub uv: Vec2,
    pub material: &'a Material,
    pub scene: &'a Scene,
    /// Whether the incoming ray travelled inside a dielectric.
    pub inside: bool,
    pub instance: usize,
}

/// A mesh: triangle soup, its BLAS, and the template material instances copy.
pub struct Mesh {
    pub name: String,
    triangles: Vec<Triangle>,
    blas: BvhNode,
    bounds: Aabb,
    pub material: Material,
    /// Interpolate vertex normals instead of using the face normal.
    pub smooth_normals: bool,
}

impl Mesh {
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Closest triangle hit of a ray already in mesh space.
    fn intersect_local(&self, ray: &lumen_math::Ray, t_min: f32, t_max: f32) -> Option<(f32, f32, f32, u32)> {
        let mut closest = t_max;
        let mut best = None;
        self.blas.closest(ray, t_min, &mut closest, &mut |i, t_max| {
            let (t, u, v) = intersect_triangle(&self.triangles[i as usize], ray, t_min, t_max)?;
            best = Some((t, u, v, i));
            Some(t)
        });
        best
    }

    fn occludes_local(&self, ray: &lumen_math::Ray, t_min: f32, t_max: f32) -> bool {
        self.blas.any(ray, t_min, t_max, &mut |i| {
            intersect_triangle(&self.triangles[i as usize], ray, t_min, t_max).is_some()
        })
    }
}

/// A placed copy of a mesh with its own material.
pub struct Instance {
    pub mesh: usize,
    transform: Mat4,
    inverse: Mat4,
    normal_matrix: Mat3,
    bounds: Aabb,
    material: Material,
}

impl Instance {
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// World ray to mesh space. The direction is not renormalized, so
    /// distances stay in world units.
    fn to_local(&self, ray: &Ray) -> lumen_math::Ray {
        lumen_math::Ray::new(
            self.inverse.transform_point3(ray.origin),
            self.inverse.transform_vector3(ray.direction),
        )
    }
}

#[derive(Default)]
pub struct Scene {
    meshes: Vec<Mesh>,
    instances: Vec<Instance>,
    tlas: BvhNode,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten `data`, build its BLAS and store it with a template material.
    /// Returns the mesh index.
    pub fn add_mesh(&mut self, name: impl Into<String>, data: &MeshData, material: Material) -> usize {
        let name = name.into();
        let triangles = data.triangles();
        let bounds: Vec<Aabb> = triangles.iter().map(Triangle::bounds).collect();
        let blas = BvhNode::build(&bounds);
        let mesh_bounds = blas.bounding_box();

        log::info!(
            "Mesh '{}': {} triangles, {} BVH nodes",
            name,
            triangles.len(),
            blas.node_count()
        );

        self.meshes.push(Mesh {
            name,
            triangles,
            blas,
            bounds: mesh_bounds,
            material,
            smooth_normals: false,
        });
        self.meshes.len() - 1
    }

    /// Place a mesh. The instance starts with a copy of the mesh's template
    /// material. Call [`Scene::rebuild`] before rendering.
    pub fn add_instance(&mut self, mesh: usize, transform: Mat4) -> usize {
        let material = self.meshes[mesh].material.clone();
        let mut instance = Instance {
            mesh,
            transform: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
            normal_matrix: Mat3::IDENTITY,
            bounds: Aabb::EMPTY,
            material,
        };
        Self::place(&mut instance, &self.meshes[mesh], transform);
        self.instances.push(instance);
        self.instances.len() - 1
    }

    pub fn set_instance_transform(&mut self, instance: usize, transform: Mat4) {
        let inst = &mut self.instances[instance];
        Self::place(inst, &self.meshes[inst.mesh], transform);
    }

    fn place(instance: &mut Instance, mesh: &Mesh, transform: Mat4) {
        instance.transform = transform;
        instance.inverse = transform.inverse();
        instance.normal_matrix = transform.normal_matrix();
        instance.bounds = transform.transform_aabb(&mesh.bounds);
    }

    /// Replace an instance's material. Other instances and the mesh
    /// template are unaffected.
    pub fn set_instance_material(&mut self, instance: usize, material: Material) {
        self.instances[instance].material = material;
    }

    /// Switch an instance's material to another variant with default
    /// parameters. Does nothing (and returns false) when the variant is
    /// already active.
    pub fn set_instance_material_kind(&mut self, instance: usize, kind: MaterialKind) -> bool {
        let inst = &mut self.instances[instance];
        if inst.material.kind() == kind {
            return false;
        }
        inst.material = inst.material.retarget(kind);
        true
    }

    /// Restore an instance's material to a fresh copy of its mesh template.
    pub fn reset_instance_material(&mut self, instance: usize) {
        let mesh = self.instances[instance].mesh;
        self.instances[instance].material = self.meshes[mesh].material.clone();
    }

    pub fn instance_material_mut(&mut self, instance: usize) -> &mut Material {
        &mut self.instances[instance].material
    }

    pub fn mesh_mut(&mut self, mesh: usize) -> &mut Mesh {
        &mut self.meshes[mesh]
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn bounds(&self) -> Aabb {
        self.tlas.bounding_box()
    }

    /// Rebuild the top-level structure over current instance bounds.
    pub fn rebuild(&mut self) {
        let bounds: Vec<Aabb> = self.instances.iter().map(|i| i.bounds).collect();
        self.tlas = BvhNode::build(&bounds);
        log::info!(
            "TLAS: {} instances of {} meshes, {} nodes",
            self.instances.len(),
            self.meshes.len(),
            self.tlas.node_count()
        );
    }

    /// Closest hit along `ray` within `(0, ray.t)`.
    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let world = ray.as_math();
        let mut closest = ray.t;
        let mut best = None;

        self.tlas.closest(&world, 0.0, &mut closest, &mut |index, t_max| {
            let inst = &self.instances[index as usize];
            let local = inst.to_local(ray);
            let (distance, u, v, primitive) =
                self.meshes[inst.mesh].intersect_local(&local, 0.0, t_max)?;
            best = Some(Hit {
                distance,
                u,
                v,
                primitive,
                instance: index,
            });
            Some(distance)
        });

        best
    }

    /// Whether anything blocks `ray` before `ray.t`.
    pub fn is_occluded(&self, ray: &Ray) -> bool {
        let world = ray.as_math();
        self.tlas.any(&world, 0.0, ray.t, &mut |index| {
            let inst = &self.instances[index as usize];
            let local = inst.to_local(ray);
            self.meshes[inst.mesh].occludes_local(&local, 0.0, ray.t)
        })
    }

    /// Expand a raw hit into shading data.
    pub fn intersection(&self, ray: &Ray, hit: &Hit) -> Intersection<'_> {
        let inst = &self.instances[hit.instance as usize];
        let mesh = &self.meshes[inst.mesh];
        let tri = &mesh.triangles[hit.primitive as usize];

        let local_normal = if mesh.smooth_normals {
            tri.interpolate_normal(hit.u, hit.v)
        } else {
            tri.face_normal
        };
        let mut normal = lumen_math::normalize_or(inst.normal_matrix * local_normal, tri.face_normal);
        if normal.dot(ray.direction) > 0.0 {
            normal = -normal;
        }

        Intersection {
            point: ray.at(hit.distance),
            normal,
            incoming: ray.direction,
            distance: hit.distance,
            uv: tri.interpolate_uv(hit.u, hit.v),
            material: &inst.material,
            scene: self,
            inside: ray.inside,
            instance: hit.instance as usize,
        }
    }

    /// Closest hit with its shading data.
    pub fn find_nearest(&self, ray: &Ray) -> Option<Intersection<'_>> {
        self.intersect(ray).map(|hit| self.intersection(ray, &hit))
    }
}

/// Möller-Trumbore ray-triangle intersection. Returns `(t, u, v)`.
fn intersect_triangle(tri: &Triangle, ray: &lumen_math::Ray, t_min: f32, t_max: f32) -> Option<(f32, f32, f32)> {
    let [v0, v1, v2] = tri.positions;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < DET_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > t_min && t < t_max).then_some((t, u, v))
}
