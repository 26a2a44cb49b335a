//! Mesh geometry as produced by the importers.
//!
//! `MeshData` is the indexed form loaders fill in; `Triangle` is the flattened
//! per-triangle form (positions, normals, UVs and a tangent frame) that the
//! renderer builds its acceleration structures over.

use lumen_math::{normalize_or, Aabb, Vec2, Vec3};

/// Triangles with less area than this are dropped when flattening.
const MIN_TRIANGLE_AREA: f32 = 1e-12;

/// Indexed triangle mesh with optional per-vertex normals and UVs.
#[derive(Clone, Debug)]
pub struct MeshData {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional - computed on demand by `ensure_normals`)
    pub normals: Option<Vec<Vec3>>,

    /// UV coordinates (optional - one per vertex)
    pub uvs: Option<Vec<Vec2>>,

    /// Triangle indices (every 3 indices form a triangle, counter-clockwise)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

/// One flattened triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub positions: [Vec3; 3],
    pub normals: [Vec3; 3],
    pub uvs: [Vec2; 3],
    pub tangent: Vec3,
    pub bitangent: Vec3,
    /// Unit geometric normal following the winding order.
    pub face_normal: Vec3,
}

impl Triangle {
    pub fn area(&self) -> f32 {
        let [p0, p1, p2] = self.positions;
        (p1 - p0).cross(p2 - p0).length() * 0.5
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_slice(&self.positions)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.positions[0] + self.positions[1] + self.positions[2]) / 3.0
    }

    /// Interpolate a per-vertex attribute with barycentric weights (u, v),
    /// where vertex 0 gets `1 - u - v`.
    #[inline]
    pub fn interpolate_uv(&self, u: f32, v: f32) -> Vec2 {
        self.uvs[0] * (1.0 - u - v) + self.uvs[1] * u + self.uvs[2] * v
    }

    #[inline]
    pub fn interpolate_normal(&self, u: f32, v: f32) -> Vec3 {
        let n = self.normals[0] * (1.0 - u - v) + self.normals[1] * u + self.normals[2] * v;
        normalize_or(n, self.face_normal)
    }
}

impl MeshData {
    /// Create a new mesh from positions and indices, optionally with normals.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Aabb::from_slice(&positions);
        Self {
            positions,
            normals,
            uvs: None,
            indices,
            bounds,
        }
    }

    /// Create a new mesh with UV coordinates.
    pub fn new_with_uvs(
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        normals: Option<Vec<Vec3>>,
        uvs: Option<Vec<Vec2>>,
    ) -> Self {
        let mut mesh = Self::new(positions, indices, normals);
        mesh.uvs = uvs;
        mesh
    }

    /// Axis-aligned square in the XZ plane centred on the origin, facing +Y.
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let positions = vec![
            Vec3::new(-h, 0.0, -h),
            Vec3::new(-h, 0.0, h),
            Vec3::new(h, 0.0, h),
            Vec3::new(h, 0.0, -h),
        ];
        let uvs = vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];
        Self::new_with_uvs(positions, vec![0, 1, 2, 0, 2, 3], Some(vec![Vec3::Y; 4]), Some(uvs))
    }

    /// Axis-aligned box centred on the origin with flat-shaded faces.
    pub fn cuboid(half_extent: Vec3) -> Self {
        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for axis in [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z] {
            // Two in-plane axes forming a right-handed frame with the face normal
            let s = if axis.x.abs() > 0.5 { Vec3::Y } else { Vec3::X };
            let u = axis.cross(s);
            let v = axis.cross(u);
            let base = positions.len() as u32;
            for (a, b) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                positions.push((axis + u * a + v * b) * half_extent);
                normals.push(axis);
                uvs.push(Vec2::new((a + 1.0) * 0.5, (b + 1.0) * 0.5));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let mut mesh = Self::new_with_uvs(positions, indices, Some(normals), Some(uvs));
        mesh.orient_faces_outward();
        mesh
    }

    /// Flip any triangle whose winding disagrees with its stored vertex normals.
    fn orient_faces_outward(&mut self) {
        let Some(normals) = &self.normals else {
            return;
        };
        for face in self.indices.chunks_mut(3) {
            let [p0, p1, p2] = [0, 1, 2].map(|i| self.positions[face[i] as usize]);
            let geometric = (p1 - p0).cross(p2 - p0);
            if geometric.dot(normals[face[0] as usize]) < 0.0 {
                face.swap(1, 2);
            }
        }
    }

    /// Compute smooth vertex normals by averaging area-weighted face normals.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks(3) {
            if face.len() < 3 {
                continue;
            }
            let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normalize_or(*normal, Vec3::Y);
        }

        self.normals = Some(normals);
    }

    /// Ensure the mesh has one normal per vertex, computing them if necessary.
    pub fn ensure_normals(&mut self) {
        let should_compute = match &self.normals {
            None => true,
            Some(normals) => normals.len() != self.positions.len(),
        };

        if should_compute {
            if let Some(normals) = &self.normals {
                log::debug!(
                    "Normals array length ({}) doesn't match vertex count ({}), computing smooth normals",
                    normals.len(),
                    self.positions.len()
                );
            }
            self.compute_normals();
        }
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Flatten into a triangle soup with per-triangle tangent frames.
    ///
    /// Triangles with out-of-range indices or zero area are skipped with a
    /// warning so that degenerate faces never reach normalization.
    pub fn triangles(&self) -> Vec<Triangle> {
        let vertex_count = self.positions.len();
        let mut triangles = Vec::with_capacity(self.triangle_count());
        let mut degenerate = 0usize;

        for chunk in self.indices.chunks(3) {
            if chunk.len() < 3 {
                continue;
            }
            let idx = [chunk[0] as usize, chunk[1] as usize, chunk[2] as usize];
            if idx.iter().any(|&i| i >= vertex_count) {
                log::warn!(
                    "Invalid triangle indices: {:?}, vertex count: {}",
                    idx,
                    vertex_count
                );
                continue;
            }

            let positions = idx.map(|i| self.positions[i]);
            let geometric = (positions[1] - positions[0]).cross(positions[2] - positions[0]);
            if geometric.length() * 0.5 < MIN_TRIANGLE_AREA {
                degenerate += 1;
                continue;
            }
            let face_normal = geometric.normalize();

            let normals = match &self.normals {
                Some(n) if n.len() == vertex_count => idx.map(|i| normalize_or(n[i], face_normal)),
                _ => [face_normal; 3],
            };
            let uvs = match &self.uvs {
                Some(uv) if uv.len() == vertex_count => idx.map(|i| uv[i]),
                _ => [Vec2::ZERO; 3],
            };
            let (tangent, bitangent) = tangent_frame(&positions, &uvs, face_normal);

            triangles.push(Triangle {
                positions,
                normals,
                uvs,
                tangent,
                bitangent,
                face_normal,
            });
        }

        if degenerate > 0 {
            log::warn!("Skipped {} zero-area triangles", degenerate);
        }

        triangles
    }
}

/// Tangent and bitangent from UV gradients, falling back to an arbitrary
/// orthonormal frame around `normal` when the UV mapping is degenerate.
fn tangent_frame(positions: &[Vec3; 3], uvs: &[Vec2; 3], normal: Vec3) -> (Vec3, Vec3) {
    let e1 = positions[1] - positions[0];
    let e2 = positions[2] - positions[0];
    let d1 = uvs[1] - uvs[0];
    let d2 = uvs[2] - uvs[0];

    let det = d1.x * d2.y - d2.x * d1.y;
    if det.abs() > 1e-12 {
        let r = 1.0 / det;
        let tangent = (e1 * d2.y - e2 * d1.y) * r;
        let tangent = normalize_or(tangent - normal * normal.dot(tangent), Vec3::ZERO);
        if tangent != Vec3::ZERO {
            return (tangent, normal.cross(tangent));
        }
    }

    let tangent = normal.any_orthonormal_vector();
    (tangent, normal.cross(tangent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle() -> MeshData {
        MeshData::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
            None,
        )
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = single_triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.has_normals());
    }

    #[test]
    fn test_compute_normals_ccw() {
        let mut mesh = single_triangle();
        mesh.compute_normals();

        // Counter-clockwise in XY viewed from +Z points at +Z
        for normal in mesh.normals.as_ref().unwrap() {
            assert!((normal.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_bounds_computation() {
        let mesh = MeshData::new(
            vec![Vec3::new(-1.0, -2.0, -3.0), Vec3::new(4.0, 5.0, 6.0), Vec3::ZERO],
            vec![0, 1, 2],
            None,
        );
        assert!((mesh.bounds.min - Vec3::new(-1.0, -2.0, -3.0)).length() < 0.001);
        assert!((mesh.bounds.max - Vec3::new(4.0, 5.0, 6.0)).length() < 0.001);
    }

    #[test]
    fn test_triangles_skip_degenerate_and_invalid() {
        let _ = env_logger::builder().is_test(true).try_init();
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(2.0, 0.0, 0.0)];
        // Valid, collinear (zero area), out of range
        let indices = vec![0, 1, 2, 0, 1, 3, 0, 1, 9];
        let mesh = MeshData::new(positions, indices, None);

        let tris = mesh.triangles();
        assert_eq!(tris.len(), 1);
        assert!((tris[0].face_normal - Vec3::Z).length() < 1e-6);
        assert!(tris[0].normals.iter().all(|n| n.is_finite()));
    }

    #[test]
    fn test_tangent_frame_follows_uvs() {
        let mesh = MeshData::plane(2.0);
        let tris = mesh.triangles();
        assert_eq!(tris.len(), 2);

        for tri in &tris {
            assert!((tri.face_normal - Vec3::Y).length() < 1e-5);
            // u runs along +X on the plane
            assert!((tri.tangent - Vec3::X).length() < 1e-5);
            assert!(tri.bitangent.dot(tri.face_normal).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cuboid_faces_point_outward() {
        let mesh = MeshData::cuboid(Vec3::splat(1.0));
        let tris = mesh.triangles();
        assert_eq!(tris.len(), 12);

        for tri in &tris {
            // Face centroid direction agrees with the face normal
            assert!(tri.centroid().dot(tri.face_normal) > 0.0);
            assert!((tri.face_normal - tri.normals[0]).length() < 1e-5);
        }
    }

    #[test]
    fn test_interpolate_uv_at_vertices() {
        let tris = MeshData::plane(2.0).triangles();
        let tri = tris[0];
        assert_eq!(tri.interpolate_uv(0.0, 0.0), tri.uvs[0]);
        assert_eq!(tri.interpolate_uv(1.0, 0.0), tri.uvs[1]);
        assert_eq!(tri.interpolate_uv(0.0, 1.0), tri.uvs[2]);
    }
}
