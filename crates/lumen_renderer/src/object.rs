//! Scene objects: analytic primitives and triangle meshes.
//!
//! Objects are a flat enum over the shape variants. The hot loop only ever
//! needs three things from an object — bounds, a ray test, and a material
//! handle — so enum dispatch through `match` replaces a virtual class tree.

use std::path::Path;
use std::sync::Arc;

use lumen_core::MeshData;
use lumen_math::intersect::{
    interpolate_barycentric, ray_intersect_plane, ray_intersect_sphere,
};
use lumen_math::mapping::{planar_map_texcoords, sphere_map_texcoords};
use lumen_math::{Bounds, Cuboid, Mat4, Plane, Ray, Vec2, Vec3};

use crate::material::{Material, MaterialHandle};
use crate::mesh_bvh::{MeshBvh, MeshCollision};

/// Padding applied to flat primitives so their boxes never have zero
/// volume inside the octrees.
const FLAT_BOUNDS_EPSILON: f32 = 0.001;

/// Half-extent of the stand-in bounds for unbounded planes.
const PLANAR_BOUNDS_EXTENT: f32 = 1.0e4;

/// Closest surface hit found while tracing objects.
#[derive(Debug, Clone)]
pub struct ObjectCollision {
    pub param: f32,
    pub point: Vec3,
    pub surface_normal: Vec3,
    pub surface_texcoords: Vec2,
    pub surface_material: Option<MaterialHandle>,
    pub is_internal: bool,
}

impl Default for ObjectCollision {
    fn default() -> Self {
        Self {
            param: 2.0,
            point: Vec3::ZERO,
            surface_normal: Vec3::ZERO,
            surface_texcoords: Vec2::ZERO,
            surface_material: None,
            is_internal: false,
        }
    }
}

/// The shape carried by an [`Object`].
pub enum Shape {
    Sphere(SphereShape),
    Plane(PlaneShape),
    Disc(DiscShape),
    Quad(QuadShape),
    Cuboid(CuboidShape),
    Mesh(MeshShape),
}

/// A shape paired with its material.
pub struct Object {
    shape: Shape,
    material: MaterialHandle,
}

impl Object {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            material: Arc::new(Material::diffuse(Vec3::ONE)),
        }
    }

    pub fn set_material(&mut self, material: MaterialHandle) {
        self.material = material;
    }

    pub fn material(&self) -> &MaterialHandle {
        &self.material
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn center(&self) -> Vec3 {
        match &self.shape {
            Shape::Sphere(s) => s.origin,
            Shape::Plane(_) => Vec3::ZERO,
            Shape::Disc(s) => s.origin,
            Shape::Quad(_) => Vec3::ZERO,
            Shape::Cuboid(s) => s.cuboid.center(),
            Shape::Mesh(s) => s.bvh.center(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        match &self.shape {
            Shape::Sphere(s) => s.bounds,
            Shape::Plane(s) => s.bounds,
            Shape::Disc(s) => s.bounds,
            Shape::Quad(s) => s.bounds,
            Shape::Cuboid(s) => s.cuboid.bounds(),
            Shape::Mesh(s) => s.bounds,
        }
    }

    /// Test a ray against the object, refining `hit` when a closer surface
    /// is struck. Returns true if `hit` was updated.
    pub fn trace(&self, ray: &Ray, hit: &mut ObjectCollision) -> bool {
        match &self.shape {
            Shape::Sphere(s) => {
                if let Some(c) = ray_intersect_sphere(s.origin, s.radius, ray) {
                    if c.param < hit.param {
                        hit.param = c.param;
                        hit.point = c.point;
                        hit.surface_normal = c.normal;
                        hit.surface_texcoords = sphere_map_texcoords(c.normal);
                        hit.surface_material = Some(self.material.clone());
                        return true;
                    }
                }
                false
            }
            Shape::Plane(s) => {
                if let Some(c) = ray_intersect_plane(&s.plane, ray) {
                    if c.param < hit.param {
                        hit.param = c.param;
                        hit.point = c.point;
                        hit.surface_normal = c.normal;
                        hit.surface_texcoords = planar_map_texcoords(c.point, c.normal);
                        hit.surface_material = Some(self.material.clone());
                        return true;
                    }
                }
                false
            }
            Shape::Disc(s) => {
                if let Some(c) = ray_intersect_plane(&s.plane, ray) {
                    if c.point.distance(s.origin) <= s.radius && c.param < hit.param {
                        hit.param = c.param;
                        hit.point = c.point;
                        hit.surface_normal = c.normal;
                        hit.surface_texcoords = planar_map_texcoords(c.point, c.normal);
                        hit.surface_material = Some(self.material.clone());
                        return true;
                    }
                }
                false
            }
            Shape::Quad(s) => {
                if let Some(c) = ray_intersect_plane(&s.plane, ray) {
                    let offset = c.point - s.origin;
                    if offset.dot(s.tangent).abs() <= s.half_width
                        && offset.dot(s.bitangent).abs() <= s.half_height
                        && c.param < hit.param
                    {
                        hit.param = c.param;
                        hit.point = c.point;
                        hit.surface_normal = c.normal;
                        hit.surface_texcoords = planar_map_texcoords(c.point, c.normal);
                        hit.surface_material = Some(self.material.clone());
                        return true;
                    }
                }
                false
            }
            Shape::Cuboid(s) => s.trace(ray, hit, &self.material),
            Shape::Mesh(s) => s.trace(ray, hit, &self.material),
        }
    }
}

pub struct SphereShape {
    pub origin: Vec3,
    pub radius: f32,
    bounds: Bounds,
}

impl SphereShape {
    pub fn new(origin: Vec3, radius: f32) -> Self {
        Self {
            origin,
            radius,
            bounds: Bounds::from_points(origin - Vec3::splat(radius), origin + Vec3::splat(radius)),
        }
    }
}

pub struct PlaneShape {
    pub plane: Plane,
    bounds: Bounds,
}

impl PlaneShape {
    pub fn new(plane: Plane) -> Self {
        // An infinite plane has no tight box; a large finite one keeps the
        // scene octree from ever seeing an empty extent.
        Self {
            plane,
            bounds: Bounds::from_points(
                Vec3::splat(-PLANAR_BOUNDS_EXTENT),
                Vec3::splat(PLANAR_BOUNDS_EXTENT),
            ),
        }
    }
}

pub struct DiscShape {
    pub origin: Vec3,
    pub radius: f32,
    plane: Plane,
    bounds: Bounds,
}

impl DiscShape {
    pub fn new(origin: Vec3, normal: Vec3, radius: f32) -> Self {
        Self {
            origin,
            radius,
            plane: Plane::from_point_normal(normal, origin),
            bounds: Bounds::from_points(
                origin - Vec3::splat(radius),
                origin + Vec3::splat(radius),
            )
            .inflate(FLAT_BOUNDS_EPSILON),
        }
    }
}

pub struct QuadShape {
    origin: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
    half_width: f32,
    half_height: f32,
    plane: Plane,
    bounds: Bounds,
}

impl QuadShape {
    /// Build from a center, a facing direction, and edge lengths.
    pub fn new(origin: Vec3, normal: Vec3, width: f32, height: f32) -> Self {
        let n = normal.normalize_or_zero();
        let reference = if n.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
        let tangent = reference.cross(n).normalize_or_zero();
        let bitangent = n.cross(tangent);
        Self::from_frame(origin, n, tangent, bitangent, width * 0.5, height * 0.5)
    }

    /// Build from an upper-left corner and two spanning edge vectors.
    pub fn from_span(position: Vec3, u: Vec3, v: Vec3) -> Self {
        let origin = position + u * 0.5 + v * 0.5;
        let normal = u.cross(v).normalize_or_zero();
        Self::from_frame(
            origin,
            normal,
            u.normalize_or_zero(),
            v.normalize_or_zero(),
            u.length() * 0.5,
            v.length() * 0.5,
        )
    }

    fn from_frame(
        origin: Vec3,
        normal: Vec3,
        tangent: Vec3,
        bitangent: Vec3,
        half_width: f32,
        half_height: f32,
    ) -> Self {
        let mut bounds = Bounds::EMPTY;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            bounds.expand(origin + tangent * half_width * su + bitangent * half_height * sv);
        }
        Self {
            origin,
            tangent,
            bitangent,
            half_width,
            half_height,
            plane: Plane::from_point_normal(normal, origin),
            bounds: bounds.inflate(FLAT_BOUNDS_EPSILON),
        }
    }
}

pub struct CuboidShape {
    pub cuboid: Cuboid,
}

impl CuboidShape {
    pub fn new(origin: Vec3, width: f32, height: f32, depth: f32) -> Self {
        Self {
            cuboid: Cuboid::new(origin, width, height, depth),
        }
    }

    /// Rotate the box about its center. `angle` is radians.
    pub fn rotate(&mut self, axis: Vec3, angle: f32) {
        self.cuboid.rotate(axis, angle);
    }

    fn trace(&self, ray: &Ray, hit: &mut ObjectCollision, material: &MaterialHandle) -> bool {
        let mut collision_detected = false;
        // Test each face plane; a plane hit only counts as a face hit when
        // the point sits behind the four adjacent planes. The opposite
        // plane shares the hit plane's axis pair and is skipped.
        for i in 0..6 {
            if let Some(plane_hit) = ray_intersect_plane(&self.cuboid.face_plane(i), ray) {
                if plane_hit.param < hit.param {
                    let on_face = (0..6)
                        .filter(|j| i / 2 != j / 2)
                        .all(|j| self.cuboid.face_plane(j).distance(plane_hit.point) <= 0.0);
                    if on_face {
                        collision_detected = true;
                        hit.param = plane_hit.param;
                        hit.point = plane_hit.point;
                        hit.surface_normal = plane_hit.normal;
                        hit.surface_texcoords =
                            planar_map_texcoords(plane_hit.point, plane_hit.normal);
                        hit.surface_material = Some(material.clone());
                    }
                }
            }
        }
        collision_detected
    }
}

pub struct MeshShape {
    mesh: MeshData,
    bvh: MeshBvh,
    bounds: Bounds,
    /// Per-face material table. May be empty, in which case faces always
    /// shade with the object material.
    face_materials: Vec<MaterialHandle>,
}

impl MeshShape {
    /// Load a mesh from an OBJ file and place it with `transform`. Load
    /// failures are logged and produce an empty shape that never hits.
    pub fn load(path: impl AsRef<Path>, invert_normals: bool, transform: Mat4) -> Self {
        let data = match MeshData::load_obj(path.as_ref(), invert_normals) {
            Ok(data) => data,
            Err(err) => {
                log::error!(
                    "Error loading obj file {}: {}.",
                    path.as_ref().display(),
                    err
                );
                MeshData::default()
            }
        };
        Self::from_data(data, transform)
    }

    pub fn from_data(mut data: MeshData, transform: Mat4) -> Self {
        let mut bounds = Bounds::EMPTY;
        for vertex in &mut data.vertices {
            *vertex = transform.transform_point3(*vertex);
            bounds.expand(*vertex);
        }
        let bvh = MeshBvh::build(&mut data);
        Self {
            mesh: data,
            bvh,
            bounds,
            face_materials: Vec::new(),
        }
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    fn trace(&self, ray: &Ray, hit: &mut ObjectCollision, material: &MaterialHandle) -> bool {
        let mut mesh_hit = MeshCollision {
            param: hit.param,
            ..Default::default()
        };
        if !self.bvh.trace(&self.mesh, ray, &mut mesh_hit) || mesh_hit.param > hit.param {
            return false;
        }

        hit.param = mesh_hit.param;
        hit.point = mesh_hit.point;
        hit.surface_normal = mesh_hit.normal;
        hit.surface_material = Some(material.clone());

        let face = &self.mesh.faces[mesh_hit.face_index as usize];

        if self.mesh.has_normals() {
            // Interpolated vertex normals beat the flat face normal.
            let n0 = self.mesh.normals[face.normal_indices[0] as usize];
            let n1 = self.mesh.normals[face.normal_indices[1] as usize];
            let n2 = self.mesh.normals[face.normal_indices[2] as usize];
            hit.surface_normal = interpolate_barycentric(
                n0,
                n1,
                n2,
                mesh_hit.bary_coords.x,
                mesh_hit.bary_coords.y,
            );
        }

        if self.mesh.has_texcoords() {
            let t0 = self.mesh.texcoords[face.texcoord_indices[0] as usize];
            let t1 = self.mesh.texcoords[face.texcoord_indices[1] as usize];
            let t2 = self.mesh.texcoords[face.texcoord_indices[2] as usize];
            let uv = interpolate_barycentric(
                t0.extend(0.0),
                t1.extend(0.0),
                t2.extend(0.0),
                mesh_hit.bary_coords.x,
                mesh_hit.bary_coords.y,
            );
            hit.surface_texcoords = Vec2::new(uv.x, uv.y);
        }

        if let Some(face_material) = usize::try_from(face.material)
            .ok()
            .and_then(|index| self.face_materials.get(index))
        {
            hit.surface_material = Some(face_material.clone());
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::MeshFace;

    #[test]
    fn test_sphere_object_trace() {
        let obj = Object::new(Shape::Sphere(SphereShape::new(Vec3::ZERO, 1.0)));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0));
        let mut hit = ObjectCollision::default();
        assert!(obj.trace(&ray, &mut hit));
        assert!((hit.param - 0.4).abs() < 1e-5);
        assert!((hit.surface_normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        assert!(hit.surface_material.is_some());
    }

    #[test]
    fn test_sphere_does_not_regress_closer_hit() {
        let obj = Object::new(Shape::Sphere(SphereShape::new(Vec3::ZERO, 1.0)));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0));
        let mut hit = ObjectCollision {
            param: 0.1,
            ..Default::default()
        };
        assert!(!obj.trace(&ray, &mut hit));
        assert!((hit.param - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_disc_edges() {
        let obj = Object::new(Shape::Disc(DiscShape::new(Vec3::ZERO, Vec3::Z, 2.0)));
        let inside = Ray::new(Vec3::new(1.0, 0.0, -5.0), Vec3::new(1.0, 0.0, 5.0));
        let outside = Ray::new(Vec3::new(3.0, 0.0, -5.0), Vec3::new(3.0, 0.0, 5.0));
        let mut hit = ObjectCollision::default();
        assert!(obj.trace(&inside, &mut hit));
        let mut hit = ObjectCollision::default();
        assert!(!obj.trace(&outside, &mut hit));
    }

    #[test]
    fn test_quad_extents() {
        let obj = Object::new(Shape::Quad(QuadShape::new(Vec3::ZERO, Vec3::Z, 4.0, 2.0)));
        let mut hit = ObjectCollision::default();
        assert!(obj.trace(
            &Ray::new(Vec3::new(1.9, 0.9, -5.0), Vec3::new(1.9, 0.9, 5.0)),
            &mut hit
        ));
        let mut hit = ObjectCollision::default();
        assert!(!obj.trace(
            &Ray::new(Vec3::new(1.9, 1.1, -5.0), Vec3::new(1.9, 1.1, 5.0)),
            &mut hit
        ));
    }

    #[test]
    fn test_quad_from_span_matches_oriented() {
        let spanned = QuadShape::from_span(
            Vec3::new(-2.0, 1.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(0.0, -2.0, 0.0),
        );
        let obj = Object::new(Shape::Quad(spanned));
        let mut hit = ObjectCollision::default();
        assert!(obj.trace(
            &Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0)),
            &mut hit
        ));
        assert!((hit.point - Vec3::ZERO).length() < 1e-5);
    }

    #[test]
    fn test_cuboid_face_hit() {
        let obj = Object::new(Shape::Cuboid(CuboidShape::new(Vec3::ZERO, 2.0, 2.0, 2.0)));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0));
        let mut hit = ObjectCollision::default();
        assert!(obj.trace(&ray, &mut hit));
        assert!((hit.point.z + 1.0).abs() < 1e-5);
        assert!((hit.surface_normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);

        // A ray that hits face planes but misses every face.
        let graze = Ray::new(Vec3::new(5.0, 5.0, -5.0), Vec3::new(5.0, 5.0, 5.0));
        let mut hit = ObjectCollision::default();
        assert!(!obj.trace(&graze, &mut hit));
    }

    #[test]
    fn test_mesh_object_interpolates_normals() {
        let data = MeshData {
            vertices: vec![
                Vec3::new(-1.0, -1.0, 2.0),
                Vec3::new(1.0, -1.0, 2.0),
                Vec3::new(0.0, 1.0, 2.0),
            ],
            normals: vec![
                Vec3::new(-1.0, 0.0, -1.0).normalize(),
                Vec3::new(1.0, 0.0, -1.0).normalize(),
                Vec3::new(0.0, 1.0, -1.0).normalize(),
            ],
            texcoords: Vec::new(),
            faces: vec![MeshFace {
                vertex_indices: [0, 1, 2],
                normal_indices: [0, 1, 2],
                ..Default::default()
            }],
        };
        let obj = Object::new(Shape::Mesh(MeshShape::from_data(data, Mat4::IDENTITY)));

        let ray = Ray::new(Vec3::new(0.0, -0.2, 0.0), Vec3::new(0.0, -0.2, 4.0));
        let mut hit = ObjectCollision::default();
        assert!(obj.trace(&ray, &mut hit));
        // The interpolated normal is a blend, not any single vertex normal.
        assert!(hit.surface_normal.z < 0.0);
        assert!(hit.surface_normal.x.abs() < 1.0);
    }

    #[test]
    fn test_mesh_transform_moves_hits() {
        let data = MeshData {
            vertices: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            normals: Vec::new(),
            texcoords: Vec::new(),
            faces: vec![MeshFace {
                vertex_indices: [0, 1, 2],
                ..Default::default()
            }],
        };
        let transform = Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        let shape = MeshShape::from_data(data, transform);
        assert!((shape.bounds.center().z - 3.0).abs() < 1e-5);

        let obj = Object::new(Shape::Mesh(shape));
        let ray = Ray::new(Vec3::new(0.0, -0.2, 0.0), Vec3::new(0.0, -0.2, 6.0));
        let mut hit = ObjectCollision::default();
        assert!(obj.trace(&ray, &mut hit));
        assert!((hit.point.z - 3.0).abs() < 1e-4);
    }
}
