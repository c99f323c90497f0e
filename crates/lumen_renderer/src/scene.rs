//! Scene container: objects, sky, cameras, and trace dispatch.

use std::path::Path;
use std::sync::Arc;

use lumen_math::{Mat4, Plane, Ray, Vec3};
use rand::rngs::SmallRng;

use crate::camera::Camera;
use crate::material::{Material, MaterialHandle, SurfaceSample};
use crate::object::{
    CuboidShape, DiscShape, MeshShape, Object, ObjectCollision, PlaneShape, QuadShape, Shape,
    SphereShape,
};
use crate::scene_bvh::SceneBvh;

/// Intentional brightness bias applied to sky lookups.
const SKY_SAMPLE_SCALE: f32 = 3.0;

/// A renderable scene.
///
/// Objects are owned by the scene; the acceleration tree references them by
/// index and is rebuilt by [`Scene::optimize`]. Adding an object invalidates
/// the tree until the next optimize call.
pub struct Scene {
    sky_material: MaterialHandle,
    cameras: Vec<Camera>,
    objects: Vec<Object>,
    object_tree: SceneBvh,
    is_tree_valid: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            sky_material: Arc::new(Material::light(Vec3::ZERO)),
            cameras: Vec::new(),
            objects: Vec::new(),
            object_tree: SceneBvh::default(),
            is_tree_valid: false,
        }
    }

    pub fn set_sky_material(&mut self, material: MaterialHandle) {
        self.sky_material = material;
    }

    pub fn sky_material(&self) -> &MaterialHandle {
        &self.sky_material
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.push(camera);
    }

    fn push_object(&mut self, shape: Shape) -> &mut Object {
        self.is_tree_valid = false;
        self.objects.push(Object::new(shape));
        let index = self.objects.len() - 1;
        &mut self.objects[index]
    }

    /// Load a mesh object from an OBJ file and add it to the scene.
    pub fn add_mesh_object(
        &mut self,
        filename: impl AsRef<Path>,
        invert_normals: bool,
        transform: Mat4,
    ) -> &mut Object {
        self.push_object(Shape::Mesh(MeshShape::load(
            filename,
            invert_normals,
            transform,
        )))
    }

    pub fn add_spherical_object(&mut self, origin: Vec3, radius: f32) -> &mut Object {
        self.push_object(Shape::Sphere(SphereShape::new(origin, radius)))
    }

    pub fn add_planar_object(&mut self, plane: Plane) -> &mut Object {
        self.push_object(Shape::Plane(PlaneShape::new(plane)))
    }

    pub fn add_disc_object(&mut self, origin: Vec3, normal: Vec3, radius: f32) -> &mut Object {
        self.push_object(Shape::Disc(DiscShape::new(origin, normal, radius)))
    }

    pub fn add_cuboid_object(
        &mut self,
        origin: Vec3,
        width: f32,
        height: f32,
        depth: f32,
    ) -> &mut Object {
        self.push_object(Shape::Cuboid(CuboidShape::new(origin, width, height, depth)))
    }

    /// Add a quad from a center, facing direction, and edge lengths.
    pub fn add_quad_object(
        &mut self,
        origin: Vec3,
        normal: Vec3,
        width: f32,
        height: f32,
    ) -> &mut Object {
        self.push_object(Shape::Quad(QuadShape::new(origin, normal, width, height)))
    }

    /// Add a quad from an upper-left corner and two spanning edge vectors.
    pub fn add_quad_object_from_span(&mut self, position: Vec3, u: Vec3, v: Vec3) -> &mut Object {
        self.push_object(Shape::Quad(QuadShape::from_span(position, u, v)))
    }

    /// Build the object tree. The tree is only worth using past a certain
    /// object count; below that the derived depth is zero or negative and
    /// tracing stays linear.
    pub fn optimize(&mut self) {
        self.is_tree_valid = false;
        let ideal_depth =
            ((self.objects.len() as f32).ln() / 8.0f32.ln() + 0.5).floor() as i32 - 2;
        if ideal_depth > 0 {
            self.object_tree = SceneBvh::build(&self.objects, ideal_depth as u32);
            self.is_tree_valid = true;
        }
    }

    /// Closest-hit trace against the scene.
    ///
    /// Back-facing hits have their normal inverted and are flagged internal,
    /// so materials always see a normal oriented against the incoming ray.
    pub fn trace(&self, ray: &Ray, hit: &mut ObjectCollision) -> bool {
        let mut collision_detected = false;

        if self.is_tree_valid {
            collision_detected |= self.object_tree.trace(&self.objects, ray, hit);
        } else {
            for object in &self.objects {
                collision_detected |= object.trace(ray, hit);
            }
        }

        if collision_detected {
            let collision_plane = Plane::from_point_normal(hit.surface_normal, hit.point);
            if collision_plane.distance(ray.start) < 0.0 {
                hit.surface_normal = -hit.surface_normal;
                hit.is_internal = true;
            }
        }
        collision_detected
    }

    /// Sky radiance along a view direction.
    pub fn sample_sky(&self, depth: u32, view: Vec3, rng: &mut SmallRng) -> Vec3 {
        let tex_coords = lumen_math::mapping::sphere_map_texcoords(view);
        let sample = SurfaceSample {
            depth,
            sample_pos: Vec3::ZERO,
            view_pos: Vec3::ZERO,
            view_dir: view,
            light_pos: Vec3::ZERO,
            light_dir: Vec3::ZERO,
            light_color: Vec3::ZERO,
            normal: Vec3::ZERO,
            texcoords: tex_coords,
            is_internal: false,
        };
        self.sky_material.sample(&sample, rng) * SKY_SAMPLE_SCALE
    }
}
