//! Camera model and primary-ray generation.

use lumen_math::intersect::ray_intersect_plane;
use lumen_math::{Plane, Ray, Vec3};
use rand::rngs::SmallRng;

use crate::sampling::uniform_disc;

/// A pinhole camera with an optional thin-lens aperture.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// Distance from the origin to the near clipping plane.
    pub z_near: f32,
    /// Distance from the origin to the far clipping plane.
    pub z_far: f32,
    /// The position of the camera.
    pub origin: Vec3,
    /// The focus target of the camera.
    pub target: Vec3,
    /// Vertical field of view, in degrees.
    pub fov_y: f32,
    /// Lens radius; zero disables depth of field.
    pub aperture_size: f32,
    /// Distance to the plane of perfect focus.
    pub focal_depth: f32,
    /// Caps bounces at two and returns white past the cap, for interactive
    /// motion.
    pub fast_render_enabled: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            z_near: 1.0,
            z_far: 10_000.0,
            origin: Vec3::new(0.0, 0.0, -200.0),
            target: Vec3::ZERO,
            fov_y: 45.0,
            aperture_size: 1.5,
            focal_depth: 80.0,
            fast_render_enabled: false,
        }
    }
}

impl Camera {
    pub fn new(origin: Vec3, target: Vec3) -> Self {
        Self {
            origin,
            target,
            ..Default::default()
        }
    }
}

/// Per-frame view-space vectors derived from a camera and an image size.
///
/// The projection plane sits at `z_far` along the forward axis; pixel rays
/// run from the camera origin to points on that plane.
pub struct ViewBasis {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    width: u32,
    height: u32,
    half_proj_width: f32,
    half_proj_height: f32,
    proj_origin: Vec3,
    focal_plane: Plane,
}

impl ViewBasis {
    pub fn new(viewer: &Camera, width: u32, height: u32) -> Self {
        let aspect_ratio = width as f32 / height as f32;
        let fov_y = viewer.fov_y.to_radians();
        let fov_x = 2.0 * ((fov_y * 0.5).tan() * aspect_ratio).atan();

        let forward = (viewer.target - viewer.origin).normalize();
        let right = Vec3::Y.cross(forward).normalize();
        let up = forward.cross(right).normalize();

        Self {
            forward,
            right,
            up,
            width,
            height,
            half_proj_width: (fov_x * 0.5).tan() * viewer.z_far,
            half_proj_height: (fov_y * 0.5).tan() * viewer.z_far,
            proj_origin: viewer.origin + forward * viewer.z_far,
            focal_plane: Plane::from_point_normal(
                -forward,
                viewer.origin + forward * viewer.focal_depth,
            ),
        }
    }

    /// Ray from the camera origin through (possibly fractional) pixel
    /// coordinates on the projection plane.
    pub fn pixel_ray(&self, viewer: &Camera, x: f32, y: f32) -> Ray {
        let x_dist = self.half_proj_width * ((x / (self.width as f32 - 1.0)) * 2.0 - 1.0);
        let y_dist = self.half_proj_height * ((y / (self.height as f32 - 1.0)) * 2.0 - 1.0);
        let stop = self.proj_origin + self.right * x_dist + self.up * y_dist;
        Ray::new(viewer.origin, stop)
    }

    /// Thin-lens depth of field: jitter the ray start inside the aperture
    /// disc and re-aim through the ray's focal-plane intersection.
    pub fn apply_depth_of_field(&self, viewer: &Camera, ray: &Ray, rng: &mut SmallRng) -> Ray {
        let Some(focal_hit) = ray_intersect_plane(&self.focal_plane, ray) else {
            return *ray;
        };

        let disc = uniform_disc(rng) * viewer.aperture_size;
        let start = ray.start + self.right * disc.x + self.up * disc.y;
        let stop = start + (focal_hit.point - start).normalize() * viewer.z_far;
        Ray::new(start, stop)
    }
}
