//! The recursive path integrator and its banded worker pool.
//!
//! A frame is rendered by splitting the image into horizontal bands, one
//! per worker. Workers write to disjoint pixel ranges of the frame and the
//! first-bounce cache, so the scene is the only shared state and it is
//! read-only for the duration of the frame.

use std::time::Instant;

use lumen_math::{Ray, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::cache::{CacheBand, ImagePlaneCache};
use crate::camera::{Camera, ViewBasis};
use crate::frame::{Frame, FrameBand, TraceResult};
use crate::object::ObjectCollision;
use crate::material::SurfaceSample;
use crate::scene::Scene;

/// Hard cap on recursion.
pub const MAX_TRACE_DEPTH: u32 = 32;

/// Continuation rays start this far off the surface so they cannot strike
/// the object they just left.
const TRACE_STEP_OBJECT_OFFSET: f32 = 0.03;

/// One bounce of the walk. Returns the sampled color and the world position
/// the color arrived from (the next collision point, or the sky ray's end).
fn trace_step(
    viewer: &Camera,
    ray: &Ray,
    scene: &Scene,
    depth: u32,
    x: u32,
    y: u32,
    mut cache: Option<&mut CacheBand<'_>>,
    result: &mut TraceResult,
    rng: &mut SmallRng,
) -> (Vec3, Vec3) {
    if depth >= MAX_TRACE_DEPTH {
        return (Vec3::ZERO, Vec3::ZERO);
    }

    // Fast render allows a single bounce and then pretends the walk ended
    // in a white sky.
    if viewer.fast_render_enabled && depth > 1 {
        return (Vec3::ONE, Vec3::ZERO);
    }

    result.ray_count = depth as u64 + 1;

    let mut collision_info = ObjectCollision::default();
    let mut needs_trace = true;

    if depth == 0 {
        // The primary bounce of a pixel never changes while the camera is
        // still, so replay the cached collision when one exists.
        if let Some(cached) = cache.as_ref().and_then(|c| c.fetch(x, y)) {
            collision_info = cached.clone();
            needs_trace = false;
        }
    }

    if needs_trace {
        if !scene.trace(ray, &mut collision_info) {
            let output = scene.sample_sky(depth, (ray.stop - ray.start).normalize(), rng);
            if depth == 0 {
                result.color = output;
                result.normal = ray.dir.normalize();
                result.material_id = scene.sky_material().id() as u64;
                result.depth = viewer.z_far;
            }
            return (output, ray.stop);
        }
        if depth == 0 {
            if let Some(cache) = cache.as_mut() {
                cache.store(&collision_info, x, y);
            }
        }
    }

    let hit_position = collision_info.point;
    let Some(material) = collision_info.surface_material.clone() else {
        return (Vec3::ZERO, hit_position);
    };

    let view_vector = (collision_info.point - ray.start).normalize();

    // The material decides where the indirect sample comes from.
    let reflection_vector = material.reflection(
        view_vector,
        collision_info.surface_normal,
        collision_info.is_internal,
        rng,
    );

    // Nudge the continuation ray off the surface so it cannot re-strike the
    // object it just left.
    let reflection_ray = Ray::new(
        collision_info.point + reflection_vector * TRACE_STEP_OBJECT_OFFSET,
        collision_info.point + reflection_vector * viewer.z_far,
    );

    let mut indirect_origin = Vec3::ZERO;
    let mut indirect_contribution = Vec3::ZERO;
    // Only walk deeper when the material will actually use the result.
    if material.will_use_indirect_light(reflection_vector, collision_info.surface_normal) {
        (indirect_contribution, indirect_origin) = trace_step(
            viewer,
            &reflection_ray,
            scene,
            depth + 1,
            x,
            y,
            cache.as_deref_mut(),
            result,
            rng,
        );
    }

    let output = material.sample(
        &SurfaceSample {
            depth,
            sample_pos: collision_info.point,
            view_pos: ray.start,
            view_dir: view_vector,
            light_pos: indirect_origin,
            light_dir: reflection_vector,
            light_color: indirect_contribution,
            normal: collision_info.surface_normal,
            texcoords: collision_info.surface_texcoords,
            is_internal: collision_info.is_internal,
        },
        rng,
    );

    if depth == 0 {
        result.color = output;
        result.normal = collision_info.surface_normal;
        result.material_id = material.id() as u64;
        result.depth = collision_info.point.distance(ray.start);
    }

    (output, hit_position)
}

/// Trace one full path for a pixel.
pub fn trace_pixel(
    viewer: &Camera,
    scene: &Scene,
    ray: &Ray,
    x: u32,
    y: u32,
    cache: Option<&mut CacheBand<'_>>,
    rng: &mut SmallRng,
) -> TraceResult {
    let mut result = TraceResult::default();
    trace_step(viewer, ray, scene, 0, x, y, cache, &mut result, rng);
    result
}

/// Render every pixel of one band, accumulating into the frame band.
/// Returns the number of rays traced.
pub fn render_band(
    viewer: &Camera,
    scene: &Scene,
    basis: &ViewBasis,
    mut band: FrameBand<'_>,
    mut cache: Option<CacheBand<'_>>,
    rng: &mut SmallRng,
) -> u64 {
    let width = band.width();
    let mut ray_count = 0u64;

    for y in band.y_start..band.y_stop {
        for x in 0..width {
            // Half-pixel jitter smooths out high-frequency object and
            // texel detail.
            let aa_jitter_x = rng.gen::<f32>() - 0.5;
            let aa_jitter_y = rng.gen::<f32>() - 0.5;

            let mut trajectory =
                basis.pixel_ray(viewer, x as f32 + aa_jitter_x, y as f32 + aa_jitter_y);
            if viewer.aperture_size > 0.0 {
                trajectory = basis.apply_depth_of_field(viewer, &trajectory, rng);
            }

            let result = trace_pixel(viewer, scene, &trajectory, x, y, cache.as_mut(), rng);
            ray_count += result.ray_count;
            band.write_result(&result, x, y);
        }
    }

    ray_count
}

/// Horizontal band partition `[H*k/B, H*(k+1)/B)`; the rounding puts any
/// remainder rows in the later bands.
fn band_ranges(height: u32, bands: u32) -> Vec<(u32, u32)> {
    (0..bands)
        .map(|k| {
            let y_start = (height as u64 * k as u64 / bands as u64) as u32;
            let y_stop = (height as u64 * (k + 1) as u64 / bands as u64) as u32;
            (y_start, y_stop)
        })
        .collect()
}

/// Trace one accumulation pass of the scene into the frame.
///
/// The image is split into one band per worker; each worker owns its band's
/// pixels and cache entries for the duration of the pass. Debug builds run
/// the whole frame on a single band. `frame_seed` reseeds every worker, so
/// passes with different seeds draw different sample sequences.
pub fn trace_scene(
    viewer: &Camera,
    scene: &Scene,
    output: &mut Frame,
    mut cache: Option<&mut ImagePlaneCache>,
    frame_seed: u64,
) {
    let frame_start = Instant::now();
    let height = output.height();

    let band_count = if cfg!(debug_assertions) {
        1
    } else {
        rayon::current_num_threads().max(1) as u32
    };
    let ranges = band_ranges(height, band_count);
    let basis = ViewBasis::new(viewer, output.width(), height);

    let mut band_ray_counts = vec![0u64; ranges.len()];
    {
        let frame_bands = output.bands(&ranges);
        let cache_bands: Vec<Option<CacheBand<'_>>> = match cache.as_deref_mut() {
            Some(cache) => cache.bands(&ranges).into_iter().map(Some).collect(),
            None => ranges.iter().map(|_| None).collect(),
        };

        let basis = &basis;
        rayon::scope(|scope| {
            for (index, ((band, cache_band), ray_count)) in frame_bands
                .into_iter()
                .zip(cache_bands)
                .zip(band_ray_counts.iter_mut())
                .enumerate()
            {
                scope.spawn(move |_| {
                    let mut rng = SmallRng::seed_from_u64(
                        frame_seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15),
                    );
                    *ray_count = render_band(viewer, scene, basis, band, cache_band, &mut rng);
                });
            }
        });
    }

    let frame_number = output.frame_count();
    output.set_frame_count(frame_number + 1);

    if !viewer.fast_render_enabled {
        let total_rays: u64 = band_ray_counts.iter().sum();
        let frame_sec = frame_start.elapsed().as_secs_f32();
        log::info!(
            "Frame {} render time: {:.2} sec. Mrays/sec: {:.2}",
            frame_number,
            frame_sec,
            total_rays as f32 / (1_000_000.0 * frame_sec)
        );
    }
}

/// Distance from the camera to the surface visible at a pixel, or `z_far`
/// when the pixel sees sky. Drives focal-depth picking.
pub fn trace_range(viewer: &Camera, scene: &Scene, frame: &Frame, x: f32, y: f32) -> f32 {
    let basis = ViewBasis::new(viewer, frame.width(), frame.height());
    let trajectory = basis.pixel_ray(viewer, x, y);

    let mut collision_info = ObjectCollision::default();
    if !scene.trace(&trajectory, &mut collision_info) {
        return viewer.z_far;
    }
    (collision_info.point - viewer.origin).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use lumen_math::Plane;
    use std::sync::Arc;

    fn fixed_camera() -> Camera {
        Camera {
            origin: Vec3::new(0.0, 0.0, -10.0),
            target: Vec3::ZERO,
            aperture_size: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_band_ranges_cover_image() {
        for (height, bands) in [(480u32, 8u32), (10, 3), (7, 16), (1, 1)] {
            let ranges = band_ranges(height, bands);
            assert_eq!(ranges.len(), bands as usize);
            assert_eq!(ranges[0].0, 0);
            assert_eq!(ranges[ranges.len() - 1].1, height);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].1, pair[1].0);
            }
        }
    }

    #[test]
    fn test_empty_scene_renders_sky_everywhere() {
        let mut scene = Scene::new();
        scene.set_sky_material(Arc::new(Material::light(Vec3::new(0.1, 0.15, 0.2))));

        let viewer = fixed_camera();
        let mut frame = Frame::new(8, 8);
        trace_scene(&viewer, &scene, &mut frame, None, 42);

        // Sky color (0.3, 0.45, 0.6) after the x3 bias; blue channel gamma
        // corrects to 202.
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(frame.display_pixel(x, y)[2], 202);
                assert_eq!(frame.display_pixel(x, y), frame.display_pixel(0, 0));
            }
        }
        for &depth in frame.depth_buffer() {
            assert_eq!(depth, viewer.z_far);
        }
        for &id in frame.material_id_buffer() {
            assert_eq!(id, scene.sky_material().id() as u64);
        }
    }

    #[test]
    fn test_primary_sphere_hit_descriptors() {
        let mut scene = Scene::new();
        let red = Arc::new(Material::diffuse(Vec3::new(0.8, 0.0, 0.0)));
        scene
            .add_spherical_object(Vec3::ZERO, 1.0)
            .set_material(red.clone());

        let viewer = Camera {
            origin: Vec3::new(0.0, 0.0, -5.0),
            ..fixed_camera()
        };
        // Hand-built ray through the sphere center; the segment spans twice
        // the camera distance, so the hit parameter is 0.5*(d-1)/d.
        let ray = Ray::new(viewer.origin, Vec3::new(0.0, 0.0, 5.0));
        let mut rng = SmallRng::seed_from_u64(3);
        let result = trace_pixel(&viewer, &scene, &ray, 0, 0, None, &mut rng);

        assert!((result.depth - 4.0).abs() < 1e-4);
        assert!((result.normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
        assert_eq!(result.material_id, red.id() as u64);
    }

    #[test]
    fn test_trace_range_distance_and_sky() {
        let mut scene = Scene::new();
        scene.add_spherical_object(Vec3::ZERO, 1.0);

        let viewer = fixed_camera();
        let frame = Frame::new(64, 64);

        let center = trace_range(&viewer, &scene, &frame, 31.5, 31.5);
        assert!((center - 9.0).abs() < 0.05);

        let corner = trace_range(&viewer, &scene, &frame, 0.0, 0.0);
        assert_eq!(corner, viewer.z_far);
    }

    #[test]
    fn test_first_bounce_cache_is_idempotent() {
        let mut scene = Scene::new();
        scene.set_sky_material(Arc::new(Material::light(Vec3::splat(0.5))));
        // A quad large enough to fill the whole view.
        scene
            .add_quad_object(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 0.0, -1.0), 100.0, 100.0)
            .set_material(Arc::new(Material::diffuse(Vec3::splat(0.7))));

        let viewer = fixed_camera();
        let mut frame = Frame::new(16, 16);
        let mut cache = ImagePlaneCache::new(16, 16);

        trace_scene(&viewer, &scene, &mut frame, Some(&mut cache), 1);
        let depth_first = frame.depth_buffer().to_vec();
        let normal_first = frame.normal_buffer().to_vec();
        let material_first = frame.material_id_buffer().to_vec();

        // A second pass with different jitter replays the cached primary
        // hits, so the descriptor buffers do not move.
        trace_scene(&viewer, &scene, &mut frame, Some(&mut cache), 2);
        assert_eq!(frame.depth_buffer(), depth_first.as_slice());
        assert_eq!(frame.normal_buffer(), normal_first.as_slice());
        assert_eq!(frame.material_id_buffer(), material_first.as_slice());
        assert_eq!(frame.sample_count(8, 8), 2);
    }

    #[test]
    fn test_fast_render_caps_bounces() {
        let mut scene = Scene::new();
        let mirror = Arc::new(Material::mirror(Vec3::ONE));
        // Two facing mirrors would bounce until the depth cap.
        scene
            .add_planar_object(Plane::from_point_normal(Vec3::Z, Vec3::new(0.0, 0.0, 5.0)))
            .set_material(mirror.clone());
        scene
            .add_planar_object(Plane::from_point_normal(Vec3::Z, Vec3::new(0.0, 0.0, -15.0)))
            .set_material(mirror);

        let mut viewer = fixed_camera();
        let ray = Ray::new(viewer.origin, Vec3::new(0.0, 0.0, 5.0));

        let mut rng = SmallRng::seed_from_u64(5);
        let slow = trace_pixel(&viewer, &scene, &ray, 0, 0, None, &mut rng);
        assert!(slow.ray_count > 2);

        viewer.fast_render_enabled = true;
        let fast = trace_pixel(&viewer, &scene, &ray, 0, 0, None, &mut rng);
        assert!(fast.ray_count <= 2);
    }

    #[test]
    fn test_indirect_light_reaches_diffuse_surface() {
        let mut scene = Scene::new();
        // A diffuse floor lit only by the sky.
        scene.set_sky_material(Arc::new(Material::light(Vec3::ONE)));
        scene
            .add_quad_object(Vec3::ZERO, Vec3::Y, 50.0, 50.0)
            .set_material(Arc::new(Material::diffuse(Vec3::new(0.8, 0.8, 0.8))));

        let viewer = Camera {
            origin: Vec3::new(0.0, 5.0, -5.0),
            ..fixed_camera()
        };
        let ray = Ray::new(viewer.origin, Vec3::new(0.0, -5.0, 5.0));

        // Average many paths; bounced sky light must show up.
        let mut rng = SmallRng::seed_from_u64(8);
        let mut total = Vec3::ZERO;
        for _ in 0..64 {
            total += trace_pixel(&viewer, &scene, &ray, 0, 0, None, &mut rng).color;
        }
        let mean = total / 64.0;
        assert!(mean.x > 0.1, "floor stayed dark: {mean:?}");
    }
}
