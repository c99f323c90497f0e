//! Texture coordinate generation for analytic surfaces.

use crate::{Vec2, Vec3};
use std::f32::consts::PI;

/// Spherical environment mapping for a direction vector.
///
/// Used both for sphere surfaces (fed the surface normal) and for sky
/// lookups (fed the view direction).
pub fn sphere_map_texcoords(dir: Vec3) -> Vec2 {
    let d = dir.normalize_or_zero();
    let u = 0.5 + d.z.atan2(d.x) / (2.0 * PI);
    let v = 0.5 - d.y.clamp(-1.0, 1.0).asin() / PI;
    Vec2::new(u, v)
}

/// Planar mapping: project the point onto the two axes least aligned with
/// the surface normal.
pub fn planar_map_texcoords(point: Vec3, normal: Vec3) -> Vec2 {
    let ax = normal.x.abs();
    let ay = normal.y.abs();
    let az = normal.z.abs();

    if ax >= ay && ax >= az {
        Vec2::new(point.y, point.z)
    } else if ay >= az {
        Vec2::new(point.x, point.z)
    } else {
        Vec2::new(point.x, point.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_map_range() {
        let dirs = [
            Vec3::X,
            -Vec3::X,
            Vec3::Y,
            -Vec3::Y,
            Vec3::Z,
            Vec3::new(0.3, -0.8, 0.5).normalize(),
        ];
        for d in dirs {
            let uv = sphere_map_texcoords(d);
            assert!((0.0..=1.0).contains(&uv.x), "u out of range for {d:?}");
            assert!((0.0..=1.0).contains(&uv.y), "v out of range for {d:?}");
        }
    }

    #[test]
    fn test_sphere_map_poles() {
        assert!((sphere_map_texcoords(Vec3::Y).y - 0.0).abs() < 1e-6);
        assert!((sphere_map_texcoords(-Vec3::Y).y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_planar_map_picks_off_axes() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(planar_map_texcoords(p, Vec3::Y), Vec2::new(1.0, 3.0));
        assert_eq!(planar_map_texcoords(p, Vec3::X), Vec2::new(2.0, 3.0));
        assert_eq!(planar_map_texcoords(p, Vec3::Z), Vec2::new(1.0, 2.0));
    }
}
