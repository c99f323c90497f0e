use crate::{Bounds, Plane, Quat, Vec3};

/// An oriented box: a center, three orthonormal axes, and half extents.
///
/// Starts axis-aligned and may be rotated about an arbitrary axis. Face
/// planes are ordered in opposite pairs, (axis-, axis+) for x, y, z, so
/// `index / 2` identifies the axis pair.
#[derive(Debug, Clone, Copy)]
pub struct Cuboid {
    center: Vec3,
    axes: [Vec3; 3],
    half: [f32; 3],
}

impl Cuboid {
    pub fn new(origin: Vec3, width: f32, height: f32, depth: f32) -> Self {
        Self {
            center: origin,
            axes: [Vec3::X, Vec3::Y, Vec3::Z],
            half: [width * 0.5, height * 0.5, depth * 0.5],
        }
    }

    /// Rotate the box about an axis through its center. `angle` is radians.
    pub fn rotate(&mut self, axis: Vec3, angle: f32) {
        let rotation = Quat::from_axis_angle(axis.normalize_or_zero(), angle);
        for a in &mut self.axes {
            *a = rotation * *a;
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// One of the six face planes with an outward normal.
    pub fn face_plane(&self, index: usize) -> Plane {
        let axis = self.axes[index / 2];
        let half = self.half[index / 2];
        let sign = if index % 2 == 0 { -1.0 } else { 1.0 };
        Plane::from_point_normal(axis * sign, self.center + axis * half * sign)
    }

    /// Axis-aligned bounds of the (possibly rotated) box.
    pub fn bounds(&self) -> Bounds {
        let mut bb = Bounds::EMPTY;
        for i in 0..8 {
            let corner = self.center
                + self.axes[0] * self.half[0] * if i & 1 == 0 { -1.0 } else { 1.0 }
                + self.axes[1] * self.half[1] * if i & 2 == 0 { -1.0 } else { 1.0 }
                + self.axes[2] * self.half[2] * if i & 4 == 0 { -1.0 } else { 1.0 };
            bb.expand(corner);
        }
        bb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn test_face_planes_pair_up() {
        let cube = Cuboid::new(Vec3::ZERO, 2.0, 2.0, 2.0);
        for i in 0..6 {
            let plane = cube.face_plane(i);
            let opposite = cube.face_plane(i ^ 1);
            assert!((plane.normal() + opposite.normal()).length() < 1e-6);
            assert!(plane.distance(cube.center()) < 0.0);
        }
    }

    #[test]
    fn test_bounds_cover_rotation() {
        let mut cube = Cuboid::new(Vec3::ZERO, 2.0, 2.0, 2.0);
        cube.rotate(Vec3::Y, FRAC_PI_4);
        let bb = cube.bounds();
        // A unit cube rotated 45 degrees about Y spans sqrt(2) in x/z.
        assert!((bb.max.x - 2.0f32.sqrt()).abs() < 1e-5);
        assert!((bb.max.z - 2.0f32.sqrt()).abs() < 1e-5);
        assert!((bb.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_point_behind_all_planes_is_inside() {
        let cube = Cuboid::new(Vec3::new(1.0, 0.0, 0.0), 2.0, 4.0, 6.0);
        let inside = Vec3::new(1.5, 1.0, -2.0);
        let outside = Vec3::new(3.5, 0.0, 0.0);
        assert!((0..6).all(|i| cube.face_plane(i).distance(inside) <= 0.0));
        assert!((0..6).any(|i| cube.face_plane(i).distance(outside) > 0.0));
    }
}
