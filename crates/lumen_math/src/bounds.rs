use crate::{Plane, Vec3};

/// Axis-aligned bounding box used by the octree acceleration structures.
///
/// An empty box has `min > max` on every axis; expanding it with a point
/// snaps it to that point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a box from two corner points (in any order).
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand the box to include a point.
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Expand the box to include another box.
    pub fn union(&mut self, other: &Bounds) {
        if !other.is_empty() {
            self.expand(other.min);
            self.expand(other.max);
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn volume(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let span = self.max - self.min;
        span.x * span.y * span.z
    }

    /// Pad the box by `epsilon` on every axis. Used to give flat primitives
    /// a non-zero extent before they enter an octree.
    pub fn inflate(&self, epsilon: f32) -> Bounds {
        Bounds {
            min: self.min - Vec3::splat(epsilon),
            max: self.max + Vec3::splat(epsilon),
        }
    }

    /// One of the six face planes with an outward-facing normal.
    ///
    /// Faces are ordered in opposite pairs: (x-, x+), (y-, y+), (z-, z+),
    /// so `index / 2` identifies the axis and `index ^ 1` the opposite face.
    pub fn face_plane(&self, index: usize) -> Plane {
        let axis = [Vec3::X, Vec3::Y, Vec3::Z][index / 2];
        if index % 2 == 0 {
            Plane::from_point_normal(-axis, self.min)
        } else {
            Plane::from_point_normal(axis, self.max)
        }
    }
}
