use crate::Vec3;

/// A finite ray segment from `start` to `stop`.
///
/// `dir` is `stop - start` and is not required to be unit length. Parametric
/// values produced by the intersection kernel are fractions of this segment,
/// so a valid hit always satisfies `0.0 <= param <= 1.0`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub start: Vec3,
    pub stop: Vec3,
    pub dir: Vec3,
}

impl Ray {
    /// Create a new ray between two points.
    pub fn new(start: Vec3, stop: Vec3) -> Self {
        Self {
            start,
            stop,
            dir: stop - start,
        }
    }

    /// Get the point along the ray at parameter t.
    pub fn at(&self, t: f32) -> Vec3 {
        self.start + self.dir * t
    }
}

/// Result of a primitive intersection test.
///
/// `param` is the parametric value along the ray segment. A fresh collision
/// starts at 2.0 ("past the end of the segment") so any real hit compares
/// as closer.
#[derive(Debug, Copy, Clone)]
pub struct Collision {
    pub param: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

impl Default for Collision {
    fn default() -> Self {
        Self {
            param: 2.0,
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
        }
    }
}
