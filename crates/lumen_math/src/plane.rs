use crate::Vec3;

/// An infinite plane in coefficient form `a*x + b*y + c*z + d = 0`.
///
/// The normal `(a, b, c)` is kept unit length, so `distance` returns a
/// signed euclidean distance.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Plane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Plane {
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// Build a plane from a normal and a point on the plane. The normal is
    /// normalized here so callers may pass unnormalized inputs.
    pub fn from_point_normal(normal: Vec3, point: Vec3) -> Self {
        let n = normal.normalize_or_zero();
        Self {
            a: n.x,
            b: n.y,
            c: n.z,
            d: -n.dot(point),
        }
    }

    #[inline]
    pub fn normal(&self) -> Vec3 {
        Vec3::new(self.a, self.b, self.c)
    }

    /// Signed distance from a point to the plane.
    #[inline]
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal().dot(point) + self.d
    }

    /// True if all four coefficients are zero (an unset plane).
    pub fn is_zero(&self) -> bool {
        self.a == 0.0 && self.b == 0.0 && self.c == 0.0 && self.d == 0.0
    }
}
