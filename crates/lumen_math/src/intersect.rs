//! Ray/primitive intersection kernel.
//!
//! Every test is parameterized over a finite [`Ray`] segment: reported
//! `param` values are fractions of `stop - start`, so hits satisfy
//! `0.0 <= param <= 1.0`. NaN parameters from degenerate inputs fail the
//! range checks and report a miss.

use crate::{Bounds, Collision, Plane, Ray, Vec2, Vec3};

/// Intersect a ray with an infinite plane. The test is two-sided; the
/// returned normal is the plane's own normal regardless of approach side.
pub fn ray_intersect_plane(plane: &Plane, ray: &Ray) -> Option<Collision> {
    let denom = plane.normal().dot(ray.dir);
    let t = -plane.distance(ray.start) / denom;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    Some(Collision {
        param: t,
        point: ray.at(t),
        normal: plane.normal(),
    })
}

/// Intersect a ray with a sphere. Reports the nearest intersection in range,
/// falling back to the far root when the ray starts inside the sphere. The
/// normal always points outward; interior hits are reoriented by the caller.
pub fn ray_intersect_sphere(origin: Vec3, radius: f32, ray: &Ray) -> Option<Collision> {
    let oc = origin - ray.start;
    let a = ray.dir.length_squared();
    let h = ray.dir.dot(oc);
    let c = oc.length_squared() - radius * radius;

    let discriminant = h * h - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrtd = discriminant.sqrt();

    let mut root = (h - sqrtd) / a;
    if root < 0.0 {
        root = (h + sqrtd) / a;
    }
    if !(0.0..=1.0).contains(&root) {
        return None;
    }

    let point = ray.at(root);
    Some(Collision {
        param: root,
        point,
        normal: (point - origin) / radius,
    })
}

/// Slab test against an axis-aligned box. The returned collision carries the
/// entry parameter, clamped to the start of the segment when the ray begins
/// inside the box.
pub fn ray_intersect_bounds(bounds: &Bounds, ray: &Ray) -> Option<Collision> {
    let mut t_min = 0.0f32;
    let mut t_max = 1.0f32;

    for axis in 0..3 {
        let inv = 1.0 / ray.dir[axis];
        let mut t0 = (bounds.min[axis] - ray.start[axis]) * inv;
        let mut t1 = (bounds.max[axis] - ray.start[axis]) * inv;
        if inv < 0.0 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_max <= t_min {
            return None;
        }
    }

    Some(Collision {
        param: t_min,
        point: ray.at(t_min),
        normal: Vec3::ZERO,
    })
}

#[inline]
pub fn point_in_bounds(bounds: &Bounds, point: Vec3) -> bool {
    point.x >= bounds.min.x
        && point.x <= bounds.max.x
        && point.y >= bounds.min.y
        && point.y <= bounds.max.y
        && point.z >= bounds.min.z
        && point.z <= bounds.max.z
}

#[inline]
pub fn bounds_intersect_bounds(a: &Bounds, b: &Bounds) -> bool {
    a.min.x <= b.max.x
        && b.min.x <= a.max.x
        && a.min.y <= b.max.y
        && b.min.y <= a.max.y
        && a.min.z <= b.max.z
        && b.min.z <= a.max.z
}

/// Separating-axis test between a triangle and an axis-aligned box.
///
/// Checks the three box axes, the triangle's plane, and the nine edge cross
/// products. Used while distributing faces into octree children.
pub fn triangle_intersect_bounds(v0: Vec3, v1: Vec3, v2: Vec3, bounds: &Bounds) -> bool {
    let center = bounds.center();
    let half = (bounds.max - bounds.min) * 0.5;

    // Work in box-centered coordinates.
    let a = v0 - center;
    let b = v1 - center;
    let c = v2 - center;

    let e0 = b - a;
    let e1 = c - b;
    let e2 = a - c;

    // Box axes: equivalent to AABB overlap of the triangle bounds.
    for axis in 0..3 {
        let min = a[axis].min(b[axis]).min(c[axis]);
        let max = a[axis].max(b[axis]).max(c[axis]);
        if min > half[axis] || max < -half[axis] {
            return false;
        }
    }

    // Triangle plane.
    let n = e0.cross(e1);
    let dist = n.dot(a);
    let radius = half.x * n.x.abs() + half.y * n.y.abs() + half.z * n.z.abs();
    if dist.abs() > radius {
        return false;
    }

    // Nine cross-product axes between triangle edges and box axes.
    let edges = [e0, e1, e2];
    let verts = [a, b, c];
    for edge in edges {
        for axis in 0..3 {
            let mut axis_vec = Vec3::ZERO;
            axis_vec[axis] = 1.0;
            let test_axis = edge.cross(axis_vec);

            let p0 = test_axis.dot(verts[0]);
            let p1 = test_axis.dot(verts[1]);
            let p2 = test_axis.dot(verts[2]);
            let min = p0.min(p1).min(p2);
            let max = p0.max(p1).max(p2);

            let r = half.x * test_axis.x.abs()
                + half.y * test_axis.y.abs()
                + half.z * test_axis.z.abs();
            if min > r || max < -r {
                return false;
            }
        }
    }

    true
}

/// Face normal of a triangle with counter-clockwise winding.
#[inline]
pub fn calculate_normal(p0: Vec3, p1: Vec3, p2: Vec3) -> Vec3 {
    (p1 - p0).cross(p2 - p0).normalize_or_zero()
}

/// Intersect a ray with a triangle whose plane has been precomputed.
///
/// On a hit, `bary` holds the (u, v) weights of `v1` and `v2`; `v0` carries
/// the remaining `1 - u - v`.
pub fn ray_intersect_triangle(
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    face_plane: &Plane,
    ray: &Ray,
) -> Option<(Collision, Vec2)> {
    let hit = ray_intersect_plane(face_plane, ray)?;

    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let dp = hit.point - v0;

    let d00 = e1.dot(e1);
    let d01 = e1.dot(e2);
    let d11 = e2.dot(e2);
    let d20 = dp.dot(e1);
    let d21 = dp.dot(e2);

    let denom = d00 * d11 - d01 * d01;
    let u = (d11 * d20 - d01 * d21) / denom;
    let v = (d00 * d21 - d01 * d20) / denom;

    if u < 0.0 || v < 0.0 || u + v > 1.0 {
        return None;
    }

    Some((hit, Vec2::new(u, v)))
}

/// Interpolate a per-vertex attribute at barycentric weights (u, v).
#[inline]
pub fn interpolate_barycentric(a0: Vec3, a1: Vec3, a2: Vec3, u: f32, v: f32) -> Vec3 {
    a0 * (1.0 - u - v) + a1 * u + a2 * v
}
