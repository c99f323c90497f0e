//! Shared octree plumbing for the mesh and scene hierarchies.
//!
//! Both trees use the same topology: an internal node splits its box into
//! eight octants through three axis-aligned planes at the box center. The
//! child slot for a point is encoded as `bit0 = x >= cx`, `bit1 = z >= cz`,
//! `bit2 = y >= cy`; stepping across a split plane during traversal flips
//! exactly one of those bits.

use lumen_math::intersect::{point_in_bounds, ray_intersect_plane};
use lumen_math::{Bounds, Collision, Plane, Ray, Vec3};

/// Index of the octant containing `point`, relative to the box center.
pub(crate) fn closest_child(bounds: &Bounds, point: Vec3) -> usize {
    let trace_dir = point - bounds.center();
    let x_test = (trace_dir.x >= 0.0) as usize;
    let y_test = (trace_dir.y >= 0.0) as usize;
    let z_test = (trace_dir.z >= 0.0) as usize;
    x_test | (z_test << 1) | (y_test << 2)
}

/// Bounds of octant `index` inside `parent`.
pub(crate) fn child_bounds(parent: &Bounds, index: usize) -> Bounds {
    let min = parent.min;
    let center = parent.center();
    let half_x = Vec3::new(center.x - min.x, 0.0, 0.0);
    let half_y = Vec3::new(0.0, center.y - min.y, 0.0);
    let half_z = Vec3::new(0.0, 0.0, center.z - min.z);
    let node_span = half_x + half_y + half_z;

    let node_min = min
        + half_x * (index % 2) as f32
        + half_y * (index >> 2) as f32
        + half_z * ((index % 4) >> 1) as f32;
    Bounds::from_points(node_min, node_min + node_span)
}

/// The three split planes through the box center, in x, y, z order.
pub(crate) fn split_planes(bounds: &Bounds) -> [Plane; 3] {
    let center = bounds.center();
    [
        Plane::from_point_normal(Vec3::X, center),
        Plane::from_point_normal(Vec3::Y, center),
        Plane::from_point_normal(Vec3::Z, center),
    ]
}

/// Child access during traversal, abstracted over the two tree types so the
/// stepping loop below is written once.
pub(crate) trait OctantChildren {
    type Hit;

    /// Bounds of the child in the given slot, if one exists.
    fn child_bounds(&self, index: usize) -> Option<&Bounds>;
    /// Recurse into the child in the given slot.
    fn trace_child(&self, index: usize, ray: &Ray, hit: &mut Self::Hit) -> bool;
    /// World position of the current best hit.
    fn hit_point(hit: &Self::Hit) -> Vec3;
}

/// Walk the octants an internal node's ray passes through, closest first.
///
/// Starting from the octant of the ray's entry point (or of the ray start,
/// when it begins inside the node), the loop recurses into the current
/// octant and then steps across whichever split plane the ray crosses next,
/// flipping that axis's bit. A ray crosses at most four octants, and the
/// walk stops early once a hit lands inside the octant that produced it.
/// Ties between split planes fall through the strict comparisons and end
/// the walk.
pub(crate) fn trace_octants<T: OctantChildren>(
    tree: &T,
    bounds: &Bounds,
    planes: &[Plane; 3],
    node_hit: &Collision,
    ray: &Ray,
    hit: &mut T::Hit,
) -> bool {
    let mut trace_result = false;
    let mut internal_ray = *ray;
    let mut plane_hit = [false; 3];
    let mut plane_param = [f32::INFINITY; 3];
    let mut plane_point = [Vec3::ZERO; 3];

    let probe = |ray: &Ray, hits: &mut [bool; 3], params: &mut [f32; 3], points: &mut [Vec3; 3]| {
        for axis in 0..3 {
            if let Some(c) = ray_intersect_plane(&planes[axis], ray) {
                hits[axis] = true;
                params[axis] = c.param;
                points[axis] = c.point;
            }
        }
    };

    let mut closest_node;
    if !point_in_bounds(bounds, ray.start) {
        internal_ray.start = node_hit.point;
        closest_node = closest_child(bounds, node_hit.point);
        probe(&internal_ray, &mut plane_hit, &mut plane_param, &mut plane_point);
    } else {
        closest_node = closest_child(bounds, ray.start);
        probe(ray, &mut plane_hit, &mut plane_param, &mut plane_point);

        // No split plane ahead: the ray exits through the octant it starts
        // in, so only that child needs checking.
        if !plane_hit[0] && !plane_hit[1] && !plane_hit[2] {
            if tree.child_bounds(closest_node).is_some() {
                return tree.trace_child(closest_node, ray, hit);
            }
            return false;
        }
    }

    for _ in 0..4 {
        if let Some(child_bb) = tree.child_bounds(closest_node) {
            if tree.trace_child(closest_node, ray, hit) {
                trace_result = true;
                if point_in_bounds(child_bb, T::hit_point(hit)) {
                    break;
                }
            }
        }

        if plane_hit[0] && plane_param[0] < plane_param[1] && plane_param[0] < plane_param[2] {
            // x is the closest plane; step into the adjacent x octant.
            closest_node ^= 0x1;
            plane_hit[0] = false;
            internal_ray.start = plane_point[0];
            plane_param[0] = f32::INFINITY;
        } else if plane_hit[1] && plane_param[1] < plane_param[2] && plane_param[1] < plane_param[0]
        {
            // y is the closest plane; step into the adjacent y octant.
            closest_node ^= 0x4;
            plane_hit[1] = false;
            internal_ray.start = plane_point[1];
            plane_param[1] = f32::INFINITY;
        } else if plane_hit[2] && plane_param[2] < plane_param[1] && plane_param[2] < plane_param[0]
        {
            // z is the closest plane; step into the adjacent z octant.
            closest_node ^= 0x2;
            plane_hit[2] = false;
            internal_ray.start = plane_point[2];
            plane_param[2] = f32::INFINITY;
        } else {
            break;
        }

        if !point_in_bounds(bounds, internal_ray.start) {
            break;
        }
    }

    trace_result
}
