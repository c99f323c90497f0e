//! Octree over the triangles of a single mesh.
//!
//! The tree stores face indices only; vertex and face arrays stay with the
//! owning [`MeshData`] and are borrowed at build and trace time. After the
//! build the mesh is treated as frozen.

use lumen_core::MeshData;
use lumen_math::intersect::{
    ray_intersect_bounds, ray_intersect_triangle, triangle_intersect_bounds,
};
use lumen_math::{intersect, Bounds, Plane, Ray, Vec2, Vec3};

use crate::octree;

const MAX_FACES_PER_NODE: usize = 16;
const MAX_SUBDIVISION_DEPTH: u32 = 4;
const MIN_SUBDIVISION_VOLUME: f32 = 0.001;

/// Closest triangle hit found during a mesh trace.
#[derive(Debug, Clone, Copy)]
pub struct MeshCollision {
    pub param: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub face_index: u32,
    pub bary_coords: Vec2,
}

impl Default for MeshCollision {
    fn default() -> Self {
        Self {
            param: 2.0,
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
            face_index: u32::MAX,
            bary_coords: Vec2::ZERO,
        }
    }
}

struct MeshBvhNode {
    bounds: Bounds,
    depth: u32,
    is_leaf: bool,
    split_planes: [Plane; 3],
    children: [Option<Box<MeshBvhNode>>; 8],
    face_indices: Vec<u32>,
}

impl MeshBvhNode {
    fn new(depth: u32, bounds: Bounds) -> Self {
        Self {
            bounds,
            depth,
            is_leaf: true,
            split_planes: [Plane::default(); 3],
            children: Default::default(),
            face_indices: Vec::new(),
        }
    }

    fn subdivide(&mut self, mesh: &MeshData) {
        if self.depth >= MAX_SUBDIVISION_DEPTH {
            return;
        }

        if self.face_indices.len() > MAX_FACES_PER_NODE
            && self.bounds.volume() > MIN_SUBDIVISION_VOLUME
        {
            self.split_planes = octree::split_planes(&self.bounds);
            for i in 0..8 {
                self.children[i] = Some(Box::new(MeshBvhNode::new(
                    self.depth + 1,
                    octree::child_bounds(&self.bounds, i),
                )));
            }

            // Distribute faces into every child octant they touch.
            for &face_index in &self.face_indices {
                let face = &mesh.faces[face_index as usize];
                let v0 = mesh.vertices[face.vertex_indices[0] as usize];
                let v1 = mesh.vertices[face.vertex_indices[1] as usize];
                let v2 = mesh.vertices[face.vertex_indices[2] as usize];
                for child in self.children.iter_mut().flatten() {
                    if triangle_intersect_bounds(v0, v1, v2, &child.bounds) {
                        child.face_indices.push(face_index);
                    }
                }
            }

            // The children have fully taken over this node's faces.
            self.face_indices.clear();
            self.is_leaf = false;

            for child in self.children.iter_mut().flatten() {
                child.subdivide(mesh);
            }
        }
    }

    fn trace(&self, mesh: &MeshData, ray: &Ray, hit: &mut MeshCollision) -> bool {
        let node_hit = match ray_intersect_bounds(&self.bounds, ray) {
            Some(node_hit) if node_hit.param <= hit.param => node_hit,
            _ => return false,
        };

        if !self.is_leaf {
            let view = MeshNodeView { node: self, mesh };
            return octree::trace_octants(
                &view,
                &self.bounds,
                &self.split_planes,
                &node_hit,
                ray,
                hit,
            );
        }

        let mut trace_result = false;
        for &face_index in &self.face_indices {
            let face = &mesh.faces[face_index as usize];
            let v0 = mesh.vertices[face.vertex_indices[0] as usize];
            let v1 = mesh.vertices[face.vertex_indices[1] as usize];
            let v2 = mesh.vertices[face.vertex_indices[2] as usize];

            if let Some((tri_hit, bary)) =
                ray_intersect_triangle(v0, v1, v2, &face.face_plane, ray)
            {
                if tri_hit.param < hit.param {
                    hit.param = tri_hit.param;
                    hit.point = tri_hit.point;
                    hit.normal = tri_hit.normal;
                    hit.face_index = face_index;
                    hit.bary_coords = bary;
                    trace_result = true;
                }
            }
        }
        trace_result
    }
}

struct MeshNodeView<'a> {
    node: &'a MeshBvhNode,
    mesh: &'a MeshData,
}

impl octree::OctantChildren for MeshNodeView<'_> {
    type Hit = MeshCollision;

    fn child_bounds(&self, index: usize) -> Option<&Bounds> {
        self.node.children[index].as_deref().map(|c| &c.bounds)
    }

    fn trace_child(&self, index: usize, ray: &Ray, hit: &mut MeshCollision) -> bool {
        match self.node.children[index].as_deref() {
            Some(child) => child.trace(self.mesh, ray, hit),
            None => false,
        }
    }

    fn hit_point(hit: &MeshCollision) -> Vec3 {
        hit.point
    }
}

/// Triangle acceleration structure for one mesh.
#[derive(Default)]
pub struct MeshBvh {
    root: Option<Box<MeshBvhNode>>,
}

impl MeshBvh {
    /// Build the tree over a mesh. Faces missing a precomputed plane get one
    /// here, which is why the mesh is mutable; it is frozen afterwards.
    /// Building over an empty mesh is a no-op.
    pub fn build(mesh: &mut MeshData) -> MeshBvh {
        if mesh.vertices.is_empty() || mesh.faces.is_empty() {
            return MeshBvh::default();
        }

        let mut root_bounds = Bounds::EMPTY;
        for v in &mesh.vertices {
            root_bounds.expand(*v);
        }

        for face in &mut mesh.faces {
            if face.face_plane.is_zero() {
                let p0 = mesh.vertices[face.vertex_indices[0] as usize];
                let p1 = mesh.vertices[face.vertex_indices[1] as usize];
                let p2 = mesh.vertices[face.vertex_indices[2] as usize];
                let normal = intersect::calculate_normal(p0, p1, p2);
                face.face_plane = Plane::from_point_normal(normal, p0);
            }
        }

        let mut root = MeshBvhNode::new(0, root_bounds);
        root.face_indices = (0..mesh.faces.len() as u32).collect();

        log::debug!("Starting mesh octree subdivision.");
        root.subdivide(mesh);
        log::debug!("Completed mesh octree subdivision.");

        MeshBvh {
            root: Some(Box::new(root)),
        }
    }

    /// Closest-hit trace through the tree. Never fails; returns false on a
    /// miss or when the tree is empty.
    pub fn trace(&self, mesh: &MeshData, ray: &Ray, hit: &mut MeshCollision) -> bool {
        match &self.root {
            Some(root) => root.trace(mesh, ray, hit),
            None => false,
        }
    }

    pub fn center(&self) -> Vec3 {
        match &self.root {
            Some(root) => root.bounds.center(),
            None => Vec3::ZERO,
        }
    }
}

/// Reference traversal: test every face linearly. Used to validate the tree.
pub fn trace_linear(mesh: &MeshData, ray: &Ray, hit: &mut MeshCollision) -> bool {
    let mut trace_result = false;
    for (face_index, face) in mesh.faces.iter().enumerate() {
        let v0 = mesh.vertices[face.vertex_indices[0] as usize];
        let v1 = mesh.vertices[face.vertex_indices[1] as usize];
        let v2 = mesh.vertices[face.vertex_indices[2] as usize];
        if let Some((tri_hit, bary)) = ray_intersect_triangle(v0, v1, v2, &face.face_plane, ray) {
            if tri_hit.param < hit.param {
                hit.param = tri_hit.param;
                hit.point = tri_hit.point;
                hit.normal = tri_hit.normal;
                hit.face_index = face_index as u32;
                hit.bary_coords = bary;
                trace_result = true;
            }
        }
    }
    trace_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::MeshFace;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// A jittered triangle grid in the z=0 plane, enough faces to force
    /// several levels of subdivision.
    fn build_test_mesh(rng: &mut SmallRng, grid: u32) -> MeshData {
        let mut mesh = MeshData::default();
        for y in 0..grid {
            for x in 0..grid {
                let base = mesh.vertices.len() as u32;
                let fx = x as f32;
                let fy = y as f32;
                let jz = rng.gen::<f32>() * 2.0 - 1.0;
                mesh.vertices.push(Vec3::new(fx, fy, jz));
                mesh.vertices.push(Vec3::new(fx + 0.9, fy, jz));
                mesh.vertices.push(Vec3::new(fx, fy + 0.9, jz));
                mesh.faces.push(MeshFace {
                    vertex_indices: [base, base + 1, base + 2],
                    ..Default::default()
                });
            }
        }
        mesh
    }

    #[test]
    fn test_build_empty_is_noop() {
        let mut mesh = MeshData::default();
        let bvh = MeshBvh::build(&mut mesh);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let mut hit = MeshCollision::default();
        assert!(!bvh.trace(&mesh, &ray, &mut hit));
    }

    #[test]
    fn test_build_fills_face_planes() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut mesh = build_test_mesh(&mut rng, 3);
        let _bvh = MeshBvh::build(&mut mesh);
        for face in &mesh.faces {
            assert!(!face.face_plane.is_zero());
            // The stored plane passes through the face's vertices.
            for &vi in &face.vertex_indices {
                let v = mesh.vertices[vi as usize];
                assert!(face.face_plane.distance(v).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_single_triangle_hit() {
        let mut mesh = MeshData {
            vertices: vec![
                Vec3::new(-1.0, -1.0, 3.0),
                Vec3::new(1.0, -1.0, 3.0),
                Vec3::new(0.0, 1.0, 3.0),
            ],
            faces: vec![MeshFace::default()],
            ..Default::default()
        };
        mesh.faces[0].vertex_indices = [0, 1, 2];
        let bvh = MeshBvh::build(&mut mesh);

        let ray = Ray::new(Vec3::new(0.0, -0.2, 0.0), Vec3::new(0.0, -0.2, 6.0));
        let mut hit = MeshCollision::default();
        assert!(bvh.trace(&mesh, &ray, &mut hit));
        assert!((hit.param - 0.5).abs() < 1e-5);
        assert_eq!(hit.face_index, 0);
    }

    #[test]
    fn test_tree_matches_linear_traversal() {
        let mut rng = SmallRng::seed_from_u64(23);
        let mut mesh = build_test_mesh(&mut rng, 24);
        let bvh = MeshBvh::build(&mut mesh);

        let mut hits = 0;
        for _ in 0..2000 {
            let start = Vec3::new(
                rng.gen::<f32>() * 30.0 - 3.0,
                rng.gen::<f32>() * 30.0 - 3.0,
                -10.0,
            );
            let stop = Vec3::new(
                rng.gen::<f32>() * 30.0 - 3.0,
                rng.gen::<f32>() * 30.0 - 3.0,
                10.0,
            );
            let ray = Ray::new(start, stop);

            let mut tree_hit = MeshCollision::default();
            let mut linear_hit = MeshCollision::default();
            let tree_found = bvh.trace(&mesh, &ray, &mut tree_hit);
            let linear_found = trace_linear(&mesh, &ray, &mut linear_hit);

            assert_eq!(tree_found, linear_found);
            if tree_found {
                hits += 1;
                assert!(
                    (tree_hit.param - linear_hit.param).abs() < 1e-4,
                    "tree {} vs linear {}",
                    tree_hit.param,
                    linear_hit.param
                );
            }
        }
        assert!(hits > 100, "test rays barely touched the mesh: {hits}");
    }

    #[test]
    fn test_prunes_beyond_existing_hit() {
        let mut mesh = MeshData {
            vertices: vec![
                Vec3::new(-1.0, -1.0, 5.0),
                Vec3::new(1.0, -1.0, 5.0),
                Vec3::new(0.0, 1.0, 5.0),
            ],
            faces: vec![MeshFace {
                vertex_indices: [0, 1, 2],
                ..Default::default()
            }],
            ..Default::default()
        };
        let bvh = MeshBvh::build(&mut mesh);

        let ray = Ray::new(Vec3::new(0.0, -0.2, 0.0), Vec3::new(0.0, -0.2, 10.0));
        let mut hit = MeshCollision {
            param: 0.1, // something closer was already found
            ..Default::default()
        };
        assert!(!bvh.trace(&mesh, &ray, &mut hit));
        assert!((hit.param - 0.1).abs() < 1e-6);
    }
}
