//! Octree over the objects of a scene.
//!
//! Same topology as the mesh octree, but leaves carry object indices and
//! children are populated by box/box overlap. Subdivision is additionally
//! pruned by an object-count heuristic so sparse scenes don't pay for deep
//! trees. The tree borrows the scene's object list at build and trace time.

use lumen_math::intersect::{bounds_intersect_bounds, ray_intersect_bounds};
use lumen_math::{Bounds, Plane, Ray, Vec3};

use crate::object::{Object, ObjectCollision};
use crate::octree;

/// Default maximum tree depth when the caller does not derive one.
pub const MAX_SUBDIVISION_DEPTH: u32 = 2;

const MAX_OBJECTS_PER_NODE: usize = 2;

struct SceneBvhNode {
    bounds: Bounds,
    depth: u32,
    is_leaf: bool,
    split_planes: [Plane; 3],
    children: [Option<Box<SceneBvhNode>>; 8],
    object_indices: Vec<u32>,
    max_tree_depth: u32,
}

impl SceneBvhNode {
    fn new(depth: u32, bounds: Bounds, max_tree_depth: u32) -> Self {
        Self {
            bounds,
            depth,
            is_leaf: true,
            split_planes: [Plane::default(); 3],
            children: Default::default(),
            object_indices: Vec::new(),
            max_tree_depth,
        }
    }

    fn subdivide(&mut self, objects: &[Object]) {
        if self.depth >= self.max_tree_depth {
            return;
        }

        // Prune sparse subdivision paths: past this depth the tree would
        // hold fewer objects per node than the branching can pay for.
        let ideal = ((self.object_indices.len() as f32).ln() / 8.0f32.ln() + 0.5).floor() - 2.0;
        if self.depth as f32 >= ((self.max_tree_depth - self.depth) as f32).min(ideal) {
            return;
        }

        if self.object_indices.len() > MAX_OBJECTS_PER_NODE {
            self.split_planes = octree::split_planes(&self.bounds);
            for i in 0..8 {
                self.children[i] = Some(Box::new(SceneBvhNode::new(
                    self.depth + 1,
                    octree::child_bounds(&self.bounds, i),
                    self.max_tree_depth,
                )));
            }

            // Insert each object into every child octant its box overlaps.
            for &object_index in &self.object_indices {
                let object_bounds = objects[object_index as usize].bounds();
                for child in self.children.iter_mut().flatten() {
                    if bounds_intersect_bounds(&object_bounds, &child.bounds) {
                        child.object_indices.push(object_index);
                    }
                }
            }

            self.object_indices.clear();
            self.is_leaf = false;

            for child in self.children.iter_mut().flatten() {
                child.subdivide(objects);
            }
        }
    }

    fn trace(&self, objects: &[Object], ray: &Ray, hit: &mut ObjectCollision) -> bool {
        let node_hit = match ray_intersect_bounds(&self.bounds, ray) {
            Some(node_hit) if node_hit.param <= hit.param => node_hit,
            _ => return false,
        };

        if !self.is_leaf {
            let view = SceneNodeView {
                node: self,
                objects,
            };
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
        for &object_index in &self.object_indices {
            let mut temp_hit = ObjectCollision::default();
            if objects[object_index as usize].trace(ray, &mut temp_hit) && temp_hit.param < hit.param
            {
                *hit = temp_hit;
                trace_result = true;
            }
        }
        trace_result
    }
}

struct SceneNodeView<'a> {
    node: &'a SceneBvhNode,
    objects: &'a [Object],
}

impl octree::OctantChildren for SceneNodeView<'_> {
    type Hit = ObjectCollision;

    fn child_bounds(&self, index: usize) -> Option<&Bounds> {
        self.node.children[index].as_deref().map(|c| &c.bounds)
    }

    fn trace_child(&self, index: usize, ray: &Ray, hit: &mut ObjectCollision) -> bool {
        match self.node.children[index].as_deref() {
            Some(child) => child.trace(self.objects, ray, hit),
            None => false,
        }
    }

    fn hit_point(hit: &ObjectCollision) -> Vec3 {
        hit.point
    }
}

/// Object acceleration structure for one scene.
#[derive(Default)]
pub struct SceneBvh {
    root: Option<Box<SceneBvhNode>>,
}

impl SceneBvh {
    /// Build the tree over the scene's objects. Building over an empty list
    /// is a no-op.
    pub fn build(objects: &[Object], max_tree_depth: u32) -> SceneBvh {
        if objects.is_empty() {
            return SceneBvh::default();
        }

        let mut root_bounds = Bounds::EMPTY;
        for object in objects {
            root_bounds.union(&object.bounds());
        }

        let mut root = SceneBvhNode::new(0, root_bounds, max_tree_depth);
        root.object_indices = (0..objects.len() as u32).collect();
        root.subdivide(objects);

        SceneBvh {
            root: Some(Box::new(root)),
        }
    }

    pub fn trace(&self, objects: &[Object], ray: &Ray, hit: &mut ObjectCollision) -> bool {
        match &self.root {
            Some(root) => root.trace(objects, ray, hit),
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
