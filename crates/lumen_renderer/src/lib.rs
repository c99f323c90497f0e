//! Monte-Carlo path tracing core: materials, scene objects, octree
//! acceleration, and the recursive integrator with its banded worker pool.

pub mod cache;
pub mod camera;
pub mod engine;
pub mod frame;
pub mod material;
pub mod mesh_bvh;
pub mod object;
mod octree;
pub mod parser;
pub mod sampling;
pub mod scene;
pub mod scene_bvh;

pub use cache::ImagePlaneCache;
pub use camera::Camera;
pub use engine::{trace_pixel, trace_range, trace_scene, MAX_TRACE_DEPTH};
pub use frame::{Frame, TraceResult};
pub use material::{Material, MaterialHandle, Reflectance, SurfaceSample};
pub use object::{Object, ObjectCollision, Shape};
pub use parser::{load_scene, SceneError};
pub use scene::Scene;
