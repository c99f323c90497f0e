// Re-export glam for convenience
pub use glam::*;

mod bounds;
mod cuboid;
mod plane;
mod ray;

pub mod intersect;
pub mod mapping;

pub use bounds::Bounds;
pub use cuboid::Cuboid;
pub use plane::Plane;
pub use ray::{Collision, Ray};
