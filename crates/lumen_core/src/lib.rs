//! Asset decoding for the renderer: textures and triangle meshes.
//!
//! Everything here terminates at plain data buffers. File handles and codec
//! details never cross into the tracing crates.

pub mod mesh;
pub mod texture;

pub use mesh::{MeshData, MeshError, MeshFace};
pub use texture::{Texture, TextureError};
