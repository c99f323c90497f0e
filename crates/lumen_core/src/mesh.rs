//! Wavefront OBJ decoding into flat mesh arrays.
//!
//! All shapes in a file are condensed into a single vertex/normal/texcoord
//! pool with one combined face list. Faces are triangulated by the loader
//! and their indices are reversed on load (taken in 2, 1, 0 order), which
//! flips the winding to match the renderer's convention.

use std::path::Path;

use lumen_math::{Plane, Vec2, Vec3};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("failed to load obj file: {0}")]
    Load(#[from] tobj::LoadError),
}

/// A single triangle of a mesh.
///
/// `material` indexes the owning object's face-material list, -1 meaning
/// "use the object material". `plane` is filled in lazily by the octree
/// build when left at zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeshFace {
    pub vertex_indices: [u32; 3],
    pub normal_indices: [u32; 3],
    pub texcoord_indices: [u32; 3],
    pub material: i32,
    pub face_plane: Plane,
}

/// Vertex pools and face list for one mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub faces: Vec<MeshFace>,
}

impl MeshData {
    /// Load and triangulate an OBJ file.
    ///
    /// Normals are normalized on load and optionally inverted. Vertices are
    /// returned untransformed; object placement happens in the scene layer.
    pub fn load_obj(path: impl AsRef<Path>, invert_normals: bool) -> Result<MeshData, MeshError> {
        let path = path.as_ref();
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: false,
                ..Default::default()
            },
        )?;

        let mut data = MeshData::default();

        for model in &models {
            let mesh = &model.mesh;
            let vertex_base = data.vertices.len() as u32;
            let normal_base = data.normals.len() as u32;
            let texcoord_base = data.texcoords.len() as u32;

            for p in mesh.positions.chunks_exact(3) {
                data.vertices.push(Vec3::new(p[0], p[1], p[2]));
            }
            for n in mesh.normals.chunks_exact(3) {
                let mut normal = Vec3::new(n[0], n[1], n[2]).normalize_or_zero();
                if invert_normals {
                    normal = -normal;
                }
                data.normals.push(normal);
            }
            for t in mesh.texcoords.chunks_exact(2) {
                data.texcoords.push(Vec2::new(t[0], t[1]));
            }

            let face_material = mesh.material_id.map(|id| id as i32).unwrap_or(-1);
            let has_normals = !mesh.normal_indices.is_empty();
            let has_texcoords = !mesh.texcoord_indices.is_empty();

            for (f, idx) in mesh.indices.chunks_exact(3).enumerate() {
                let mut face = MeshFace {
                    material: face_material,
                    ..Default::default()
                };
                // Reverse winding: indices taken in 2, 1, 0 order.
                for k in 0..3 {
                    face.vertex_indices[k] = vertex_base + idx[2 - k];
                }
                if has_normals {
                    let n = &mesh.normal_indices[f * 3..f * 3 + 3];
                    for k in 0..3 {
                        face.normal_indices[k] = normal_base + n[2 - k];
                    }
                }
                if has_texcoords {
                    let t = &mesh.texcoord_indices[f * 3..f * 3 + 3];
                    for k in 0..3 {
                        face.texcoord_indices[k] = texcoord_base + t[2 - k];
                    }
                }
                data.faces.push(face);
            }
        }

        log::info!(
            "Loaded {} with {} vertices, {} normals, {} texcoords, {} faces.",
            path.display(),
            data.vertices.len(),
            data.normals.len(),
            data.texcoords.len(),
            data.faces.len()
        );

        Ok(data)
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_texcoords(&self) -> bool {
        !self.texcoords.is_empty()
    }
}
