//! Texture loading for materials.
//!
//! Decodes BMP and EXR files into a flat float RGB buffer. BMP texel rows
//! are stored bottom-up (matching the file's scanline order); EXR rows are
//! stored top-down. Addressing math in the material layer relies on these
//! layouts.

use std::path::Path;

use lumen_math::Vec3;
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported texture format: {0}")]
    UnsupportedFormat(String),
}

/// A decoded texture: width * height RGB triplets of linear floats.
#[derive(Clone, Debug, Default)]
pub struct Texture {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub buffer: Vec<f32>,
}

impl Texture {
    /// Load a texture from a .bmp or .exr file.
    pub fn load(path: impl AsRef<Path>) -> Result<Texture, TextureError> {
        let path = path.as_ref();
        let filename = path.to_string_lossy().to_string();

        let flip_rows = if filename.ends_with(".bmp") {
            true
        } else if filename.ends_with(".exr") {
            false
        } else {
            return Err(TextureError::UnsupportedFormat(filename));
        };

        let decoded = image::open(path)?.into_rgb32f();
        let (width, height) = decoded.dimensions();

        let mut buffer = vec![0.0f32; (width * height * 3) as usize];
        let row_stride = (width * 3) as usize;
        for (y, row) in decoded.rows().enumerate() {
            let dest_y = if flip_rows { height as usize - 1 - y } else { y };
            let dest_row = &mut buffer[dest_y * row_stride..(dest_y + 1) * row_stride];
            for (x, pixel) in row.enumerate() {
                dest_row[x * 3] = pixel.0[0];
                dest_row[x * 3 + 1] = pixel.0[1];
                dest_row[x * 3 + 2] = pixel.0[2];
            }
        }

        log::info!("Loaded texture {} ({}x{}).", filename, width, height);

        Ok(Texture {
            filename,
            width,
            height,
            buffer,
        })
    }

    /// True if the texture holds no texel data.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() || self.width == 0 || self.height == 0
    }

    /// Fetch a texel by integer coordinates. Callers are expected to have
    /// wrapped the coordinates into range already.
    #[inline]
    pub fn texel(&self, x: u32, y: u32) -> Vec3 {
        let offset = (y * self.width * 3 + x * 3) as usize;
        Vec3::new(
            self.buffer[offset],
            self.buffer[offset + 1],
            self.buffer[offset + 2],
        )
    }
}
