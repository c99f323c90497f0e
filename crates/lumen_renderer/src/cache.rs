//! First-bounce cache.
//!
//! For a stationary camera the primary visible surface of a pixel never
//! changes, so the first collision of each pixel is memoized and replayed
//! for every later sample. The driver invalidates the cache whenever the
//! camera moves or the scene changes.

use crate::object::ObjectCollision;

/// Per-pixel memoization of the primary scene collision.
pub struct ImagePlaneCache {
    width: u32,
    height: u32,
    valid: Vec<bool>,
    collisions: Vec<ObjectCollision>,
}

impl ImagePlaneCache {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = (width * height) as usize;
        Self {
            width,
            height,
            valid: vec![false; pixels],
            collisions: vec![ObjectCollision::default(); pixels],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Drop every cached entry.
    pub fn invalidate(&mut self) {
        self.valid.fill(false);
    }

    /// Split the cache into disjoint mutable horizontal bands matching the
    /// frame's band partition.
    pub fn bands(&mut self, ranges: &[(u32, u32)]) -> Vec<CacheBand<'_>> {
        let width = self.width as usize;
        let mut out = Vec::with_capacity(ranges.len());
        let mut valid = self.valid.as_mut_slice();
        let mut collisions = self.collisions.as_mut_slice();
        let mut cursor = 0usize;

        for &(y_start, y_stop) in ranges {
            let skip = y_start as usize * width - cursor;
            let len = (y_stop - y_start) as usize * width;

            valid = valid.split_at_mut(skip).1;
            collisions = collisions.split_at_mut(skip).1;
            let (band_valid, rest_valid) = valid.split_at_mut(len);
            let (band_collisions, rest_collisions) = collisions.split_at_mut(len);
            valid = rest_valid;
            collisions = rest_collisions;
            cursor = y_stop as usize * width;

            out.push(CacheBand {
                width: self.width,
                y_start,
                valid: band_valid,
                collisions: band_collisions,
            });
        }
        out
    }
}

/// Writer over one horizontal band of the cache.
pub struct CacheBand<'a> {
    width: u32,
    y_start: u32,
    valid: &'a mut [bool],
    collisions: &'a mut [ObjectCollision],
}

impl CacheBand<'_> {
    /// Cached primary collision for a pixel, if one has been stored since
    /// the last invalidation. Pixel coordinates are frame-global.
    pub fn fetch(&self, x: u32, y: u32) -> Option<&ObjectCollision> {
        let index = ((y - self.y_start) * self.width + x) as usize;
        if self.valid[index] {
            Some(&self.collisions[index])
        } else {
            None
        }
    }

    /// Memoize the primary collision for a pixel.
    pub fn store(&mut self, hit: &ObjectCollision, x: u32, y: u32) {
        let index = ((y - self.y_start) * self.width + x) as usize;
        self.collisions[index] = hit.clone();
        self.valid[index] = true;
    }
}
