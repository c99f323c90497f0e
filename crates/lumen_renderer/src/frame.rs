//! Frame accumulation.
//!
//! Each pixel keeps a running mean of every sample written since the last
//! reset, plus auxiliary buffers for the primary hit's normal, depth, and
//! material id. The 8-bit display buffer is refreshed on every write with a
//! gamma-corrected copy of the mean.

use lumen_math::Vec3;

const GAMMA: f32 = 2.2;

/// Everything the integrator learns about one pixel sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceResult {
    pub color: Vec3,
    pub normal: Vec3,
    pub depth: f32,
    pub material_id: u64,
    pub ray_count: u64,
}

/// Fold one sample into a pixel's running mean and refresh its display
/// bytes.
fn fold_pixel(mean: &mut Vec3, count: &mut u32, display: &mut [u8], sample: Vec3) {
    let new_mean = (*mean * *count as f32 + sample) / (*count + 1) as f32;
    *count += 1;
    *mean = new_mean;

    display[0] = (255.0 * new_mean.x.clamp(0.0, 1.0).powf(1.0 / GAMMA) + 0.5) as u8;
    display[1] = (255.0 * new_mean.y.clamp(0.0, 1.0).powf(1.0 / GAMMA) + 0.5) as u8;
    display[2] = (255.0 * new_mean.z.clamp(0.0, 1.0).powf(1.0 / GAMMA) + 0.5) as u8;
}

/// The accumulation target for a render.
pub struct Frame {
    frame_count: u32,
    width: u32,
    height: u32,
    render_target: Vec<Vec3>,
    count: Vec<u32>,
    display: Vec<u8>,
    normal: Vec<Vec3>,
    depth: Vec<f32>,
    material_id: Vec<u64>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = (width * height) as usize;
        Self {
            frame_count: 0,
            width,
            height,
            render_target: vec![Vec3::ZERO; pixels],
            count: vec![0; pixels],
            display: vec![0; pixels * 3],
            normal: vec![Vec3::ZERO; pixels],
            depth: vec![0.0; pixels],
            material_id: vec![0; pixels],
        }
    }

    /// Zero every buffer and restart accumulation.
    pub fn reset(&mut self) {
        self.render_target.fill(Vec3::ZERO);
        self.count.fill(0);
        self.display.fill(0);
        self.normal.fill(Vec3::ZERO);
        self.depth.fill(0.0);
        self.material_id.fill(0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn set_frame_count(&mut self, count: u32) {
        self.frame_count = count;
    }

    /// Fold a color sample into a pixel.
    pub fn write_pixel(&mut self, pixel: Vec3, x: u32, y: u32) {
        let index = (y * self.width + x) as usize;
        fold_pixel(
            &mut self.render_target[index],
            &mut self.count[index],
            &mut self.display[index * 3..index * 3 + 3],
            pixel,
        );
    }

    /// Fold a trace result into a pixel, recording its scene descriptors.
    pub fn write_result(&mut self, result: &TraceResult, x: u32, y: u32) {
        self.write_pixel(result.color, x, y);
        let index = (y * self.width + x) as usize;
        self.normal[index] = result.normal;
        self.depth[index] = result.depth;
        self.material_id[index] = result.material_id;
    }

    pub fn display_buffer(&self) -> &[u8] {
        &self.display
    }

    pub fn sample_count(&self, x: u32, y: u32) -> u32 {
        self.count[(y * self.width + x) as usize]
    }

    pub fn mean(&self, x: u32, y: u32) -> Vec3 {
        self.render_target[(y * self.width + x) as usize]
    }

    pub fn display_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let index = ((y * self.width + x) * 3) as usize;
        [
            self.display[index],
            self.display[index + 1],
            self.display[index + 2],
        ]
    }

    pub fn normal_buffer(&self) -> &[Vec3] {
        &self.normal
    }

    pub fn depth_buffer(&self) -> &[f32] {
        &self.depth
    }

    pub fn material_id_buffer(&self) -> &[u64] {
        &self.material_id
    }

    /// Split the frame into disjoint mutable horizontal bands. `ranges`
    /// must be sorted, non-overlapping `[y_start, y_stop)` row spans.
    pub fn bands(&mut self, ranges: &[(u32, u32)]) -> Vec<FrameBand<'_>> {
        let width = self.width as usize;
        let frame_width = self.width;

        let render_target = split_rows(self.render_target.as_mut_slice(), width, 1, ranges);
        let count = split_rows(self.count.as_mut_slice(), width, 1, ranges);
        let display = split_rows(self.display.as_mut_slice(), width, 3, ranges);
        let normal = split_rows(self.normal.as_mut_slice(), width, 1, ranges);
        let depth = split_rows(self.depth.as_mut_slice(), width, 1, ranges);
        let material_id = split_rows(self.material_id.as_mut_slice(), width, 1, ranges);

        let zipped = render_target
            .into_iter()
            .zip(count)
            .zip(display)
            .zip(normal)
            .zip(depth)
            .zip(material_id);

        zipped
            .enumerate()
            .map(
                |(i, (((((render_target, count), display), normal), depth), material_id))| {
                    FrameBand {
                        width: frame_width,
                        y_start: ranges[i].0,
                        y_stop: ranges[i].1,
                        render_target,
                        count,
                        display,
                        normal,
                        depth,
                        material_id,
                    }
                },
            )
            .collect()
    }
}

/// Carve a flat row-major buffer into the requested row ranges. `scale` is
/// the number of buffer elements per pixel.
fn split_rows<'a, T>(
    mut data: &'a mut [T],
    width: usize,
    scale: usize,
    ranges: &[(u32, u32)],
) -> Vec<&'a mut [T]> {
    let mut out = Vec::with_capacity(ranges.len());
    let mut cursor = 0usize;
    for &(y_start, y_stop) in ranges {
        let skip = y_start as usize * width * scale - cursor;
        let len = (y_stop - y_start) as usize * width * scale;
        data = data.split_at_mut(skip).1;
        let (band, rest) = data.split_at_mut(len);
        out.push(band);
        data = rest;
        cursor = y_stop as usize * width * scale;
    }
    out
}

/// A writer over one horizontal band of a frame. Bands of one frame are
/// disjoint, so workers can write concurrently without locks.
pub struct FrameBand<'a> {
    width: u32,
    pub y_start: u32,
    pub y_stop: u32,
    render_target: &'a mut [Vec3],
    count: &'a mut [u32],
    display: &'a mut [u8],
    normal: &'a mut [Vec3],
    depth: &'a mut [f32],
    material_id: &'a mut [u64],
}

impl FrameBand<'_> {
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Fold a trace result into a pixel addressed in frame coordinates.
    pub fn write_result(&mut self, result: &TraceResult, x: u32, y: u32) {
        let index = ((y - self.y_start) * self.width + x) as usize;
        fold_pixel(
            &mut self.render_target[index],
            &mut self.count[index],
            &mut self.display[index * 3..index * 3 + 3],
            result.color,
        );
        self.normal[index] = result.normal;
        self.depth[index] = result.depth;
        self.material_id[index] = result.material_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_constant_samples_is_constant() {
        let mut frame = Frame::new(4, 4);
        let color = Vec3::new(0.25, 0.5, 0.75);
        for _ in 0..10 {
            frame.write_pixel(color, 2, 1);
        }
        assert!((frame.mean(2, 1) - color).length() < 1e-6);
        assert_eq!(frame.sample_count(2, 1), 10);
        assert_eq!(frame.sample_count(0, 0), 0);
    }

    #[test]
    fn test_mean_of_sequence() {
        let mut frame = Frame::new(2, 2);
        frame.write_pixel(Vec3::splat(1.0), 0, 0);
        frame.write_pixel(Vec3::splat(0.0), 0, 0);
        frame.write_pixel(Vec3::splat(0.5), 0, 0);
        assert!((frame.mean(0, 0) - Vec3::splat(0.5)).length() < 1e-6);
        assert_eq!(frame.sample_count(0, 0), 3);
    }

    #[test]
    fn test_gamma_corrected_display() {
        let mut frame = Frame::new(1, 1);
        frame.write_pixel(Vec3::new(0.6, 1.8, 0.0), 0, 0);
        let [r, g, b] = frame.display_pixel(0, 0);
        // 255 * 0.6^(1/2.2) rounds to 202; overshoot saturates at 255.
        assert_eq!(r, 202);
        assert_eq!(g, 255);
        assert_eq!(b, 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut frame = Frame::new(2, 2);
        frame.write_result(
            &TraceResult {
                color: Vec3::ONE,
                normal: Vec3::Y,
                depth: 5.0,
                material_id: 42,
                ray_count: 3,
            },
            1,
            1,
        );
        frame.reset();
        assert_eq!(frame.sample_count(1, 1), 0);
        assert_eq!(frame.mean(1, 1), Vec3::ZERO);
        assert_eq!(frame.depth_buffer()[3], 0.0);
        assert_eq!(frame.material_id_buffer()[3], 0);
        assert_eq!(frame.display_pixel(1, 1), [0, 0, 0]);
    }

    #[test]
    fn test_bands_partition_rows() {
        let mut frame = Frame::new(4, 10);
        {
            let mut bands = frame.bands(&[(0, 3), (3, 7), (7, 10)]);
            assert_eq!(bands.len(), 3);
            let result = TraceResult {
                color: Vec3::ONE,
                ..Default::default()
            };
            bands[0].write_result(&result, 0, 0);
            bands[1].write_result(&result, 1, 3);
            bands[2].write_result(&result, 2, 9);
        }
        assert_eq!(frame.sample_count(0, 0), 1);
        assert_eq!(frame.sample_count(1, 3), 1);
        assert_eq!(frame.sample_count(2, 9), 1);
    }

    #[test]
    fn test_band_writes_match_whole_frame_writes() {
        let mut banded = Frame::new(3, 6);
        let mut whole = Frame::new(3, 6);
        let result = TraceResult {
            color: Vec3::new(0.2, 0.4, 0.8),
            normal: Vec3::Y,
            depth: 2.0,
            material_id: 7,
            ray_count: 1,
        };

        {
            let mut bands = banded.bands(&[(0, 2), (2, 6)]);
            for band in &mut bands {
                for y in band.y_start..band.y_stop {
                    for x in 0..3 {
                        band.write_result(&result, x, y);
                    }
                }
            }
        }
        for y in 0..6 {
            for x in 0..3 {
                whole.write_result(&result, x, y);
            }
        }

        assert_eq!(banded.display_buffer(), whole.display_buffer());
        assert_eq!(banded.depth_buffer(), whole.depth_buffer());
        assert_eq!(banded.material_id_buffer(), whole.material_id_buffer());
    }
}
