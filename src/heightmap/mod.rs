use crate::dem::ElevationGrid;
use crate::error::{HeightmapError, HeightmapResult};
use image::{Rgba, RgbaImage};
use tracing::debug;

const WRAP_MODULUS: i128 = 1 << 32;

/// Inward offsets applied to each raster edge before sampling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Margins {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

/// Settings threaded through both scan passes.
#[derive(Clone, Copy, Debug)]
pub struct EncodeOptions {
    pub downsample: u32,
    pub vertical_scale: i64,
    pub normalize: bool,
    pub margins: Margins,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            downsample: 1,
            vertical_scale: 100,
            normalize: false,
            margins: Margins::default(),
        }
    }
}

/// Mapping from output pixel coordinates onto the strided raster sample space.
///
/// Output pixel (0, 0) corresponds to sampled index `min_sample`; sampled
/// index (x, y) reads the raster at (x * downsample, y * downsample).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleWindow {
    pub output_dimensions: (u32, u32),
    pub min_sample: (u32, u32),
    pub max_sample: (u32, u32),
}

impl SampleWindow {
    pub fn new(
        dimensions: (u32, u32),
        margins: Margins,
        downsample: u32,
    ) -> HeightmapResult<Self> {
        let (width, height) = dimensions;
        if width == 0 || height == 0 {
            return Err(HeightmapError::InvalidDimensions(dimensions));
        }
        if downsample < 1 {
            return Err(HeightmapError::InvalidDownsample(downsample));
        }
        let Margins {
            start_x,
            start_y,
            end_x,
            end_y,
        } = margins;
        if start_x + end_x >= width || start_y + end_y >= height {
            return Err(HeightmapError::InvalidMargins(margins));
        }
        Ok(Self {
            output_dimensions: (
                (width - start_x - end_x) / downsample,
                (height - start_y - end_y) / downsample,
            ),
            min_sample: (start_x / downsample, start_y / downsample),
            max_sample: ((width - end_x) / downsample, (height - end_y) / downsample),
        })
    }

    /// Number of sampled columns, one progress tick each.
    pub fn columns(&self) -> u32 {
        self.max_sample.0 - self.min_sample.0
    }
}

/// Lowest and highest valid heights seen by the extremes scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightExtremes {
    pub min: f64,
    pub max: f64,
}

impl HeightExtremes {
    fn unseen() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn seen(&self) -> bool {
        self.min.is_finite()
    }

    /// A sample that lowers the minimum never raises the maximum on the same
    /// update, so a strictly decreasing series leaves `max` at its sentinel.
    fn update(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        } else if value > self.max {
            self.max = value;
        }
    }
}

/// First pass: find the height extremes over the sampled window.
///
/// Samples below zero are missing data and do not participate. Returns `None`
/// when the window holds no valid sample. `progress` is called once per
/// completed sample column.
pub fn scan_extremes(
    grid: &ElevationGrid,
    window: &SampleWindow,
    downsample: u32,
    progress: &mut dyn FnMut(),
) -> Option<HeightExtremes> {
    let mut extremes = HeightExtremes::unseen();
    for x in window.min_sample.0..window.max_sample.0 {
        for y in window.min_sample.1..window.max_sample.1 {
            if let Some(value) = grid.get(x * downsample, y * downsample) {
                if value >= 0.0 {
                    extremes.update(value);
                }
            }
        }
        progress();
    }
    if extremes.seen() {
        debug!(
            "height extremes: min {} max {}",
            extremes.min, extremes.max
        );
        Some(extremes)
    } else {
        None
    }
}

/// Encode one height as the four big endian bytes of its scaled 32-bit value.
///
/// Heights below zero clamp to zero. The scaled value is truncated toward
/// zero and reduced modulo 2^32, so overflow and negative scale factors wrap
/// instead of failing.
pub fn encode_height(value: f64, vertical_scale: i64) -> Rgba<u8> {
    let clamped = if value < 0.0 { 0.0 } else { value };
    let scaled = clamped * vertical_scale as f64;
    let wrapped = (scaled.trunc() as i128).rem_euclid(WRAP_MODULUS) as u32;
    Rgba(wrapped.to_be_bytes())
}

/// Second pass: encode every sampled height into the output image.
///
/// When `options.normalize` is set and extremes are known, the minimum valid
/// height is subtracted before clamping; unknown extremes make normalization
/// a no-op. Every output pixel is written exactly once. `progress` is called
/// once per completed sample column.
pub fn encode_heightmap(
    grid: &ElevationGrid,
    window: &SampleWindow,
    options: &EncodeOptions,
    extremes: Option<HeightExtremes>,
    progress: &mut dyn FnMut(),
) -> RgbaImage {
    let (output_width, output_height) = window.output_dimensions;
    let mut image = RgbaImage::new(output_width, output_height);
    let offset = match extremes {
        Some(e) if options.normalize => e.min,
        _ => 0.0,
    };
    for x in window.min_sample.0..window.max_sample.0 {
        for y in window.min_sample.1..window.max_sample.1 {
            let Some(value) = grid.get(x * options.downsample, y * options.downsample) else {
                continue;
            };
            let (u, v) = (x - window.min_sample.0, y - window.min_sample.1);
            // Margins that are not multiples of the stride can map one
            // sampled index past the output edge
            if u < output_width && v < output_height {
                image.put_pixel(u, v, encode_height(value - offset, options.vertical_scale));
            }
        }
        progress();
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(dimensions: (u32, u32), samples: Vec<f64>) -> ElevationGrid {
        ElevationGrid::new(dimensions, samples).unwrap()
    }

    fn window(dimensions: (u32, u32), downsample: u32) -> SampleWindow {
        SampleWindow::new(dimensions, Margins::default(), downsample).unwrap()
    }

    #[test]
    fn output_dimensions_follow_floor_division() {
        assert_eq!(window((100, 64), 4).output_dimensions, (25, 16));
        assert_eq!(window((10, 10), 3).output_dimensions, (3, 3));
        assert_eq!(window((7, 5), 1).output_dimensions, (7, 5));
    }

    #[test]
    fn window_smaller_than_stride_is_empty() {
        let w = window((3, 3), 4);
        assert_eq!(w.output_dimensions, (0, 0));
        let image = encode_heightmap(
            &grid((3, 3), vec![1.0; 9]),
            &w,
            &EncodeOptions::default(),
            None,
            &mut || {},
        );
        assert_eq!(image.dimensions(), (0, 0));
    }

    #[test]
    fn window_rejects_zero_dimensions() {
        assert!(matches!(
            SampleWindow::new((0, 10), Margins::default(), 1),
            Err(HeightmapError::InvalidDimensions((0, 10)))
        ));
    }

    #[test]
    fn window_rejects_margins_consuming_an_axis() {
        let margins = Margins {
            start_x: 6,
            end_x: 4,
            ..Margins::default()
        };
        assert!(matches!(
            SampleWindow::new((10, 10), margins, 1),
            Err(HeightmapError::InvalidMargins(_))
        ));
    }

    #[test]
    fn encoding_splits_big_endian_bytes() {
        assert_eq!(encode_height(0x01020304 as f64, 1), Rgba([1, 2, 3, 4]));
        assert_eq!(encode_height(400.0, 1), Rgba([0, 0, 1, 144]));
        assert_eq!(
            u32::from_be_bytes(encode_height(305_419_896.0, 1).0),
            305_419_896
        );
    }

    #[test]
    fn negative_heights_clamp_to_zero() {
        assert_eq!(encode_height(-5.0, 100), Rgba([0, 0, 0, 0]));
        assert_eq!(encode_height(-0.5, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn overflow_wraps_modulo_2_pow_32() {
        // 2^32 + 7
        assert_eq!(encode_height(4_294_967_303.0, 1), Rgba([0, 0, 0, 7]));
        // 6_000_000_000 % 2^32
        assert_eq!(
            encode_height(3.0, 2_000_000_000),
            Rgba(1_705_032_704_u32.to_be_bytes())
        );
        // Negative products wrap too
        assert_eq!(encode_height(1.0, -1), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn extremes_follow_first_sets_min_rule() {
        // Column-outer scan order visits 5, 10, -1, 3
        let g = grid((2, 2), vec![5.0, -1.0, 10.0, 3.0]);
        let extremes = scan_extremes(&g, &window((2, 2), 1), 1, &mut || {}).unwrap();
        assert_eq!(extremes.min, 5.0);
        assert_eq!(extremes.max, 10.0);
    }

    #[test]
    fn decreasing_series_never_raises_max() {
        let g = grid((1, 3), vec![10.0, 9.0, 8.0]);
        let extremes = scan_extremes(&g, &window((1, 3), 1), 1, &mut || {}).unwrap();
        assert_eq!(extremes.min, 8.0);
        assert_eq!(extremes.max, f64::NEG_INFINITY);
    }

    #[test]
    fn all_invalid_grid_has_no_extremes() {
        let g = grid((2, 2), vec![-1.0, -2.0, -3.0, -4.0]);
        assert_eq!(scan_extremes(&g, &window((2, 2), 1), 1, &mut || {}), None);
    }

    #[test]
    fn scan_ticks_progress_once_per_column() {
        let g = grid((5, 3), vec![1.0; 15]);
        let w = window((5, 3), 1);
        let mut ticks = 0;
        scan_extremes(&g, &w, 1, &mut || ticks += 1);
        assert_eq!(ticks, w.columns());
        assert_eq!(ticks, 5);
    }

    #[test]
    fn encodes_2x2_raster_end_to_end() {
        let g = grid((2, 2), vec![100.0, 200.0, 300.0, 400.0]);
        let w = window((2, 2), 1);
        let options = EncodeOptions {
            vertical_scale: 1,
            ..EncodeOptions::default()
        };
        let mut ticks = 0;
        let image = encode_heightmap(&g, &w, &options, None, &mut || ticks += 1);

        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 100]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 200]));
        assert_eq!(image.get_pixel(0, 1), &Rgba([0, 0, 1, 44]));
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 0, 1, 144]));
        assert_eq!(ticks, 2);
    }

    #[test]
    fn normalization_subtracts_scanned_minimum() {
        let g = grid((2, 2), vec![100.0, 200.0, 300.0, 400.0]);
        let w = window((2, 2), 1);
        let options = EncodeOptions {
            vertical_scale: 1,
            normalize: true,
            ..EncodeOptions::default()
        };
        let extremes = scan_extremes(&g, &w, 1, &mut || {});
        let image = encode_heightmap(&g, &w, &options, extremes, &mut || {});

        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 0, 1, 44]));
    }

    #[test]
    fn normalization_without_extremes_is_a_no_op() {
        let g = grid((2, 1), vec![-3.0, 7.0]);
        let w = window((2, 1), 1);
        let options = EncodeOptions {
            vertical_scale: 1,
            normalize: true,
            ..EncodeOptions::default()
        };
        let image = encode_heightmap(&g, &w, &options, None, &mut || {});
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 7]));
    }

    #[test]
    fn downsampling_strides_the_raster() {
        #[rustfmt::skip]
        let g = grid((4, 4), vec![
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
            13.0, 14.0, 15.0, 16.0,
        ]);
        let w = window((4, 4), 2);
        let options = EncodeOptions {
            downsample: 2,
            vertical_scale: 1,
            ..EncodeOptions::default()
        };
        let image = encode_heightmap(&g, &w, &options, None, &mut || {});

        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 1]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 3]));
        assert_eq!(image.get_pixel(0, 1), &Rgba([0, 0, 0, 9]));
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 0, 0, 11]));
    }

    #[test]
    fn every_output_pixel_is_written() {
        let g = grid((6, 4), vec![2.0; 24]);
        let w = window((6, 4), 1);
        let options = EncodeOptions {
            vertical_scale: 1,
            ..EncodeOptions::default()
        };
        let image = encode_heightmap(&g, &w, &options, None, &mut || {});
        assert_eq!(image.pixels().count(), 24);
        assert!(image.pixels().all(|p| *p == Rgba([0, 0, 0, 2])));
    }
}
