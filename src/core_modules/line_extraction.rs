// THEORY:
// Line extraction prepares the two binary masks the engine consumes. It is a
// fixed sequence of image operations with no decisions beyond parameters:
//
// 1.  **Gradients**: Sobel derivatives in x and y, scaled and clipped to 8 bits.
//     The x-gradient lights up vertical edges, the y-gradient horizontal ones.
// 2.  **Intensity Bands**: Vertical boards are the bright structures (high band),
//     horizontal boards the darker ones (low band). Both bands are inclusive.
// 3.  **Cleaning**: Each band mask is opened with a kernel elongated along its
//     board direction, then the matching gradient is subtracted bitwise so board
//     outlines do not bleed into each other.

use crate::core_modules::backend::{ImageBackend, Kernel, MorphOp};
use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineExtractionConfig {
    /// Multiplier applied to absolute Sobel responses before clipping to 255.
    pub sobel_scale: f64,
    /// Inclusive intensity band of vertical structures.
    pub vertical_band: (u8, u8),
    /// Inclusive intensity band of horizontal structures.
    pub horizontal_band: (u8, u8),
    /// Opening kernel for the vertical mask.
    pub vertical_kernel: Kernel,
    /// Opening kernel for the horizontal mask.
    pub horizontal_kernel: Kernel,
    /// Second opening applied to the vertical mask to connect board fragments.
    pub fragment_kernel: Kernel,
}

impl Default for LineExtractionConfig {
    fn default() -> Self {
        Self {
            sobel_scale: 5.0,
            vertical_band: (215, 255),
            horizontal_band: (1, 215),
            vertical_kernel: Kernel::new(1, 13),
            horizontal_kernel: Kernel::new(13, 3),
            fragment_kernel: Kernel::new(5, 25),
        }
    }
}

/// The cleaned masks for both board directions.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMasks {
    pub vertical: GrayImage,
    pub horizontal: GrayImage,
}

/// Scaled Sobel magnitudes `(x, y)`.
pub fn sobel_edges(image: &GrayImage, scale: f64) -> (GrayImage, GrayImage) {
    let gx = imageproc::gradients::horizontal_sobel(image);
    let gy = imageproc::gradients::vertical_sobel(image);
    (scale_magnitude(&gx, scale), scale_magnitude(&gy, scale))
}

fn scale_magnitude(gradient: &ImageBuffer<Luma<i16>, Vec<i16>>, scale: f64) -> GrayImage {
    let (width, height) = gradient.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let v = (gradient.get_pixel(x, y)[0] as f64).abs() * scale;
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

/// 255 where `low <= pixel <= high`, 0 elsewhere.
pub fn in_range(image: &GrayImage, low: u8, high: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let v = image.get_pixel(x, y)[0];
        Luma([if (low..=high).contains(&v) { 255 } else { 0 }])
    })
}

/// Rough `(vertical, horizontal)` masks by intensity band.
pub fn extract_lines(image: &GrayImage, config: &LineExtractionConfig) -> (GrayImage, GrayImage) {
    let (v_low, v_high) = config.vertical_band;
    let (h_low, h_high) = config.horizontal_band;
    (in_range(image, v_low, v_high), in_range(image, h_low, h_high))
}

/// Opens `lines` with `kernel` and, if given, clears the bits set in `edge_mask`.
pub fn clean_lines(
    backend: &dyn ImageBackend,
    lines: &GrayImage,
    kernel: Kernel,
    edge_mask: Option<&GrayImage>,
) -> GrayImage {
    let opened = backend.morphology(lines, kernel, MorphOp::Open);
    match edge_mask {
        Some(edges) => GrayImage::from_fn(opened.width(), opened.height(), |x, y| {
            Luma([opened.get_pixel(x, y)[0] & !edges.get_pixel(x, y)[0]])
        }),
        None => opened,
    }
}

/// Runs the full line-extraction stage on a normalized 8-bit image.
pub fn line_masks(backend: &dyn ImageBackend, normalized: &GrayImage, config: &LineExtractionConfig) -> LineMasks {
    let (mag_x, mag_y) = sobel_edges(normalized, config.sobel_scale);
    let (vertical, horizontal) = extract_lines(normalized, config);
    LineMasks {
        vertical: clean_lines(backend, &vertical, config.vertical_kernel, Some(&mag_x)),
        horizontal: clean_lines(backend, &horizontal, config.horizontal_kernel, Some(&mag_y)),
    }
}
