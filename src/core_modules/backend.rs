// THEORY:
// The board reconstruction engine reasons about rectangles, never pixels. Every
// pixel-level operation it relies on (finding contours in a binary mask, taking
// a contour's bounding rectangle, opening a mask with a rectangular kernel) is
// reached through the `ImageBackend` trait. The engine stays testable with
// hand-built contours, and the concrete image library can be swapped without
// touching the geometry.
//
// `ImageprocBackend` is the shipped implementation:
// - contours come from `imageproc::contours::find_contours`, keeping only outer,
//   top-level borders (external retrieval: holes and nested islands are ignored);
// - morphology uses a separable min/max filter over a rectangular window, since
//   `imageproc::morphology` only offers norm-ball structuring elements.

use crate::core_modules::bounding_box::{BoundingBox, Point};
use crate::error::BoardError;
use image::{GrayImage, Luma};
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

/// The traced outline of one connected foreground region.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// The minimal axis-aligned rectangle covering every point (inclusive).
    pub fn bounding_rect(&self) -> Result<BoundingBox, BoardError> {
        let first = self.points.first().ok_or(BoardError::MalformedBox { x: 0, y: 0, w: 0, h: 0 })?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// Polygon area enclosed by the contour points (shoelace formula).
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice_area: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum();
        twice_area.abs() as f64 / 2.0
    }
}

/// A rectangular structuring element, anchored at its center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    pub width: u32,
    pub height: u32,
}

impl Kernel {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Erode,
    Dilate,
    /// Erosion followed by dilation; removes foreground smaller than the kernel.
    Open,
    /// Dilation followed by erosion; bridges background gaps smaller than the kernel.
    Close,
}

/// The external image-processing capability the engine depends on.
pub trait ImageBackend: Send + Sync {
    /// Outer borders of every top-level foreground region in `mask`.
    fn find_contours(&self, mask: &GrayImage) -> Vec<Contour>;

    /// Applies a morphological operation with a rectangular kernel.
    fn morphology(&self, mask: &GrayImage, kernel: Kernel, op: MorphOp) -> GrayImage;

    /// The minimal rectangle covering `contour`; the engine derives every box through this.
    fn bounding_rect(&self, contour: &Contour) -> Result<BoundingBox, BoardError> {
        contour.bounding_rect()
    }
}

/// `ImageBackend` built on the `image` and `imageproc` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocBackend;

impl ImageBackend for ImageprocBackend {
    fn find_contours(&self, mask: &GrayImage) -> Vec<Contour> {
        imageproc::contours::find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| Contour::new(c.points.into_iter().map(|p| Point::new(p.x, p.y)).collect()))
            .collect()
    }

    fn morphology(&self, mask: &GrayImage, kernel: Kernel, op: MorphOp) -> GrayImage {
        match op {
            MorphOp::Erode => erode(mask, kernel),
            MorphOp::Dilate => dilate(mask, kernel),
            MorphOp::Open => dilate(&erode(mask, kernel), kernel),
            MorphOp::Close => erode(&dilate(mask, kernel), kernel),
        }
    }
}

fn erode(mask: &GrayImage, kernel: Kernel) -> GrayImage {
    rect_filter(mask, kernel, u8::min, u8::MAX)
}

fn dilate(mask: &GrayImage, kernel: Kernel) -> GrayImage {
    rect_filter(mask, kernel, u8::max, u8::MIN)
}

/// Reduces every `kernel`-sized window with `reduce`, one axis at a time.
/// Pixels outside the image are skipped rather than padded.
fn rect_filter(mask: &GrayImage, kernel: Kernel, reduce: fn(u8, u8) -> u8, identity: u8) -> GrayImage {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 || kernel.width == 0 || kernel.height == 0 {
        return mask.clone();
    }

    // --- 1. Horizontal pass ---
    let anchor_x = (kernel.width / 2) as i64;
    let mut horizontal = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let start = (x as i64 - anchor_x).max(0);
            let end = (x as i64 - anchor_x + kernel.width as i64 - 1).min(width as i64 - 1);
            let value = (start..=end).fold(identity, |acc, sx| reduce(acc, mask.get_pixel(sx as u32, y)[0]));
            horizontal.put_pixel(x, y, Luma([value]));
        }
    }

    // --- 2. Vertical pass ---
    let anchor_y = (kernel.height / 2) as i64;
    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let start = (y as i64 - anchor_y).max(0);
        let end = (y as i64 - anchor_y + kernel.height as i64 - 1).min(height as i64 - 1);
        for x in 0..width {
            let value = (start..=end).fold(identity, |acc, sy| reduce(acc, horizontal.get_pixel(x, sy as u32)[0]));
            output.put_pixel(x, y, Luma([value]));
        }
    }

    output
}
