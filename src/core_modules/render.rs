// THEORY:
// Rendering is the last, purely cosmetic stage. It never feeds back into the
// engine: it takes the boxes and rows the engine settled on and paints them
// over a grayscale base so a person can check the result at a glance.
//
// Colour conventions:
// - observed vertical boards: green
// - virtual (estimated) vertical boards: orange
// - horizontal rows: green on the horizontal view, magenta on the combined view
//
// The vertical and horizontal views also number every board and row at its
// center, counting in output order (right to left, bottom to top). Label size
// grows with the box so numbers stay legible on large scans.

use crate::core_modules::bounding_box::{BoundingBox, TaggedBox};
use crate::core_modules::row_grouper::Row;
use ab_glyph::{FontRef, PxScale};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::warn;

pub const OBSERVED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const VIRTUAL_COLOR: Rgb<u8> = Rgb([255, 125, 0]);
pub const COMBINED_ROW_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

const LINE_THICKNESS: u32 = 2;

static LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");
/// Label height for boxes up to 500px on their long side.
const BOARD_LABEL_PX: f32 = 22.0;
const ROW_LABEL_PX: f32 = 33.0;

fn label_font() -> Option<FontRef<'static>> {
    match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(error = %e, "label font unavailable, drawing boxes without numbers");
            None
        }
    }
}

/// Label height for a board: one step per 500px of its long side, never below one.
pub fn board_label_px(bbox: &BoundingBox) -> f32 {
    let long_side = bbox.width().max(bbox.height()) as f32;
    BOARD_LABEL_PX * (long_side / 500.0).max(1.0)
}

/// Writes `text` centered on `bbox`.
pub fn draw_label(canvas: &mut RgbImage, font: &FontRef<'_>, bbox: &BoundingBox, text: &str, px: f32, color: Rgb<u8>) {
    let scale = PxScale::from(px);
    let (text_w, text_h) = text_size(scale, font, text);
    let x = bbox.x() + (bbox.width() - text_w as i32) / 2;
    let y = bbox.y() + (bbox.height() - text_h as i32) / 2;
    draw_text_mut(canvas, color, x, y, scale, font, text);
}

/// Expands a grayscale base into three identical channels.
pub fn to_rgb(base: &GrayImage) -> RgbImage {
    RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let v = base.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

/// Outlines `bbox` with a border `LINE_THICKNESS` pixels wide, drawn inwards.
pub fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (w, h) = (bbox.width() as u32, bbox.height() as u32);
    for t in 0..LINE_THICKNESS {
        let inner_w = w.saturating_sub(2 * t);
        let inner_h = h.saturating_sub(2 * t);
        if inner_w > 0 && inner_h > 0 {
            let rect = Rect::at(bbox.x() + t as i32, bbox.y() + t as i32).of_size(inner_w, inner_h);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }
}

pub fn render_vertical(base: &GrayImage, boards: &[TaggedBox]) -> RgbImage {
    let mut canvas = to_rgb(base);
    let font = label_font();
    for (i, board) in boards.iter().enumerate() {
        let color = if board.is_virtual() { VIRTUAL_COLOR } else { OBSERVED_COLOR };
        draw_box(&mut canvas, &board.bbox, color);
        if let Some(font) = &font {
            let px = board_label_px(&board.bbox);
            draw_label(&mut canvas, font, &board.bbox, &(i + 1).to_string(), px, color);
        }
    }
    canvas
}

pub fn render_rows(base: &GrayImage, rows: &[Row]) -> RgbImage {
    let mut canvas = to_rgb(base);
    let font = label_font();
    for (i, row) in rows.iter().enumerate() {
        let bounds = row.bounds();
        draw_box(&mut canvas, &bounds, OBSERVED_COLOR);
        if let Some(font) = &font {
            draw_label(&mut canvas, font, &bounds, &(i + 1).to_string(), ROW_LABEL_PX, OBSERVED_COLOR);
        }
    }
    canvas
}

/// Rows and vertical boards together over the normalized image. Virtual boards
/// are drawn in the same colour as observed ones here.
pub fn render_combined(normalized: &GrayImage, rows: &[Row], boards: &[TaggedBox]) -> RgbImage {
    let mut canvas = to_rgb(normalized);
    for row in rows {
        draw_box(&mut canvas, &row.bounds(), COMBINED_ROW_COLOR);
    }
    for board in boards {
        draw_box(&mut canvas, &board.bbox, OBSERVED_COLOR);
    }
    canvas
}
