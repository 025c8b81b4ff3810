// THEORY:
// When two neighbouring boards touch in the mask, contour tracing returns them
// as one oversized region. The splitter looks for boxes far above the mean area
// and cuts them in two along their long axis. It cuts exactly once: a region
// three times the mean becomes two halves that are still oversized. Recursive
// splitting is intentionally not attempted.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::statistics::require_positive;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// A box is oversized when its area exceeds `scale * mean_area`.
    pub scale: f64,
    /// The long side must exceed this many pixels before a cut is made.
    pub min_split_size: i32,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            scale: 1.5,
            min_split_size: 10,
        }
    }
}

/// Bisects every oversized box once along its dominant axis.
pub fn split_oversized(boxes: &[BoundingBox], mean_area: f64, config: &SplitterConfig) -> Vec<BoundingBox> {
    let mean_area = match require_positive("region splitter", mean_area) {
        Ok(value) => value,
        Err(reason) => {
            debug!(%reason, "splitting disabled");
            return boxes.to_vec();
        }
    };

    let limit = config.scale * mean_area;
    let mut adjusted = Vec::with_capacity(boxes.len() * 2);

    for bbox in boxes {
        if bbox.area() as f64 <= limit {
            adjusted.push(*bbox);
            continue;
        }
        match bisect(bbox, config.min_split_size) {
            Some((first, second)) => {
                debug!(?bbox, ?first, ?second, "split oversized region");
                adjusted.push(first);
                adjusted.push(second);
            }
            None => adjusted.push(*bbox),
        }
    }

    adjusted
}

/// Cuts tall boxes into stacked halves and wide boxes into side-by-side halves.
/// Square boxes, or boxes whose long side is too short, are left alone.
fn bisect(bbox: &BoundingBox, min_split_size: i32) -> Option<(BoundingBox, BoundingBox)> {
    let (x, y, w, h) = (bbox.x(), bbox.y(), bbox.width(), bbox.height());

    if h > w && h > min_split_size {
        let top = h / 2;
        let upper = BoundingBox::new(x, y, w, top).ok()?;
        let lower = BoundingBox::new(x, y + top, w, h - top).ok()?;
        Some((upper, lower))
    } else if w > h && w > min_split_size {
        let left = w / 2;
        let west = BoundingBox::new(x, y, left, h).ok()?;
        let east = BoundingBox::new(x + left, y, w - left, h).ok()?;
        Some((west, east))
    } else {
        None
    }
}
