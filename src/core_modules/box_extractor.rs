// THEORY:
// The `BoxExtractor` is the entry gate of the board reconstruction engine. It
// turns the raw contours handed over by the image backend into bounding boxes
// and throws away the obvious noise before any geometry is attempted.
//
// Key architectural principles & algorithm steps:
// 1.  **Boundary Validation**: Every contour is reduced to its bounding rectangle.
//     Empty contours and rectangles that do not fit inside the mask are rejected
//     here as `MalformedBox`, so nothing downstream ever sees a zero-area box.
// 2.  **Absolute Floor (optional)**: Contours whose enclosed polygon area is
//     below `min_contour_area` are dropped. The vertical path uses this to
//     discard specks left over after fragment connection.
// 3.  **Relative Outlier Filter**: The mean box area is computed over the
//     survivors, and any box smaller than `area_ratio` times that mean is
//     discarded. Small fragments are judged against the image's own boards,
//     not a fixed pixel count.
// 4.  **Stateless Utility**: Like the other stages, extraction is a pure
//     function of its inputs. An empty contour list is a normal outcome and
//     yields an empty box set.

use crate::core_modules::backend::{Contour, ImageBackend};
use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::statistics::mean;
use crate::error::BoardError;
use serde::{Deserialize, Serialize};

/// Tunables for turning contours into bounding boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Boxes with area below `area_ratio * mean_area` are outliers.
    pub area_ratio: f64,
    /// Contours enclosing less polygon area than this are dropped. `0.0` disables the check.
    pub min_contour_area: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            area_ratio: 0.1,
            min_contour_area: 0.0,
        }
    }
}

pub mod box_extractor {
    use super::*;
    use tracing::{debug, warn};

    /// Converts contours into validated, area-filtered bounding boxes.
    pub fn extract_boxes(
        backend: &dyn ImageBackend,
        contours: &[Contour],
        mask_width: u32,
        mask_height: u32,
        config: &ExtractorConfig,
    ) -> Vec<BoundingBox> {
        let mut boxes = Vec::with_capacity(contours.len());

        for contour in contours {
            if config.min_contour_area > 0.0 && contour.area() < config.min_contour_area {
                continue;
            }

            match backend
                .bounding_rect(contour)
                .and_then(|b| fit_within(b, mask_width, mask_height))
            {
                Ok(bbox) => boxes.push(bbox),
                Err(reason) => warn!(%reason, "rejected contour at extraction"),
            }
        }

        filter_by_area(boxes, config.area_ratio)
    }

    /// Drops boxes smaller than `ratio` times the mean area of the set.
    pub fn filter_by_area(boxes: Vec<BoundingBox>, ratio: f64) -> Vec<BoundingBox> {
        let Some(mean_area) = mean(boxes.iter().map(|b| b.area() as f64)) else {
            debug!(
                reason = %BoardError::EmptyInput { stage: "box extraction" },
                "no boxes to filter"
            );
            return boxes;
        };

        let threshold = mean_area * ratio;
        let before = boxes.len();
        let kept: Vec<BoundingBox> = boxes
            .into_iter()
            .filter(|b| b.area() as f64 >= threshold)
            .collect();

        debug!(before, after = kept.len(), mean_area, threshold, "area outlier filter");
        kept
    }

    fn fit_within(bbox: BoundingBox, width: u32, height: u32) -> Result<BoundingBox, BoardError> {
        let inside = bbox.x() >= 0
            && bbox.y() >= 0
            && bbox.right() as i64 <= width as i64
            && bbox.bottom() as i64 <= height as i64;
        if inside {
            Ok(bbox)
        } else {
            Err(BoardError::MalformedBox {
                x: bbox.x(),
                y: bbox.y(),
                w: bbox.width(),
                h: bbox.height(),
            })
        }
    }
}
