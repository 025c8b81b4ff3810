// THEORY:
// Splitting and noisy contour tracing both leave duplicate detections behind: a
// fragment sitting inside a larger board, or a half that overlaps its
// neighbour. The nested remover keeps a box only if no other single box covers
// at least `overlap_threshold` of its area.
//
// Coverage is checked pairwise, never cumulatively. A box overlapped 40% by one
// neighbour and 40% by another survives. The comparison is all-pairs, O(n^2),
// which is fine for the tens of boards found in one image.

use crate::core_modules::bounding_box::BoundingBox;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestedConfig {
    /// Fraction of a box's own area that another box must cover to absorb it.
    pub overlap_threshold: f64,
}

impl Default for NestedConfig {
    fn default() -> Self {
        Self { overlap_threshold: 0.5 }
    }
}

/// Removes boxes that are mostly contained inside another box.
///
/// Exact duplicates collapse to their first occurrence before the comparison,
/// so a doubly-detected board is kept once. Survivors keep their input order.
pub fn remove_nested(boxes: &[BoundingBox], overlap_threshold: f64) -> Vec<BoundingBox> {
    let mut distinct: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for bbox in boxes {
        if !distinct.contains(bbox) {
            distinct.push(*bbox);
        }
    }

    let keep: Vec<BoundingBox> = distinct
        .iter()
        .enumerate()
        .filter(|(i, inner)| {
            let area = inner.area() as f64;
            !distinct
                .iter()
                .enumerate()
                .any(|(j, outer)| j != *i && inner.intersection_area(outer) as f64 / area >= overlap_threshold)
        })
        .map(|(_, bbox)| *bbox)
        .collect();

    debug!(before = boxes.len(), after = keep.len(), "nested box removal");
    keep
}
