// THEORY:
// A vertical board whose line is broken in the mask shows up as two short boxes
// stacked on top of each other. The fragment merger undoes that: two boxes
// whose horizontal centers line up and whose heights together come close to
// one expected board height are replaced by the rectangle enclosing both.
//
// Key architectural principles:
// 1.  **Greedy, Single Pass**: Boxes are scanned in input order. Each unused
//     box pairs with the first later unused box that qualifies, and both are
//     then marked used. There is no search for a globally best pairing.
// 2.  **Explicit Index Tracking**: Used boxes are tracked in a `Vec<bool>`
//     indexed by position, rather than by removing items from the live list,
//     so the iteration order is fixed by the input alone.
// 3.  **Enclosing Rectangle**: The merged box is the union of both inputs, not
//     the sum of their sizes, so any gap between the fragments is absorbed.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::statistics::require_positive;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergerConfig {
    /// Maximum difference between horizontal centers, in pixels (exclusive).
    pub align_tolerance: i32,
    /// Maximum relative deviation of the summed heights from the expected height (exclusive).
    pub height_tolerance: f64,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            align_tolerance: 50,
            height_tolerance: 0.3,
        }
    }
}

/// Merges vertically-aligned fragments that together make up one board.
pub fn merge_fragments(boxes: &[BoundingBox], expected_height: f64, config: &MergerConfig) -> Vec<BoundingBox> {
    let expected_height = match require_positive("fragment merger", expected_height) {
        Ok(value) => value,
        Err(reason) => {
            debug!(%reason, "merging disabled");
            return boxes.to_vec();
        }
    };

    let mut used = vec![false; boxes.len()];
    let mut merged = Vec::with_capacity(boxes.len());

    for i in 0..boxes.len() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let partner = (i + 1..boxes.len())
            .find(|&j| !used[j] && is_merge_candidate(&boxes[i], &boxes[j], expected_height, config));

        match partner {
            Some(j) => {
                used[j] = true;
                let joined = boxes[i].union(&boxes[j]);
                debug!(first = ?boxes[i], second = ?boxes[j], ?joined, "merged fragments");
                merged.push(joined);
            }
            None => merged.push(boxes[i]),
        }
    }

    merged
}

fn is_merge_candidate(a: &BoundingBox, b: &BoundingBox, expected_height: f64, config: &MergerConfig) -> bool {
    let aligned = (a.center_x() - b.center_x()).abs() < config.align_tolerance;
    let combined = (a.height() + b.height()) as f64;
    aligned && (combined - expected_height).abs() / expected_height < config.height_tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    fn tight() -> MergerConfig {
        MergerConfig {
            align_tolerance: 5,
            height_tolerance: 0.25,
        }
    }

    #[test]
    fn broken_board_is_rejoined() {
        let boxes = [bbox(100, 0, 20, 15), bbox(100, 15, 20, 25)];
        assert_eq!(merge_fragments(&boxes, 40.0, &tight()), vec![bbox(100, 0, 20, 40)]);
    }

    #[test]
    fn merged_box_spans_the_gap_between_fragments() {
        let boxes = [bbox(100, 60, 20, 20), bbox(102, 0, 20, 20)];
        assert_eq!(merge_fragments(&boxes, 40.0, &tight()), vec![bbox(100, 0, 22, 80)]);
    }

    #[test]
    fn misaligned_fragments_stay_apart() {
        let boxes = [bbox(100, 0, 20, 15), bbox(200, 15, 20, 25)];
        assert_eq!(merge_fragments(&boxes, 40.0, &tight()), boxes.to_vec());
    }

    #[test]
    fn center_offset_equal_to_tolerance_is_not_aligned() {
        // Centers 110 and 115 differ by exactly align_tolerance = 5.
        let boxes = [bbox(100, 0, 20, 15), bbox(105, 15, 20, 25)];
        assert_eq!(merge_fragments(&boxes, 40.0, &tight()), boxes.to_vec());
    }

    #[test]
    fn height_deviation_equal_to_tolerance_is_not_merged() {
        // Summed height 50 against 40 is off by exactly 0.25.
        let boxes = [bbox(0, 0, 10, 20), bbox(0, 30, 10, 30)];
        assert_eq!(merge_fragments(&boxes, 40.0, &tight()), boxes.to_vec());

        // One pixel shorter falls inside the tolerance.
        let boxes = [bbox(0, 0, 10, 20), bbox(0, 30, 10, 29)];
        assert_eq!(merge_fragments(&boxes, 40.0, &tight()), vec![bbox(0, 0, 10, 59)]);
    }

    #[test]
    fn full_height_boards_are_not_merged() {
        // Summed height 80 is 100% off an expected 40.
        let boxes = [bbox(100, 0, 20, 40), bbox(100, 50, 20, 40)];
        assert_eq!(merge_fragments(&boxes, 40.0, &tight()), boxes.to_vec());
    }

    #[test]
    fn pairing_is_greedy_in_input_order() {
        // a pairs with b (first eligible), leaving c alone even though a+c would also fit.
        let a = bbox(0, 0, 10, 20);
        let b = bbox(0, 25, 10, 20);
        let c = bbox(0, 50, 10, 20);
        assert_eq!(merge_fragments(&[a, b, c], 40.0, &tight()), vec![bbox(0, 0, 10, 45), c]);
    }

    #[test]
    fn degenerate_expected_height_disables_merging() {
        let boxes = [bbox(100, 0, 20, 15), bbox(100, 15, 20, 25)];
        assert_eq!(merge_fragments(&boxes, 0.0, &tight()), boxes.to_vec());
    }
}
