// THEORY:
// The `GapFiller` is the occlusion-recovery step of the vertical path. Boards
// in a stack sit side by side; when one is hidden or its line never made it
// into the mask, the stack shows a hole roughly one board wide. The filler
// walks the boards from right to left and, wherever two neighbours are far
// enough apart, inserts "virtual" boards to account for the missing ones.
//
// Key architectural principles & algorithm steps:
// 1.  **Right-to-Left Walk**: Boxes are sorted by `x` descending. For each
//     adjacent pair the separation is the distance from the left edge of the
//     right box to the right edge of the left box.
// 2.  **Whole Boards Only**: A positive separation holds
//     `floor(separation / mean_width)` missing boards. Touching or overlapping
//     neighbours (separation <= 0) get nothing.
// 3.  **Global Width**: Every virtual board is exactly `mean_width` wide and
//     takes the height and top of the box on its right. Local neighbour widths
//     are deliberately ignored.
// 4.  **Bounded Output**: A single gap never receives more than
//     `MAX_VIRTUAL_PER_GAP` boards, whatever the mean width. A near-zero mean
//     over a wide separation would otherwise allocate without limit.
// 5.  **Provenance**: Every output box carries a `BoxOrigin` tag so the render
//     stage can tell observed boards from estimated ones.

use crate::core_modules::bounding_box::{BoundingBox, TaggedBox};
use tracing::{debug, warn};

/// Virtual boxes narrower than one pixel cannot be placed.
const MIN_VIRTUAL_WIDTH: f64 = 1.0;

/// Upper bound on virtual boards inserted into one gap.
pub const MAX_VIRTUAL_PER_GAP: usize = 1024;

/// What the filler concluded about one adjacent pair of boards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapEstimate {
    /// Position of the right-hand box in the sorted order.
    pub index: usize,
    pub separation: i32,
    /// `separation / mean_width`, before flooring.
    pub estimated: f64,
    pub inserted: usize,
}

/// Output of the gap filler: every board (observed and virtual) plus a trace of each gap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapFill {
    pub boxes: Vec<TaggedBox>,
    pub gaps: Vec<GapEstimate>,
}

impl GapFill {
    pub fn virtual_count(&self) -> usize {
        self.boxes.iter().filter(|b| b.is_virtual()).count()
    }
}

/// Sorts boxes right to left. The sort is stable, so ties keep their input order.
pub fn sort_right_to_left(boxes: &[BoundingBox]) -> Vec<BoundingBox> {
    let mut sorted = boxes.to_vec();
    sorted.sort_by(|a, b| b.x().cmp(&a.x()));
    sorted
}

/// Inserts virtual boards into every gap wide enough to hold at least one.
///
/// Each gap holds at most [`MAX_VIRTUAL_PER_GAP`] boards; the estimate is still
/// reported unclamped in its [`GapEstimate`].
pub fn fill_gaps(boxes: &[BoundingBox], mean_width: f64) -> GapFill {
    let sorted = sort_right_to_left(boxes);
    let Some(first) = sorted.first() else {
        return GapFill::default();
    };

    let can_place = mean_width.is_finite() && mean_width >= MIN_VIRTUAL_WIDTH;
    if !can_place {
        debug!(mean_width, "mean width too small, no virtual boards will be placed");
    }

    let mut extended = vec![TaggedBox::observed(*first)];
    let mut gaps = Vec::new();

    for (i, pair) in sorted.windows(2).enumerate() {
        let (current, next) = (pair[0], pair[1]);
        let separation = current.x() - next.right();

        if separation > 0 && can_place {
            let estimated = separation as f64 / mean_width;
            let whole = estimated.floor() as usize;
            let count = whole.min(MAX_VIRTUAL_PER_GAP);
            if count < whole {
                warn!(separation, mean_width, estimated, cap = MAX_VIRTUAL_PER_GAP, "gap estimate capped");
            }
            let width = mean_width.floor() as i32;

            for n in 0..count {
                let gap_x = (current.x() as f64 - (n + 1) as f64 * mean_width).floor() as i32;
                if let Ok(virtual_box) = BoundingBox::new(gap_x, current.y(), width, current.height()) {
                    extended.push(TaggedBox::synthetic(virtual_box));
                }
            }

            debug!(between = i + 1, and = i + 2, separation, estimated, inserted = count, "gap estimate");
            gaps.push(GapEstimate {
                index: i,
                separation,
                estimated,
                inserted: count,
            });
        }

        extended.push(TaggedBox::observed(next));
    }

    extended.sort_by(|a, b| b.bbox.x().cmp(&a.bbox.x()));
    GapFill { boxes: extended, gaps }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    #[test]
    fn four_boards_fill_an_eighty_pixel_gap() {
        let fill = fill_gaps(&[bbox(100, 0, 20, 50), bbox(200, 0, 20, 50)], 20.0);

        assert_eq!(fill.virtual_count(), 4);
        let xs: Vec<i32> = fill.boxes.iter().map(|b| b.bbox.x()).collect();
        assert_eq!(xs, vec![200, 180, 160, 140, 120, 100]);
        assert!(fill.boxes[1..5].iter().all(|b| b.is_virtual() && b.bbox.width() == 20));
        assert!(!fill.boxes[0].is_virtual());
        assert!(!fill.boxes[5].is_virtual());
        assert_eq!(
            fill.gaps,
            vec![GapEstimate { index: 0, separation: 80, estimated: 4.0, inserted: 4 }]
        );
    }

    #[test]
    fn virtual_boards_take_height_of_right_neighbour() {
        let fill = fill_gaps(&[bbox(0, 30, 20, 70), bbox(60, 10, 20, 90)], 20.0);
        let virtuals: Vec<&TaggedBox> = fill.boxes.iter().filter(|b| b.is_virtual()).collect();
        assert_eq!(virtuals.len(), 2);
        assert!(virtuals.iter().all(|b| b.bbox.y() == 10 && b.bbox.height() == 90));
    }

    #[test]
    fn touching_and_overlapping_boards_get_nothing() {
        let fill = fill_gaps(&[bbox(0, 0, 20, 50), bbox(20, 0, 20, 50), bbox(35, 0, 20, 50)], 20.0);
        assert_eq!(fill.virtual_count(), 0);
        assert!(fill.gaps.is_empty());
        assert_eq!(fill.boxes.len(), 3);
    }

    #[test]
    fn partial_gap_is_floored() {
        let fill = fill_gaps(&[bbox(0, 0, 20, 50), bbox(59, 0, 20, 50)], 20.0);
        assert_eq!(fill.virtual_count(), 1);
        assert_eq!(fill.gaps[0].inserted, 1);
        assert!((fill.gaps[0].estimated - 1.95).abs() < 1e-9);
    }

    #[test]
    fn output_is_sorted_right_to_left() {
        let fill = fill_gaps(&[bbox(10, 0, 5, 5), bbox(300, 0, 5, 5), bbox(150, 0, 5, 5)], 50.0);
        let xs: Vec<i32> = fill.boxes.iter().map(|b| b.bbox.x()).collect();
        let mut expected = xs.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(xs, expected);
    }

    #[test]
    fn empty_and_single_inputs() {
        assert_eq!(fill_gaps(&[], 20.0), GapFill::default());
        let single = fill_gaps(&[bbox(5, 5, 10, 10)], 20.0);
        assert_eq!(single.boxes, vec![TaggedBox::observed(bbox(5, 5, 10, 10))]);
    }

    #[test]
    fn huge_gap_with_one_pixel_mean_is_capped() {
        let fill = fill_gaps(&[bbox(0, 0, 1, 10), bbox(1_000_001, 0, 1, 10)], 1.0);

        assert_eq!(fill.virtual_count(), MAX_VIRTUAL_PER_GAP);
        assert_eq!(fill.boxes.len(), MAX_VIRTUAL_PER_GAP + 2);
        assert_eq!(fill.gaps[0].separation, 1_000_000);
        assert_eq!(fill.gaps[0].estimated, 1_000_000.0);
        assert_eq!(fill.gaps[0].inserted, MAX_VIRTUAL_PER_GAP);
        // The capped boards stay packed against the right neighbour.
        assert_eq!(fill.boxes[1].bbox.x(), 1_000_000);
        assert!(fill.boxes[1..=MAX_VIRTUAL_PER_GAP].iter().all(|b| b.is_virtual()));
    }

    #[test]
    fn sub_pixel_mean_width_places_nothing() {
        let fill = fill_gaps(&[bbox(0, 0, 20, 50), bbox(200, 0, 20, 50)], 0.5);
        assert_eq!(fill.virtual_count(), 0);
        assert_eq!(fill.boxes.len(), 2);
    }
}
