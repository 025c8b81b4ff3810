//! Property-based tests for the board reconstruction stages.
//!
//! Each stage is a pure function over bounding boxes, so its invariants can be
//! checked against arbitrary box sets rather than hand-picked masks.

use pallet_vision::core_modules::bounding_box::BoundingBox;
use pallet_vision::core_modules::fragment_merger::{MergerConfig, merge_fragments};
use pallet_vision::core_modules::gap_filler::fill_gaps;
use pallet_vision::core_modules::nested_remover::remove_nested;
use pallet_vision::core_modules::region_splitter::{SplitterConfig, split_oversized};
use pallet_vision::core_modules::row_grouper::cluster_rows;
use proptest::prelude::*;

fn arb_box() -> impl Strategy<Value = BoundingBox> {
    (0..500i32, 0..500i32, 1..120i32, 1..120i32).prop_map(|(x, y, w, h)| BoundingBox::new(x, y, w, h).unwrap())
}

fn arb_boxes() -> impl Strategy<Value = Vec<BoundingBox>> {
    prop::collection::vec(arb_box(), 0..40)
}

// ============================================================================
// Nested Box Removal
// ============================================================================

/// Property: removal never grows the set and a second pass changes nothing
#[test]
fn proptest_nested_removal_is_idempotent() {
    proptest!(|(boxes in arb_boxes(), threshold in 0.05f64..1.0)| {
        let once = remove_nested(&boxes, threshold);
        prop_assert!(once.len() <= boxes.len());
        prop_assert_eq!(remove_nested(&once, threshold), once);
    });
}

// ============================================================================
// Oversized Region Splitting
// ============================================================================

/// Property: splitting never loses boxes and at most doubles them
#[test]
fn proptest_split_count_bounds() {
    proptest!(|(boxes in arb_boxes(), mean_area in 1.0f64..5000.0)| {
        let split = split_oversized(&boxes, mean_area, &SplitterConfig::default());
        prop_assert!(split.len() >= boxes.len());
        prop_assert!(split.len() <= boxes.len() * 2);
        prop_assert!(split.iter().all(|b| b.width() > 0 && b.height() > 0));
    });
}

/// Property: the two halves of a split box tile it exactly
#[test]
fn proptest_split_preserves_total_area() {
    proptest!(|(boxes in arb_boxes(), mean_area in 1.0f64..5000.0)| {
        let split = split_oversized(&boxes, mean_area, &SplitterConfig::default());
        let before: i64 = boxes.iter().map(BoundingBox::area).sum();
        let after: i64 = split.iter().map(BoundingBox::area).sum();
        prop_assert_eq!(before, after);
    });
}

// ============================================================================
// Fragment Merging
// ============================================================================

/// Property: merging never grows the set and every input ends up inside an output
#[test]
fn proptest_merge_contains_sources() {
    proptest!(|(boxes in arb_boxes(), expected in 1.0f64..200.0)| {
        let merged = merge_fragments(&boxes, expected, &MergerConfig::default());
        prop_assert!(merged.len() <= boxes.len());
        for source in &boxes {
            prop_assert!(merged.iter().any(|m| m.contains(source)));
        }
    });
}

// ============================================================================
// Gap Filling
// ============================================================================

/// Property: a positive gap receives exactly floor(separation / mean_width) boards
#[test]
fn proptest_gap_count_is_floor_of_estimate() {
    proptest!(|(
        left_x in 0..200i32,
        left_w in 1..60i32,
        separation in 1..400i32,
        right_w in 1..60i32,
        mean_width in 1.0f64..80.0,
    )| {
        let left = BoundingBox::new(left_x, 10, left_w, 50).unwrap();
        let right = BoundingBox::new(left_x + left_w + separation, 10, right_w, 50).unwrap();

        let fill = fill_gaps(&[left, right], mean_width);

        let expected = (separation as f64 / mean_width).floor() as usize;
        prop_assert_eq!(fill.virtual_count(), expected);
        prop_assert_eq!(fill.boxes.len(), expected + 2);
    });
}

/// Property: touching or overlapping neighbours never get virtual boards
#[test]
fn proptest_no_gap_no_virtual_boards() {
    proptest!(|(x in 0..200i32, w in 1..60i32, overlap in 0..60i32, mean_width in 1.0f64..80.0)| {
        let left = BoundingBox::new(x, 0, w, 40).unwrap();
        let right = BoundingBox::new(x + w - overlap.min(w - 1).max(0), 0, 30, 40).unwrap();
        let fill = fill_gaps(&[left, right], mean_width);
        prop_assert_eq!(fill.virtual_count(), 0);
    });
}

// ============================================================================
// Row Clustering
// ============================================================================

/// Property: every box belongs to exactly one row
#[test]
fn proptest_rows_partition_input() {
    proptest!(|(boxes in arb_boxes(), threshold in 1.0f64..150.0)| {
        let rows = cluster_rows(&boxes, threshold);
        let members: usize = rows.iter().map(|r| r.len()).sum();
        prop_assert_eq!(members, boxes.len());
        prop_assert!(rows.iter().all(|r| !r.is_empty()));

        // Each box is placed exactly as many times as it occurs in the input,
        // and every member came from the input.
        for b in &boxes {
            let in_input = boxes.iter().filter(|other| *other == b).count();
            let in_rows: usize = rows
                .iter()
                .map(|r| r.members().iter().filter(|m| *m == b).count())
                .sum();
            prop_assert_eq!(in_rows, in_input);
        }
        for row in &rows {
            prop_assert!(row.members().iter().all(|m| boxes.contains(m)));
        }
    });
}
