// THEORY:
// The `RowGrouper` is the aggregation step of the horizontal path. Horizontal
// boards in a stack line up in shelves: every board on one shelf sits at about
// the same height in the image. The grouper clusters boxes into such rows and
// then discards rows that are too sparse to be a real shelf.
//
// This module solves a one-dimensional "data association problem".
//
// Key architectural principles:
// 1.  **Bottom-Up Assignment**: Boxes are visited from the bottom of the image
//     to the top. Each box joins the first existing row whose anchor (the mean
//     vertical center of its members) is within `y_threshold`, or starts a new
//     row. The anchor moves as members join.
// 2.  **Partition**: Clustering never drops or duplicates a box. Every input box
//     ends up in exactly one row; `cluster_rows` exposes this stage on its own.
// 3.  **Sparse Row Rejection**: A line segment that broke away from its shelf
//     forms a tiny row of its own. Rows with fewer than `min_row_fraction` of
//     the mean member count are dropped.
// 4.  **Frozen Output**: Once grouping finishes, rows are read-only. Consumers
//     get the members, the anchor and the enclosing rectangle.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::statistics::mean;
use crate::error::BoardError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowGrouperConfig {
    /// Maximum distance (exclusive) between a box's vertical center and a row anchor.
    pub y_threshold: f64,
    /// Rows need at least this fraction of the mean member count to be kept.
    pub min_row_fraction: f64,
}

impl Default for RowGrouperConfig {
    fn default() -> Self {
        Self {
            y_threshold: 75.0,
            min_row_fraction: 0.8,
        }
    }
}

/// A cluster of boxes sharing roughly the same vertical position.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Running mean of the members' vertical centers.
    anchor: f64,
    /// Members in the order they were assigned (bottom to top).
    members: Vec<BoundingBox>,
}

impl Row {
    fn new(first: BoundingBox) -> Self {
        Self {
            anchor: first.center_y() as f64,
            members: vec![first],
        }
    }

    fn push(&mut self, bbox: BoundingBox) {
        self.members.push(bbox);
        if let Some(anchor) = mean(self.members.iter().map(|b| b.center_y() as f64)) {
            self.anchor = anchor;
        }
    }

    pub fn anchor(&self) -> f64 {
        self.anchor
    }

    pub fn members(&self) -> &[BoundingBox] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The rectangle enclosing every member.
    pub fn bounds(&self) -> BoundingBox {
        // A row is created from a box and never loses one, so `members[0]` always exists.
        self.members[1..]
            .iter()
            .fold(self.members[0], |acc, b| acc.union(b))
    }
}

/// Clusters boxes into rows by vertical proximity, without filtering.
pub fn cluster_rows(boxes: &[BoundingBox], y_threshold: f64) -> Vec<Row> {
    let mut sorted = boxes.to_vec();
    sorted.sort_by(|a, b| b.y().cmp(&a.y()));

    let mut rows: Vec<Row> = Vec::new();
    for bbox in sorted {
        let center = bbox.center_y() as f64;
        match rows.iter_mut().find(|row| (center - row.anchor).abs() < y_threshold) {
            Some(row) => row.push(bbox),
            None => rows.push(Row::new(bbox)),
        }
    }
    rows
}

/// Mean number of members per row, `None` when there are no rows.
pub fn mean_row_count(rows: &[Row]) -> Option<f64> {
    mean(rows.iter().map(|r| r.len() as f64))
}

/// Clusters boxes into rows and keeps only rows of plausible size, ordered bottom to top.
pub fn group_rows(boxes: &[BoundingBox], config: &RowGrouperConfig) -> Vec<Row> {
    group_rows_with_mean(boxes, config).0
}

/// Like `group_rows`, also returning the mean member count of the clustering
/// the size filter was judged against (before any row was dropped).
pub fn group_rows_with_mean(boxes: &[BoundingBox], config: &RowGrouperConfig) -> (Vec<Row>, Option<f64>) {
    let mut rows = cluster_rows(boxes, config.y_threshold);
    let Some(mean_count) = mean_row_count(&rows) else {
        debug!(reason = %BoardError::EmptyInput { stage: "row grouper" }, "no rows to group");
        return (rows, None);
    };

    rows.sort_by(|a, b| b.anchor.total_cmp(&a.anchor));

    let min_count = config.min_row_fraction * mean_count;
    let before = rows.len();
    rows.retain(|row| row.len() as f64 >= min_count);

    debug!(before, after = rows.len(), mean_count, min_count, "row size filter");
    (rows, Some(mean_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    #[test]
    fn outlier_row_is_discarded() {
        let mut boxes: Vec<BoundingBox> = (0..4).map(|i| bbox(i * 60, 100, 50, 40)).collect();
        boxes.push(bbox(30, 500, 50, 40));

        let rows = group_rows(&boxes, &RowGrouperConfig::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 4);
        assert_eq!(rows[0].anchor(), 120.0);
        assert_eq!(rows[0].bounds(), bbox(0, 100, 230, 40));
    }

    #[test]
    fn mean_row_count_is_taken_before_filtering() {
        let mut boxes: Vec<BoundingBox> = (0..4).map(|i| bbox(i * 60, 100, 50, 40)).collect();
        boxes.push(bbox(30, 500, 50, 40));

        let (rows, mean_count) = group_rows_with_mean(&boxes, &RowGrouperConfig::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(mean_count, Some(2.5));
        assert_eq!(mean_row_count(&rows), Some(4.0));
    }

    #[test]
    fn row_exactly_at_the_size_floor_is_kept() {
        // Rows of 3 and 1 members with fraction 0.5: mean 2, floor exactly 1.
        let mut boxes: Vec<BoundingBox> = (0..3).map(|i| bbox(i * 60, 100, 50, 40)).collect();
        boxes.push(bbox(30, 500, 50, 40));
        let config = RowGrouperConfig { y_threshold: 75.0, min_row_fraction: 0.5 };

        assert_eq!(group_rows(&boxes, &config).len(), 2);
    }

    #[test]
    fn rows_are_ordered_bottom_to_top() {
        let boxes = [
            bbox(0, 50, 40, 10),
            bbox(50, 50, 40, 10),
            bbox(0, 300, 40, 10),
            bbox(50, 300, 40, 10),
            bbox(0, 175, 40, 10),
            bbox(50, 175, 40, 10),
        ];
        let rows = group_rows(&boxes, &RowGrouperConfig::default());
        let anchors: Vec<f64> = rows.iter().map(Row::anchor).collect();
        assert_eq!(anchors, vec![305.0, 180.0, 55.0]);
    }

    #[test]
    fn anchor_tracks_running_mean() {
        // Centers 205, 155, 105, visited bottom-up. 155 joins the first row (|155-205| < 75),
        // moving the anchor to 180; 105 is then 75 away, which is not strictly within the threshold.
        let boxes = [bbox(0, 200, 10, 10), bbox(0, 150, 10, 10), bbox(0, 100, 10, 10)];
        let rows = cluster_rows(&boxes, 75.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].anchor(), 180.0);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].anchor(), 105.0);
    }

    #[test]
    fn clustering_is_a_partition() {
        let boxes: Vec<BoundingBox> = (0..12).map(|i| bbox(i * 7, (i * 37) % 400, 5, 8)).collect();
        let rows = cluster_rows(&boxes, 75.0);
        let total: usize = rows.iter().map(Row::len).sum();
        assert_eq!(total, boxes.len());
        for b in &boxes {
            let owners = rows.iter().filter(|r| r.members().contains(b)).count();
            assert_eq!(owners, 1);
        }
    }

    #[test]
    fn empty_input_groups_to_nothing() {
        assert!(group_rows(&[], &RowGrouperConfig::default()).is_empty());
        assert_eq!(group_rows_with_mean(&[], &RowGrouperConfig::default()), (Vec::new(), None));
        assert_eq!(mean_row_count(&[]), None);
    }
}
