// THEORY:
// Every threshold in the engine is relative: "1.5x the mean area", "within 30%
// of the mean height", "at least 80% of the mean row size". `RunStatistics` is
// the single, read-only snapshot of those means for one image. It is computed
// once from the current box set and never carried over to the next image.
//
// The mean of an empty set is undefined, so construction from no boxes fails
// with `EmptyInput` instead of producing NaN. Callers that divide by a mean go
// through `require_positive`, which turns a zero or near-zero statistic into
// `DegenerateStatistics` before it can poison a comparison.

use crate::core_modules::bounding_box::BoundingBox;
use crate::error::BoardError;

/// Means below this are treated as zero.
pub const DEGENERATE_EPSILON: f64 = 1e-6;

/// Arithmetic mean, or `None` for an empty input.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { None } else { Some(sum / count as f64) }
}

/// Passes `value` through if it can safely be used as a divisor or scale.
pub fn require_positive(stage: &'static str, value: f64) -> Result<f64, BoardError> {
    if value.is_finite() && value > DEGENERATE_EPSILON {
        Ok(value)
    } else {
        Err(BoardError::DegenerateStatistics { stage, value })
    }
}

/// Per-image aggregate statistics used as thresholds by downstream stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStatistics {
    pub mean_area: f64,
    pub mean_width: f64,
    pub mean_height: f64,
    /// Only known once rows have been clustered (horizontal path).
    pub mean_row_count: Option<f64>,
}

impl RunStatistics {
    /// Computes box means; fails on an empty set.
    pub fn from_boxes(boxes: &[BoundingBox]) -> Result<Self, BoardError> {
        let stage = "run statistics";
        let mean_area = mean(boxes.iter().map(|b| b.area() as f64)).ok_or(BoardError::EmptyInput { stage })?;
        let mean_width = mean(boxes.iter().map(|b| b.width() as f64)).ok_or(BoardError::EmptyInput { stage })?;
        let mean_height = mean(boxes.iter().map(|b| b.height() as f64)).ok_or(BoardError::EmptyInput { stage })?;
        Ok(Self {
            mean_area,
            mean_width,
            mean_height,
            mean_row_count: None,
        })
    }

    pub fn with_row_count(mut self, mean_row_count: f64) -> Self {
        self.mean_row_count = Some(mean_row_count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean(vec![2.0, 4.0]), Some(3.0));
    }

    #[test]
    fn statistics_from_empty_set_is_empty_input() {
        assert_eq!(
            RunStatistics::from_boxes(&[]),
            Err(BoardError::EmptyInput { stage: "run statistics" })
        );
    }

    #[test]
    fn statistics_from_boxes() {
        let boxes = [
            BoundingBox::new(0, 0, 10, 20).unwrap(),
            BoundingBox::new(50, 0, 30, 40).unwrap(),
        ];
        let stats = RunStatistics::from_boxes(&boxes).unwrap();
        assert_eq!(stats.mean_area, 700.0);
        assert_eq!(stats.mean_width, 20.0);
        assert_eq!(stats.mean_height, 30.0);
        assert_eq!(stats.mean_row_count, None);
        assert_eq!(stats.with_row_count(2.5).mean_row_count, Some(2.5));
    }

    #[test]
    fn zero_and_nan_are_degenerate() {
        assert!(require_positive("test", 0.0).is_err());
        assert!(require_positive("test", f64::NAN).is_err());
        assert_eq!(require_positive("test", 4.0), Ok(4.0));
    }
}
