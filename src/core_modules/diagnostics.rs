// THEORY:
// The engine's stages are pure functions; reporting what they found is the
// pipeline's job. Rather than printing from inside the pipeline, every report
// goes through a `DiagnosticsSink` injected at construction time.
//
// - `TracingSink` (the default) turns events into `tracing` records, so the
//   binary's subscriber decides formatting and verbosity.
// - `RecordingSink` keeps events in memory, which is what tests assert on.
//
// Sinks take `&self` and must be `Send + Sync`: one sink is shared by every
// worker of the parallel pipeline.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::gap_filler::GapEstimate;
use crate::core_modules::statistics::RunStatistics;
use crate::error::BoardError;
use std::sync::Mutex;
use tracing::{debug, info};

/// Which axis of boards a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAxis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// A path produced nothing for this image, and why.
    EmptyResult { axis: BoardAxis, reason: BoardError },
    /// The vertical boxes left after splitting, nesting removal and merging.
    BoxesCleaned { boxes: Vec<BoundingBox>, statistics: RunStatistics },
    /// One positive gap between adjacent vertical boards.
    Gap(GapEstimate),
    /// One retained horizontal row.
    RowAccepted { index: usize, anchor: f64, members: usize },
    /// Final count of boards for one axis.
    Total { axis: BoardAxis, count: usize, virtual_count: usize },
}

/// Receives the pipeline's per-image findings.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::EmptyResult { axis, reason } => {
                info!(?axis, %reason, "no boards found");
            }
            DiagnosticEvent::BoxesCleaned { boxes, statistics } => {
                for (i, b) in boxes.iter().enumerate() {
                    debug!(board = i + 1, area = b.area(), width = b.width(), height = b.height(), "adjusted board");
                }
                debug!(
                    mean_area = statistics.mean_area,
                    mean_width = statistics.mean_width,
                    mean_height = statistics.mean_height,
                    total = boxes.len(),
                    "boards after cleaning"
                );
            }
            DiagnosticEvent::Gap(gap) => {
                if gap.inserted > 0 {
                    info!(
                        between = gap.index + 1,
                        and = gap.index + 2,
                        separation = gap.separation,
                        estimated = gap.estimated,
                        inserted = gap.inserted,
                        "filled gap with virtual boards"
                    );
                }
            }
            DiagnosticEvent::RowAccepted { index, anchor, members } => {
                info!(line = index + 1, y = anchor, boards = members, "horizontal line");
            }
            DiagnosticEvent::Total { axis, count, virtual_count } => {
                info!(?axis, count, virtual_count, "total boards");
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticsSink for RecordingSink {
    fn record(&self, event: DiagnosticEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_events_in_order() {
        let sink = RecordingSink::new();
        sink.record(DiagnosticEvent::Total { axis: BoardAxis::Vertical, count: 3, virtual_count: 1 });
        sink.record(DiagnosticEvent::RowAccepted { index: 0, anchor: 120.0, members: 4 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DiagnosticEvent::Total { count: 3, .. }));
        assert!(matches!(events[1], DiagnosticEvent::RowAccepted { members: 4, .. }));
    }

    #[test]
    fn tracing_sink_accepts_every_event() {
        let sink = TracingSink;
        sink.record(DiagnosticEvent::EmptyResult {
            axis: BoardAxis::Horizontal,
            reason: BoardError::EmptyInput { stage: "row grouper" },
        });
        sink.record(DiagnosticEvent::Gap(GapEstimate { index: 0, separation: 80, estimated: 4.0, inserted: 4 }));
    }
}
