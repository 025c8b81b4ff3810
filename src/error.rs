// THEORY:
// Two error families live here. `BoardError` covers the three ways the geometric
// engine can be handed input it cannot reason about: nothing at all, statistics
// that collapse to zero, and boxes without area. Engine stages never surface
// these to callers; they turn them into empty or partial results and a log line.
// `PipelineError` covers everything around the engine that touches the outside
// world (image decoding, the filesystem, configuration files, the worker pool).

use thiserror::Error;

/// Input-validation failures inside the board reconstruction engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("no boxes available for {stage}")]
    EmptyInput { stage: &'static str },

    #[error("degenerate statistic in {stage}: {value}")]
    DegenerateStatistics { stage: &'static str, value: f64 },

    #[error("malformed box x={x} y={y} w={w} h={h}")]
    MalformedBox { x: i32, y: i32, w: i32, h: i32 },
}

/// Failures of the I/O and orchestration layer around the engine.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration in {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("worker pool failure: {0}")]
    Worker(String),
}
