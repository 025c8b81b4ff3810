// THEORY:
// This file is the main entry point for the `pallet_vision` library crate.
// It defines the public API exposed to external consumers, chiefly the
// `pallet_vision` binary that walks a folder of scans.
//
// The primary interface is `BoardPipeline` and its associated data structures
// (`PipelineConfig`, `BoardReport`, `Report`), with `ParallelPipeline` on top
// for batches. The engine stages live in `core_modules`; each is a pure
// function over bounding boxes and can be used on its own.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use error::{BoardError, PipelineError};
pub use parallel_pipeline::{ImageOutcome, ParallelPipeline};
pub use pipeline::{BoardPipeline, BoardReport, PipelineConfig, Report};
