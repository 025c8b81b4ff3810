// THEORY:
// The `pipeline` module is the top-level API for the board reconstruction
// engine. It wires the image helpers, line extraction, the two engine paths
// and the renderer into one call per image, and it is the only place that
// decides what gets reported and what gets written to disk.
//
// Key architectural principles:
// 1.  **Two Independent Paths**: The vertical path (extract, split, de-nest,
//     merge, fill gaps) and the horizontal path (extract, group rows) share
//     nothing but the normalized image they start from.
// 2.  **Empty Is Not an Error**: An image without boards yields empty results
//     and an `EmptyResult` diagnostic. Only I/O can fail a `process_file` call.
// 3.  **Injected Seams**: The pixel backend and the diagnostics sink are
//     trait objects handed in at construction time, so tests can observe every
//     decision without a log subscriber.

use crate::core_modules::backend::{ImageBackend, ImageprocBackend, MorphOp};
use crate::core_modules::bounding_box::{BoundingBox, TaggedBox};
use crate::core_modules::box_extractor::{ExtractorConfig, box_extractor};
use crate::core_modules::diagnostics::{BoardAxis, DiagnosticEvent, DiagnosticsSink, TracingSink};
use crate::core_modules::fragment_merger::{MergerConfig, merge_fragments};
use crate::core_modules::gap_filler::{GapEstimate, fill_gaps};
use crate::core_modules::line_extraction::{LineExtractionConfig, LineMasks, line_masks};
use crate::core_modules::nested_remover::{NestedConfig, remove_nested};
use crate::core_modules::region_splitter::{SplitterConfig, split_oversized};
use crate::core_modules::render;
use crate::core_modules::row_grouper::{Row, RowGrouperConfig, group_rows_with_mean};
use crate::core_modules::statistics::RunStatistics;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::PipelineError;
use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span};

/// Configuration for the `BoardPipeline`, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lines: LineExtractionConfig,
    /// Extraction on the vertical mask, after fragment connection.
    pub vertical_extractor: ExtractorConfig,
    /// Extraction on the horizontal mask.
    pub horizontal_extractor: ExtractorConfig,
    pub splitter: SplitterConfig,
    pub nested: NestedConfig,
    pub merger: MergerConfig,
    pub rows: RowGrouperConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lines: LineExtractionConfig::default(),
            vertical_extractor: ExtractorConfig {
                area_ratio: 0.1,
                min_contour_area: 100.0,
            },
            horizontal_extractor: ExtractorConfig::default(),
            splitter: SplitterConfig::default(),
            nested: NestedConfig::default(),
            merger: MergerConfig::default(),
            rows: RowGrouperConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(source: &str, origin: &str) -> Result<Self, PipelineError> {
        toml::from_str(source).map_err(|e| PipelineError::Config {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, PipelineError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source, &path.display().to_string())
    }
}

/// Result of the vertical path for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerticalBoards {
    /// Observed and virtual boards, ordered right to left.
    pub boards: Vec<TaggedBox>,
    /// Statistics of the extracted boxes, `None` when nothing was extracted.
    pub statistics: Option<RunStatistics>,
    pub gaps: Vec<GapEstimate>,
}

impl VerticalBoards {
    pub fn virtual_count(&self) -> usize {
        self.boards.iter().filter(|b| b.is_virtual()).count()
    }
}

/// Result of the horizontal path for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorizontalBoards {
    /// Retained rows, ordered bottom to top.
    pub rows: Vec<Row>,
    /// Statistics of the extracted boxes. `mean_row_count` is taken over every
    /// clustered row, before sparse rows were dropped.
    pub statistics: Option<RunStatistics>,
}

/// The counts handed back for each processed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardCounts {
    pub rows: usize,
    pub vertical_boards: usize,
    pub virtual_boards: usize,
}

/// The primary output of the pipeline for a single image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    NoBoardsDetected,
    BoardsDetected(BoardCounts),
}

/// Everything the pipeline produced for one image.
#[derive(Debug, Clone)]
pub struct BoardReport {
    pub name: String,
    pub normalized: GrayImage,
    pub masks: LineMasks,
    pub horizontal: HorizontalBoards,
    pub vertical: VerticalBoards,
    pub horizontal_view: RgbImage,
    pub vertical_view: RgbImage,
    pub combined_view: RgbImage,
}

impl BoardReport {
    pub fn summary(&self) -> Report {
        if self.horizontal.rows.is_empty() && self.vertical.boards.is_empty() {
            return Report::NoBoardsDetected;
        }
        Report::BoardsDetected(BoardCounts {
            rows: self.horizontal.rows.len(),
            vertical_boards: self.vertical.boards.len(),
            virtual_boards: self.vertical.virtual_count(),
        })
    }
}

/// The main, top-level struct for the board reconstruction engine.
#[derive(Clone)]
pub struct BoardPipeline {
    backend: Arc<dyn ImageBackend>,
    sink: Arc<dyn DiagnosticsSink>,
    config: PipelineConfig,
}

impl BoardPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            backend: Arc::new(ImageprocBackend),
            sink: Arc::new(TracingSink),
            config,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the vertical path on a cleaned vertical line mask.
    pub fn reconstruct_vertical_boards(&self, mask: &GrayImage) -> (RgbImage, VerticalBoards) {
        let config = &self.config;
        let axis = BoardAxis::Vertical;

        // --- 1. Connect fragments and extract ---
        let connected = self.backend.morphology(mask, config.lines.fragment_kernel, MorphOp::Open);
        let contours = self.backend.find_contours(&connected);
        let extracted = box_extractor::extract_boxes(
            self.backend.as_ref(),
            &contours,
            mask.width(),
            mask.height(),
            &config.vertical_extractor,
        );

        let statistics = match RunStatistics::from_boxes(&extracted) {
            Ok(statistics) => statistics,
            Err(reason) => {
                self.sink.record(DiagnosticEvent::EmptyResult { axis, reason });
                self.sink.record(DiagnosticEvent::Total { axis, count: 0, virtual_count: 0 });
                return (render::to_rgb(mask), VerticalBoards::default());
            }
        };

        // --- 2. Clean up the box set ---
        let split = split_oversized(&extracted, statistics.mean_area, &config.splitter);
        let distinct = remove_nested(&split, config.nested.overlap_threshold);
        let merged = merge_fragments(&distinct, statistics.mean_height, &config.merger);

        let cleaned = match RunStatistics::from_boxes(&merged) {
            Ok(cleaned) => cleaned,
            Err(reason) => {
                self.sink.record(DiagnosticEvent::EmptyResult { axis, reason });
                self.sink.record(DiagnosticEvent::Total { axis, count: 0, virtual_count: 0 });
                let boards = VerticalBoards {
                    statistics: Some(statistics),
                    ..VerticalBoards::default()
                };
                return (render::to_rgb(mask), boards);
            }
        };
        self.sink.record(DiagnosticEvent::BoxesCleaned {
            boxes: merged.clone(),
            statistics: cleaned,
        });

        // --- 3. Estimate hidden boards ---
        let fill = fill_gaps(&merged, cleaned.mean_width);
        for gap in &fill.gaps {
            self.sink.record(DiagnosticEvent::Gap(*gap));
        }
        let virtual_count = fill.virtual_count();
        self.sink.record(DiagnosticEvent::Total {
            axis,
            count: fill.boxes.len(),
            virtual_count,
        });

        let view = render::render_vertical(mask, &fill.boxes);
        let boards = VerticalBoards {
            boards: fill.boxes,
            statistics: Some(statistics),
            gaps: fill.gaps,
        };
        (view, boards)
    }

    /// Runs the horizontal path on a cleaned horizontal line mask.
    pub fn reconstruct_horizontal_boards(&self, mask: &GrayImage) -> (RgbImage, HorizontalBoards) {
        let axis = BoardAxis::Horizontal;
        let contours = self.backend.find_contours(mask);
        let boxes: Vec<BoundingBox> = box_extractor::extract_boxes(
            self.backend.as_ref(),
            &contours,
            mask.width(),
            mask.height(),
            &self.config.horizontal_extractor,
        );

        let statistics = match RunStatistics::from_boxes(&boxes) {
            Ok(statistics) => statistics,
            Err(reason) => {
                self.sink.record(DiagnosticEvent::EmptyResult { axis, reason });
                self.sink.record(DiagnosticEvent::Total { axis, count: 0, virtual_count: 0 });
                return (render::to_rgb(mask), HorizontalBoards::default());
            }
        };

        let (rows, mean_count) = group_rows_with_mean(&boxes, &self.config.rows);
        let statistics = match mean_count {
            Some(count) => statistics.with_row_count(count),
            None => statistics,
        };
        debug!(?statistics, "horizontal statistics");
        for (index, row) in rows.iter().enumerate() {
            self.sink.record(DiagnosticEvent::RowAccepted {
                index,
                anchor: row.anchor(),
                members: row.len(),
            });
        }
        self.sink.record(DiagnosticEvent::Total {
            axis,
            count: rows.len(),
            virtual_count: 0,
        });

        let view = render::render_rows(mask, &rows);
        let boards = HorizontalBoards {
            rows,
            statistics: Some(statistics),
        };
        (view, boards)
    }

    /// Runs both paths on a decoded image.
    pub fn analyze(&self, name: &str, image: &DynamicImage) -> BoardReport {
        let span = info_span!("image", name);
        let _enter = span.enter();

        let normalized = image_helper::normalize(image);
        let masks = line_masks(self.backend.as_ref(), &normalized, &self.config.lines);

        let (horizontal_view, horizontal) = self.reconstruct_horizontal_boards(&masks.horizontal);
        let (vertical_view, vertical) = self.reconstruct_vertical_boards(&masks.vertical);
        let combined_view = render::render_combined(&normalized, &horizontal.rows, &vertical.boards);

        info!(
            rows = horizontal.rows.len(),
            vertical_boards = vertical.boards.len(),
            virtual_boards = vertical.virtual_count(),
            "image analyzed"
        );

        BoardReport {
            name: name.to_string(),
            normalized,
            masks,
            horizontal,
            vertical,
            horizontal_view,
            vertical_view,
            combined_view,
        }
    }

    /// Loads, analyzes and writes the artifacts of one image file.
    pub fn process_file(&self, path: &Path, output_root: &Path) -> Result<Report, PipelineError> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let image = image_helper::load(path)?;
        let report = self.analyze(&name, &image);
        write_artifacts(&report, output_root)?;
        Ok(report.summary())
    }
}

/// Writes the four PNG views of `report` into `<output_root>/<name>/`.
pub fn write_artifacts(report: &BoardReport, output_root: &Path) -> Result<PathBuf, PipelineError> {
    let dir = output_root.join(&report.name);
    std::fs::create_dir_all(&dir)?;

    let name = &report.name;
    image_helper::save_gray(&dir.join(format!("{name}_normalized.png")), &report.normalized)?;
    image_helper::save_rgb(&dir.join(format!("{name}_horizontal.png")), &report.horizontal_view)?;
    image_helper::save_rgb(&dir.join(format!("{name}_vertical.png")), &report.vertical_view)?;
    image_helper::save_rgb(&dir.join(format!("{name}_combined_boards.png")), &report.combined_view)?;

    debug!(dir = %dir.display(), "artifacts written");
    Ok(dir)
}
