// Batch runner for the `pallet_vision` library: analyzes every TIFF scan in a
// folder and writes the rendered board views next to each other per image.

use anyhow::{Context, Result};
use clap::Parser;
use pallet_vision::parallel_pipeline::{ImageOutcome, ParallelPipeline, collect_images, process_sequential};
use pallet_vision::pipeline::{BoardPipeline, PipelineConfig, Report};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pallet_vision", version, about = "Count pallet boards in warehouse scans")]
struct Cli {
    /// Folder containing `*.tif` / `*.tiff` scans.
    #[arg(long, default_value = "input")]
    input: PathBuf,

    /// Folder receiving one sub-folder of PNG views per scan.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Optional TOML file overriding pipeline parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Process images on a worker pool instead of one after another.
    #[arg(long)]
    parallel: bool,

    /// Worker count for `--parallel` (default: number of CPUs).
    #[arg(long)]
    workers: Option<usize>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let images = collect_images(&cli.input)
        .with_context(|| format!("failed to list input folder {}", cli.input.display()))?;
    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create output folder {}", cli.output.display()))?;

    info!(input = %cli.input.display(), images = images.len(), parallel = cli.parallel, "starting batch");

    let pipeline = BoardPipeline::new(config);
    let outcomes = if cli.parallel {
        let parallel = ParallelPipeline::new(pipeline, cli.output.clone(), cli.workers);
        info!(workers = parallel.workers(), "worker pool ready");
        let outcomes = parallel.process_batch(&images).await;
        parallel.shutdown().await;
        outcomes
    } else {
        process_sequential(&pipeline, &images, &cli.output)
    };

    let failures = summarize(&outcomes);
    info!(processed = outcomes.len(), failures, "batch finished");
    Ok(())
}

fn summarize(outcomes: &[ImageOutcome]) -> usize {
    let mut failures = 0;
    for outcome in outcomes {
        let path = outcome.path.display();
        match &outcome.result {
            Ok(Report::BoardsDetected(counts)) => info!(
                %path,
                rows = counts.rows,
                vertical_boards = counts.vertical_boards,
                virtual_boards = counts.virtual_boards,
                "boards detected"
            ),
            Ok(Report::NoBoardsDetected) => info!(%path, "no boards detected"),
            Err(e) => {
                failures += 1;
                warn!(%path, error = %e, "image failed");
            }
        }
    }
    failures
}
