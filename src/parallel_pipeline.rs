// THEORY:
// Images in a batch are independent: nothing learned from one scan is carried
// to the next. The parallel pipeline exploits that with a fixed pool of tokio
// workers fed by a single dispatcher.
//
// - The dispatcher hands tasks to workers round-robin over per-worker channels.
// - Each worker moves the CPU-bound analysis onto `spawn_blocking`, so the
//   async runtime threads stay free for dispatching and I/O.
// - Every task carries a `oneshot` sender; the caller awaits its own result,
//   and `process_batch` gathers them with `join_all` in input order.
// - A failed image produces an `Err` outcome and never stops the batch.

use crate::error::PipelineError;
use crate::pipeline::{BoardPipeline, Report};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// The result of one image of a batch.
#[derive(Debug)]
pub struct ImageOutcome {
    pub id: u64,
    pub path: PathBuf,
    pub result: Result<Report, PipelineError>,
}

pub struct ImageTask {
    pub id: u64,
    pub path: PathBuf,
    pub result_sender: oneshot::Sender<ImageOutcome>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<ImageTask>,
    dispatcher: tokio::task::JoinHandle<()>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one). Must be called inside a tokio runtime.
    pub fn new(pipeline: BoardPipeline, output_root: PathBuf, size: usize) -> Self {
        let size = size.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ImageTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| mpsc::unbounded_channel::<ImageTask>()).unzip();

        // Spawn dispatcher
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if let Err(mpsc::error::SendError(task)) = worker_senders[worker_idx].send(task) {
                    let _ = task.result_sender.send(ImageOutcome {
                        id: task.id,
                        path: task.path,
                        result: Err(PipelineError::Worker(format!("worker {worker_idx} is gone"))),
                    });
                }
                worker_idx = (worker_idx + 1) % size;
            }
        });

        // Spawn workers
        let mut workers = Vec::with_capacity(size);
        for (worker_id, mut worker_receiver) in worker_receivers.into_iter().enumerate() {
            let worker_pipeline = pipeline.clone();
            let worker_root = output_root.clone();

            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    debug!(worker_id, id = task.id, path = %task.path.display(), "processing image");
                    let result = Self::process_image_worker(&worker_pipeline, &task.path, &worker_root).await;
                    let _ = task.result_sender.send(ImageOutcome {
                        id: task.id,
                        path: task.path,
                        result,
                    });
                }
            });

            workers.push(worker);
        }

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    async fn process_image_worker(
        pipeline: &BoardPipeline,
        path: &Path,
        output_root: &Path,
    ) -> Result<Report, PipelineError> {
        let pipeline = pipeline.clone();
        let path = path.to_path_buf();
        let output_root = output_root.to_path_buf();

        tokio::task::spawn_blocking(move || pipeline.process_file(&path, &output_root))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }

    pub async fn process_image(&self, id: u64, path: PathBuf) -> Result<ImageOutcome, PipelineError> {
        let (result_sender, result_receiver) = oneshot::channel();

        let task = ImageTask {
            id,
            path,
            result_sender,
        };

        self.task_sender
            .send(task)
            .map_err(|_| PipelineError::Worker("failed to send task to worker pool".to_string()))?;

        result_receiver
            .await
            .map_err(|_| PipelineError::Worker("failed to receive result from worker".to_string()))
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Closes the task queue and waits for every worker to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "dispatcher ended abnormally");
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "worker ended abnormally");
            }
        }
    }
}

pub struct ParallelPipeline {
    worker_pool: WorkerPool,
    next_id: AtomicU64,
}

impl ParallelPipeline {
    /// `workers` defaults to the number of logical CPUs.
    pub fn new(pipeline: BoardPipeline, output_root: PathBuf, workers: Option<usize>) -> Self {
        let size = workers.unwrap_or_else(num_cpus::get);
        Self {
            worker_pool: WorkerPool::new(pipeline, output_root, size),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn workers(&self) -> usize {
        self.worker_pool.size()
    }

    pub async fn process_image(&self, path: PathBuf) -> ImageOutcome {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.worker_pool.process_image(id, path.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => ImageOutcome {
                id,
                path,
                result: Err(e),
            },
        }
    }

    /// Processes every path concurrently; outcomes come back in input order.
    pub async fn process_batch(&self, paths: &[PathBuf]) -> Vec<ImageOutcome> {
        join_all(paths.iter().cloned().map(|path| self.process_image(path))).await
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
    }
}

/// Processes `paths` one after another on the current thread.
pub fn process_sequential(pipeline: &BoardPipeline, paths: &[PathBuf], output_root: &Path) -> Vec<ImageOutcome> {
    paths
        .iter()
        .enumerate()
        .map(|(id, path)| ImageOutcome {
            id: id as u64,
            path: path.clone(),
            result: pipeline.process_file(path, output_root),
        })
        .collect()
}

/// Every `*.tif` / `*.tiff` file directly inside `dir`, sorted by path.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_tiff = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"));
        if path.is_file() && is_tiff {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
