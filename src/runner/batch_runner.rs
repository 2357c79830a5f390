//! # Batch Runner
//!
//! Orchestratore principale della CLI: raccoglie gli input, esegue ogni asset su
//! un task tokio indipendente e produce il riepilogo finale.
//!
//! ## Concorrenza:
//! - Un `Semaphore` con `workers` permessi limita gli asset in volo
//! - Il permesso viene acquisito prima dello spawn, così la coda non cresce oltre
//!   il numero di worker
//! - Nessuno stato mutabile condiviso tra asset a parte le statistiche del tracker;
//!   il catalogo formati è in sola lettura dentro la `Config`

use crate::config::Config;
use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use crate::pipeline::MediaPipeline;
use crate::progress::NormalizeStats;
use crate::runner::asset_task::{AssetReport, AssetTask, RunMode};
use crate::runner::progress_tracker::ProgressTracker;
use crate::uploader::BlobUploader;
use anyhow::Result;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Final result of a batch
#[derive(Debug)]
pub struct BatchSummary {
    pub stats: NormalizeStats,
    pub reports: Vec<AssetReport>,
    pub duration_seconds: f64,
}

impl BatchSummary {
    /// True when some asset hit an environment-level error
    pub fn has_fatal_error(&self) -> bool {
        self.reports.iter().any(AssetReport::is_fatal)
    }
}

/// Runs the pipeline over many files concurrently
pub struct BatchRunner {
    config: Arc<Config>,
    task: AssetTask,
}

impl BatchRunner {
    pub fn new(
        config: Arc<Config>,
        pipeline: Arc<MediaPipeline>,
        uploader: Arc<dyn BlobUploader>,
        mode: RunMode,
    ) -> Self {
        Self {
            config,
            task: AssetTask::new(pipeline, uploader, mode),
        }
    }

    pub async fn run(&self, inputs: &[PathBuf]) -> Result<BatchSummary> {
        let start_time = Instant::now();
        let files = FileManager::collect_inputs(inputs)?;

        if self.config.json_output {
            JsonMessage::start(
                inputs.to_vec(),
                self.config.output_path.clone(),
                files.len(),
                &self.config,
            )
            .emit();
        } else {
            info!("Found {} files, {} workers", files.len(), self.config.workers);
        }

        let tracker = ProgressTracker::new(files.len(), self.config.json_output);
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut handles = Vec::with_capacity(files.len());

        for (index, path) in files.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let task = self.task.clone();
            let tracker = tracker.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                tracker.file_started(&path, size, index);

                let report = task.run(&path).await;
                tracker.handle_file_completion(&report).await;
                report
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for joined in join_all(handles).await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Asset task aborted: {}", e);
                    tracker.handle_lost_task().await;
                }
            }
        }

        let stats = tracker.stats().await;
        let duration_seconds = start_time.elapsed().as_secs_f64();
        tracker.finish(&stats.format_summary());

        if self.config.json_output {
            JsonMessage::complete(&stats, duration_seconds).emit();
        } else {
            info!("{} in {:.1}s", stats.format_summary(), duration_seconds);
        }

        Ok(BatchSummary {
            stats,
            reports,
            duration_seconds,
        })
    }
}
