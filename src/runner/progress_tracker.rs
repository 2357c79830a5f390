//! # Progress Tracking Module
//!
//! Unifica progress bar, eventi JSON e statistiche in un singolo tracker
//! condivisibile tra i task.

use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use crate::progress::{NormalizeStats, ProgressManager};
use crate::runner::asset_task::AssetReport;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe tracker shared by the per-asset tasks
#[derive(Clone)]
pub struct ProgressTracker {
    pub total_files: usize,
    json_output: bool,
    stats: Arc<Mutex<NormalizeStats>>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    pub fn new(total_files: usize, json_output: bool) -> Self {
        let progress_manager = if json_output {
            ProgressManager::hidden()
        } else {
            ProgressManager::new(total_files as u64)
        };
        Self {
            total_files,
            json_output,
            stats: Arc::new(Mutex::new(NormalizeStats::new())),
            progress_manager,
        }
    }

    /// Announce that the `index`-th file is starting
    pub fn file_started(&self, path: &Path, size: u64, index: usize) {
        if self.json_output {
            JsonMessage::file_start(path.to_path_buf(), size, index, self.total_files).emit();
        }
    }

    /// Record a finished asset, emit its JSON event and advance the bar
    pub async fn handle_file_completion(&self, report: &AssetReport) {
        let name = FileManager::upload_name(&report.path);
        let message = {
            let mut stats = self.stats.lock().await;
            match report.result {
                Ok(ref stored) if stored.was_transformed => {
                    stats.add_transformed(report.original_size, stored.output_size);
                    match stored.info.matched_format {
                        Some(ref label) => format!("[OK] {}: {}", name, label),
                        None => format!("[OK] {}", name),
                    }
                }
                Ok(_) => {
                    stats.add_passed_through(report.original_size);
                    format!("[SKIP] {}: stored unchanged", name)
                }
                Err(ref failure) => {
                    stats.add_error();
                    format!("[ERROR] {}: {} failed", name, failure.stage)
                }
            }
        };

        if self.json_output {
            let (output_size, url, info, failure) = match report.result {
                Ok(ref stored) => (
                    Some(stored.output_size),
                    Some(stored.url.clone()),
                    Some(stored.info.clone()),
                    None,
                ),
                Err(ref failure) => (None, None, None, Some(failure.clone())),
            };
            JsonMessage::FileComplete {
                path: report.path.clone(),
                original_size: report.original_size,
                output_size,
                url,
                info,
                failure,
            }
            .emit();
        }

        self.progress_manager.update(&message);
    }

    /// Count a task that never produced a report (panicked or cancelled)
    pub async fn handle_lost_task(&self) {
        self.stats.lock().await.add_error();
        self.progress_manager.update("[ERROR] task aborted");
    }

    pub async fn stats(&self) -> NormalizeStats {
        self.stats.lock().await.clone()
    }

    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssetFailure, Stage};
    use crate::media::MediaInfo;
    use crate::runner::asset_task::StoredAsset;
    use std::path::PathBuf;

    fn stored(was_transformed: bool) -> StoredAsset {
        StoredAsset {
            url: "file:///tmp/x".to_string(),
            object_key: "x".to_string(),
            output_size: 10,
            was_transformed,
            info: MediaInfo::default(),
        }
    }

    #[test]
    fn test_completion_updates_stats() {
        tokio_test::block_on(async {
            let tracker = ProgressTracker::new(3, true);
            for result in [
                Ok(stored(true)),
                Ok(stored(false)),
                Err(AssetFailure {
                    stage: Stage::Probe,
                    message: "no video stream".to_string(),
                }),
            ] {
                let report = AssetReport {
                    path: PathBuf::from("a.mov"),
                    original_size: 100,
                    result,
                };
                tracker.handle_file_completion(&report).await;
            }

            let stats = tracker.stats().await;
            assert_eq!(stats.files_processed, 3);
            assert_eq!(stats.files_transformed, 1);
            assert_eq!(stats.files_passed_through, 1);
            assert_eq!(stats.errors, 1);
            assert_eq!(stats.total_output_size, 110);
        });
    }
}
