//! # Asset Task Module
//!
//! Worker per un singolo file: legge i byte, esegue la pipeline, carica il
//! risultato tramite il `BlobUploader`.
//!
//! Gli errori per asset diventano `AssetFailure` (stadio + diagnostica) e non
//! interrompono mai il batch.

use crate::error::{AssetFailure, Stage};
use crate::file_manager::FileManager;
use crate::media::MediaInfo;
use crate::pipeline::MediaPipeline;
use crate::uploader::{object_key, BlobUploader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Which pipeline entry point the batch uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Normalize,
    Trim,
}

/// Uploaded result of one asset
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub url: String,
    pub object_key: String,
    pub output_size: u64,
    pub was_transformed: bool,
    pub info: MediaInfo,
}

/// Outcome of one asset, success or structured failure
#[derive(Debug, Clone)]
pub struct AssetReport {
    pub path: PathBuf,
    pub original_size: u64,
    pub result: Result<StoredAsset, AssetFailure>,
}

impl AssetReport {
    pub fn is_fatal(&self) -> bool {
        matches!(self.result, Err(ref failure) if failure.stage == Stage::Environment)
    }
}

/// Processes single files against a shared pipeline
#[derive(Clone)]
pub struct AssetTask {
    pipeline: Arc<MediaPipeline>,
    uploader: Arc<dyn BlobUploader>,
    mode: RunMode,
}

impl AssetTask {
    pub fn new(pipeline: Arc<MediaPipeline>, uploader: Arc<dyn BlobUploader>, mode: RunMode) -> Self {
        Self {
            pipeline,
            uploader,
            mode,
        }
    }

    /// Process and upload `path`; never fails, failures are in the report
    pub async fn run(&self, path: &Path) -> AssetReport {
        let bytes = match FileManager::read_upload(path).await {
            Ok(bytes) => bytes,
            Err(e) => return self.failed(path, 0, AssetFailure::from(&e)),
        };
        let original_size = bytes.len() as u64;
        let filename = FileManager::upload_name(path);

        let processed = match self.mode {
            RunMode::Normalize => self.pipeline.process(&filename, bytes).await,
            RunMode::Trim => self.pipeline.trim(&filename, bytes).await,
        };
        let asset = match processed {
            Ok(asset) => asset,
            Err(e) => return self.failed(path, original_size, AssetFailure::from(&e)),
        };

        let outcome = asset.outcome;
        let key = object_key(&filename, &outcome.output_bytes, &outcome.output_extension);
        let url = match self.uploader.upload(&outcome.output_bytes, &key).await {
            Ok(url) => url,
            Err(e) => {
                let failure = AssetFailure {
                    stage: Stage::Io,
                    message: format!("upload failed: {:#}", e),
                };
                return self.failed(path, original_size, failure);
            }
        };
        debug!("{} -> {}", path.display(), url);

        AssetReport {
            path: path.to_path_buf(),
            original_size,
            result: Ok(StoredAsset {
                url,
                object_key: key,
                output_size: outcome.output_bytes.len() as u64,
                was_transformed: outcome.was_transformed,
                info: asset.info,
            }),
        }
    }

    fn failed(&self, path: &Path, original_size: u64, failure: AssetFailure) -> AssetReport {
        error!("Failed to process {} [{}]: {}", path.display(), failure.stage, failure.message);
        AssetReport {
            path: path.to_path_buf(),
            original_size,
            result: Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::uploader::LocalDirUploader;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
            .encode(img.as_raw(), width, height, image::ColorType::Rgb8)
            .unwrap();
        out
    }

    fn task(out: &Path) -> AssetTask {
        AssetTask::new(
            Arc::new(MediaPipeline::new(Config::default())),
            Arc::new(LocalDirUploader::new(out)),
            RunMode::Normalize,
        )
    }

    #[tokio::test]
    async fn test_image_is_uploaded_as_jpeg() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let path = input.path().join("portrait.png");
        std::fs::write(&path, jpeg(80, 100)).unwrap();

        let report = task(output.path()).run(&path).await;
        let stored = report.result.unwrap();
        assert!(stored.was_transformed);
        assert!(stored.object_key.starts_with("portrait-"));
        assert!(stored.object_key.ends_with(".jpg"));
        assert_eq!(stored.info.matched_format.as_deref(), Some("4:5"));
        assert!(output.path().join(&stored.object_key).exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_read_failure() {
        let output = TempDir::new().unwrap();
        let report = task(output.path()).run(Path::new("/definitely/not/here.jpg")).await;
        assert!(!report.is_fatal());
        let failure = report.result.unwrap_err();
        assert_eq!(failure.stage, Stage::Read);
    }

    #[tokio::test]
    async fn test_corrupt_image_reports_image_stage() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let path = input.path().join("broken.jpg");
        let mut bytes = jpeg(64, 64);
        bytes.truncate(300);
        std::fs::write(&path, bytes).unwrap();

        let report = task(output.path()).run(&path).await;
        assert_eq!(report.result.unwrap_err().stage, Stage::Image);
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }
}
