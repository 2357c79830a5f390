//! # Media Pipeline
//!
//! Punto di ingresso della normalizzazione: byte grezzi in ingresso, byte
//! normalizzati + record di metadata in uscita.
//!
//! ## Flusso:
//! ```text
//! bytes ─► sniff ─┬─ image ─► ImageTransform (spawn_blocking) ─┐
//!                 ├─ video ─► probe ─► VideoTransform ──────────┼─► ProcessedAsset
//!                 └─ other ─► pass-through (byte originali) ────┘
//! ```
//!
//! ## Operazioni:
//! - `process()`: normalizzazione completa
//! - `describe()`: solo metadata (classificazione, dimensioni, rapporto, formato
//!   più vicino, durata, qualità); non ridimensiona nulla
//! - `trim()`: taglio rapido in stream copy, solo video
//! - `health_check()`: verifica ffmpeg/ffprobe all'avvio invece che per richiesta
//!
//! I file temporanei (input scritto su disco per ffmpeg, output transcodificato)
//! vivono solo per la durata della singola chiamata.

use crate::catalog::FormatCatalog;
use crate::config::Config;
use crate::encoder::{FfmpegEncoder, VideoEncoder};
use crate::error::NormalizeError;
use crate::image_processor::ImageTransform;
use crate::media::{video_quality_tier, MediaInfo, ProcessingOutcome, SourceDimensions};
use crate::prober::{FfprobeProber, MetadataProber};
use crate::sniffer::{classify, extension_for_mime, Classification, MediaKind};
use crate::tool_resolver::ToolResolver;
use crate::video_processor::VideoTransform;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Normalized asset ready for upload
#[derive(Debug, Clone)]
pub struct ProcessedAsset {
    pub outcome: ProcessingOutcome,
    pub info: MediaInfo,
}

/// Sniff, match and transform uploads
pub struct MediaPipeline {
    config: Arc<Config>,
    images: Arc<ImageTransform>,
    videos: VideoTransform,
    prober: Arc<dyn MetadataProber>,
}

impl MediaPipeline {
    /// Pipeline backed by the real ffmpeg/ffprobe binaries
    pub fn new(config: Config) -> Self {
        let resolver = ToolResolver::new();
        let encoder = Arc::new(FfmpegEncoder::new(&config, resolver.clone()));
        let prober = Arc::new(FfprobeProber::new(&config, resolver));
        Self::with_collaborators(Arc::new(config), encoder, prober)
    }

    pub fn with_collaborators(
        config: Arc<Config>,
        encoder: Arc<dyn VideoEncoder>,
        prober: Arc<dyn MetadataProber>,
    ) -> Self {
        Self {
            images: Arc::new(ImageTransform::new(&config)),
            videos: VideoTransform::new(encoder, config.clone()),
            prober,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.config.catalog
    }

    /// Fails with `EncoderUnavailable` when ffmpeg or ffprobe cannot be resolved
    pub fn health_check(&self) -> Result<(), NormalizeError> {
        if !self.videos.encoder_available() {
            return Err(NormalizeError::EncoderUnavailable("ffmpeg not found".to_string()));
        }
        if !self.prober.is_available() {
            return Err(NormalizeError::EncoderUnavailable("ffprobe not found".to_string()));
        }
        Ok(())
    }

    /// Normalize one upload
    pub async fn process(&self, filename: &str, bytes: Vec<u8>) -> Result<ProcessedAsset, NormalizeError> {
        let class = classify(filename, &bytes);
        debug!("{} classified as {} ({:?})", filename, class.mime, class.kind);

        match class.kind {
            MediaKind::Image => self.process_image(class, bytes).await,
            MediaKind::Video => self.process_video(filename, class, bytes).await,
            MediaKind::Other => Ok(passthrough(filename, class, bytes)),
        }
    }

    async fn process_image(&self, class: Classification, bytes: Vec<u8>) -> Result<ProcessedAsset, NormalizeError> {
        let images = self.images.clone();
        let outcome = tokio::task::spawn_blocking(move || images.normalize(&bytes))
            .await
            .map_err(|e| NormalizeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        let final_dims = outcome.final_dimensions;
        let summary = format!("resized to {}x{}, re-encoded as JPEG", final_dims.width, final_dims.height);
        let info = MediaInfo {
            file_type: class.mime,
            matched_format: outcome.matched_format.clone(),
            summary,
            ..Default::default()
        }
        .with_dimensions(&final_dims, self.config.max_ratio_denominator);

        Ok(ProcessedAsset { outcome, info })
    }

    async fn process_video(
        &self,
        filename: &str,
        class: Classification,
        bytes: Vec<u8>,
    ) -> Result<ProcessedAsset, NormalizeError> {
        let container = container_of(filename, &class);
        let input = spool(&bytes, &container).await?;
        drop(bytes);

        let source = match self.prober.probe(input.path()).await {
            Ok(dims) => dims,
            Err(e) => {
                warn!("Probe failed for {}, scaling assumes 16:9: {}", filename, e);
                SourceDimensions::default()
            }
        };

        let video = self.videos.run(input.path(), &source, Some(container.as_str())).await?;
        let output_bytes = video.output.read().await?;

        let final_duration = source.duration_secs.min(video.params.duration_cap_secs);
        let final_dims = match video.params.scale {
            Some(scale) => SourceDimensions::new(scale.width, scale.height, final_duration),
            None => SourceDimensions::new(source.width, source.height, final_duration),
        };
        let matched_format = self
            .catalog()
            .match_format(final_dims.width, final_dims.height)
            .ok()
            .map(|f| f.formatted_ratio.clone());

        let summary = video.params.summary(&source, Some(container.as_str())).join(", ");
        info!("{}: {}", filename, summary);

        let info = MediaInfo {
            file_type: class.mime,
            matched_format: matched_format.clone(),
            summary,
            ..Default::default()
        }
        .with_dimensions(&final_dims, self.config.max_ratio_denominator);

        let outcome = ProcessingOutcome {
            output_bytes,
            was_transformed: true,
            final_dimensions: final_dims,
            final_duration_secs: final_duration,
            matched_format,
            output_extension: "mp4".to_string(),
        };
        Ok(ProcessedAsset { outcome, info })
    }

    /// Metadata-only mode: classify and measure without transforming
    pub async fn describe(&self, filename: &str, bytes: &[u8]) -> Result<MediaInfo, NormalizeError> {
        let class = classify(filename, bytes);
        let max_den = self.config.max_ratio_denominator;

        let info = match class.kind {
            MediaKind::Image => {
                let dims = ImageTransform::dimensions(bytes)?;
                let format = self.catalog().match_format(dims.width, dims.height)?;
                MediaInfo {
                    file_type: class.mime,
                    matched_format: Some(format.formatted_ratio.clone()),
                    summary: format!("closest standard format: {}", format.name),
                    ..Default::default()
                }
                .with_dimensions(&dims, max_den)
            }
            MediaKind::Video => {
                let container = container_of(filename, &class);
                let input = spool(bytes, &container).await?;
                let dims = self.prober.probe(input.path()).await?;

                let mut info = MediaInfo {
                    file_type: class.mime,
                    ..Default::default()
                }
                .with_dimensions(&dims, max_den);
                if dims.has_size() {
                    let format = self.catalog().match_format(dims.width, dims.height)?;
                    info.matched_format = Some(format.formatted_ratio.clone());
                    info.quality = Some(video_quality_tier(dims.width, dims.height).to_string());
                    info.summary = format!("closest standard format: {}", format.name);
                }
                info
            }
            MediaKind::Other => MediaInfo {
                file_type: class.mime,
                ..Default::default()
            },
        };
        Ok(info)
    }

    /// Fast stream-copy trim; non-video assets pass through unchanged
    pub async fn trim(&self, filename: &str, bytes: Vec<u8>) -> Result<ProcessedAsset, NormalizeError> {
        let class = classify(filename, &bytes);
        if class.kind != MediaKind::Video {
            return Ok(passthrough(filename, class, bytes));
        }

        let container = container_of(filename, &class);
        let input = spool(&bytes, &container).await?;
        drop(bytes);

        let source = self.prober.probe(input.path()).await.unwrap_or_else(|e| {
            warn!("Probe failed for {}: {}", filename, e);
            SourceDimensions::default()
        });

        let output = self.videos.trim(input.path(), &container).await?;
        let output_bytes = output.read().await?;

        let cap = self.config.trim_cap_secs;
        let final_dims = SourceDimensions::new(source.width, source.height, source.duration_secs.min(cap));
        let info = MediaInfo {
            file_type: class.mime,
            summary: format!("trimmed to {}s (stream copy)", crate::utils::seconds_arg(cap)),
            ..Default::default()
        }
        .with_dimensions(&final_dims, self.config.max_ratio_denominator);

        let outcome = ProcessingOutcome {
            output_bytes,
            was_transformed: true,
            final_dimensions: final_dims,
            final_duration_secs: final_dims.duration_secs,
            matched_format: None,
            output_extension: container,
        };
        Ok(ProcessedAsset { outcome, info })
    }
}

/// Extension used for the spooled input and for trimmed output
fn container_of(filename: &str, class: &Classification) -> String {
    extension_for_mime(&class.mime)
        .map(str::to_string)
        .or_else(|| {
            Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
        })
        .unwrap_or_else(|| "bin".to_string())
}

fn passthrough(filename: &str, class: Classification, bytes: Vec<u8>) -> ProcessedAsset {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    debug!("{} passes through unprocessed", filename);

    ProcessedAsset {
        outcome: ProcessingOutcome::untouched(bytes, &extension),
        info: MediaInfo {
            file_type: class.mime,
            summary: "stored unchanged".to_string(),
            ..Default::default()
        },
    }
}

/// Write upload bytes to a scratch file the external tools can read
async fn spool(bytes: &[u8], extension: &str) -> Result<NamedTempFile, NormalizeError> {
    let file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!(".{}", extension))
        .tempfile()?;
    tokio::fs::write(file.path(), bytes).await?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeParams, EncoderFailure};
    use crate::error::Stage;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEncoder {
        transcodes: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl VideoEncoder for CountingEncoder {
        fn is_available(&self) -> bool {
            true
        }

        async fn validate(&self, input: &Path, _cap_secs: f64) -> Result<(), EncoderFailure> {
            assert!(input.exists());
            Ok(())
        }

        async fn transcode(&self, _input: &Path, output: &Path, _params: &EncodeParams) -> Result<(), EncoderFailure> {
            self.transcodes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EncoderFailure::Exited("Unknown encoder 'libx264'".to_string()));
            }
            std::fs::write(output, b"normalized-video").map_err(|e| EncoderFailure::Spawn(e.to_string()))
        }

        async fn trim(&self, _input: &Path, output: &Path, _cap_secs: f64) -> Result<(), EncoderFailure> {
            std::fs::write(output, b"trimmed-video").map_err(|e| EncoderFailure::Spawn(e.to_string()))
        }
    }

    struct FixedProber(Option<SourceDimensions>);

    #[async_trait]
    impl MetadataProber for FixedProber {
        fn is_available(&self) -> bool {
            self.0.is_some()
        }

        async fn probe(&self, _path: &Path) -> Result<SourceDimensions, NormalizeError> {
            self.0
                .ok_or_else(|| NormalizeError::ProbeFormat(String::new()))
        }
    }

    fn pipeline(encoder: Arc<CountingEncoder>, dims: Option<SourceDimensions>) -> MediaPipeline {
        MediaPipeline::with_collaborators(Arc::new(Config::default()), encoder, Arc::new(FixedProber(dims)))
    }

    fn mp4_bytes() -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftypisom");
        bytes.resize(1024, 0);
        bytes
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
            .encode(img.as_raw(), width, height, image::ColorType::Rgb8)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_text_passes_through_untouched() {
        let encoder = Arc::new(CountingEncoder::default());
        let pipeline = pipeline(encoder.clone(), Some(SourceDimensions::new(1, 1, 1.0)));
        let text = "hello world\n".repeat(40).into_bytes();

        let asset = pipeline.process("notes.txt", text.clone()).await.unwrap();
        assert!(!asset.outcome.was_transformed);
        assert_eq!(asset.outcome.output_bytes, text);
        assert_eq!(asset.outcome.output_extension, "txt");
        assert_eq!(asset.info.file_type, "application/octet-stream");
        assert_eq!(encoder.transcodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_image_is_resized_to_matched_format() {
        let pipeline = pipeline(Arc::new(CountingEncoder::default()), None);
        let asset = pipeline.process("photo.png", jpeg_bytes(300, 300)).await.unwrap();

        assert!(asset.outcome.was_transformed);
        assert_eq!(asset.outcome.output_extension, "jpg");
        assert_eq!(asset.info.file_type, "image/jpeg");
        assert_eq!(asset.info.matched_format.as_deref(), Some("1:1"));
        assert_eq!((asset.info.width, asset.info.height), (1080, 1080));
        assert_eq!(asset.info.aspect_ratio.as_deref(), Some("1:1"));
    }

    #[tokio::test]
    async fn test_video_is_transcoded_with_summary() {
        let encoder = Arc::new(CountingEncoder::default());
        let dims = SourceDimensions::new(1920, 1080, 95.0);
        let asset = pipeline(encoder.clone(), Some(dims))
            .process("clip.mp4", mp4_bytes())
            .await
            .unwrap();

        assert_eq!(asset.outcome.output_bytes, b"normalized-video");
        assert_eq!(asset.outcome.final_duration_secs, 59.0);
        assert_eq!(asset.info.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(asset.info.matched_format.as_deref(), Some("1.91:1"));
        assert_eq!(asset.info.summary, "bitrate reduced, duration capped at 59s");
        assert_eq!(encoder.transcodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_video_keeps_its_duration() {
        let dims = SourceDimensions::new(1080, 1920, 4.2);
        let asset = pipeline(Arc::new(CountingEncoder::default()), Some(dims))
            .process("story.mov", mp4_bytes())
            .await
            .unwrap();

        assert_eq!(asset.outcome.final_duration_secs, 4.2);
        assert_eq!(asset.info.duration, 4.2);
        assert_eq!(asset.info.matched_format.as_deref(), Some("9:16"));
        assert!(!asset.info.summary.contains("duration capped"));
    }

    #[tokio::test]
    async fn test_tiff_is_decoded_and_resized() {
        let img = RgbImage::from_pixel(64, 80, Rgb([120, 60, 30]));
        let mut tiff = std::io::Cursor::new(Vec::new());
        image::codecs::tiff::TiffEncoder::new(&mut tiff)
            .encode(img.as_raw(), 64, 80, image::ColorType::Rgb8)
            .unwrap();

        let pipeline = pipeline(Arc::new(CountingEncoder::default()), None);
        let asset = pipeline.process("scan.tiff", tiff.into_inner()).await.unwrap();
        assert!(asset.outcome.was_transformed);
        assert_eq!(asset.info.file_type, "image/tiff");
        assert_eq!(asset.info.matched_format.as_deref(), Some("4:5"));
        assert_eq!((asset.info.width, asset.info.height), (1080, 1350));
    }

    #[tokio::test]
    async fn test_heif_passes_through_unchanged() {
        let mut heic = vec![0x00, 0x00, 0x00, 0x18];
        heic.extend_from_slice(b"ftypheic");
        heic.resize(600, 7);

        let pipeline = pipeline(Arc::new(CountingEncoder::default()), None);
        let asset = pipeline.process("IMG_0001.HEIC", heic.clone()).await.unwrap();
        assert!(!asset.outcome.was_transformed);
        assert_eq!(asset.outcome.output_bytes, heic);
        assert_eq!(asset.info.file_type, "image/heif");
    }

    #[tokio::test]
    async fn test_video_failure_is_structured() {
        let encoder = Arc::new(CountingEncoder {
            fail: true,
            ..Default::default()
        });
        let err = pipeline(encoder.clone(), Some(SourceDimensions::new(640, 360, 3.0)))
            .process("clip.mp4", mp4_bytes())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Transcode);
        assert_eq!(encoder.transcodes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_describe_does_not_transform() {
        let encoder = Arc::new(CountingEncoder::default());
        let pipeline = pipeline(encoder.clone(), Some(SourceDimensions::new(1280, 720, 12.0)));

        let info = pipeline.describe("clip.mp4", &mp4_bytes()).await.unwrap();
        assert_eq!(info.file_type, "video/mp4");
        assert_eq!(info.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(info.matched_format.as_deref(), Some("1.91:1"));
        assert_eq!(info.quality.as_deref(), Some("medium"));
        assert_eq!(info.duration, 12.0);

        let info = pipeline.describe("tall.jpg", &jpeg_bytes(90, 160)).await.unwrap();
        assert_eq!(info.matched_format.as_deref(), Some("9:16"));
        assert_eq!((info.width, info.height), (90, 160));

        assert_eq!(encoder.transcodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_trim_keeps_container() {
        let pipeline = pipeline(Arc::new(CountingEncoder::default()), Some(SourceDimensions::new(640, 360, 80.0)));
        let asset = pipeline.trim("clip.mp4", mp4_bytes()).await.unwrap();
        assert_eq!(asset.outcome.output_bytes, b"trimmed-video");
        assert_eq!(asset.outcome.output_extension, "mp4");
        assert_eq!(asset.outcome.final_duration_secs, 30.0);
    }

    #[test]
    fn test_health_check_reports_missing_prober() {
        let pipeline = pipeline(Arc::new(CountingEncoder::default()), None);
        let err = pipeline.health_check().unwrap_err();
        assert!(err.is_fatal());
    }
}
