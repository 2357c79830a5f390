//! # Video Encoder
//!
//! Parametri di codifica e invocazione di FFmpeg.
//!
//! ## Responsabilità:
//! - `EncodeParams`: profilo di codifica completo (cap durata, codec, preset, CRF,
//!   pixel format, politica audio, faststart, scala opzionale)
//! - Costruzione dei profili primario e di fallback a partire dalla `Config`
//! - Trait `VideoEncoder`: confine stretto verso il processo esterno, sostituibile
//!   con un fake nei test
//! - `FfmpegEncoder`: implementazione reale con timeout per invocazione
//! - `EncoderFailure`: distingue un'uscita con errore (diagnostica dell'input) da
//!   timeout e mancato avvio (problemi del processo)
//!
//! ## Profilo primario (default):
//! `-t 59 -c:v libx264 -preset medium -crf 28 -c:a aac -b:a 128k -movflags +faststart -pix_fmt yuv420p`
//!
//! ## Profilo di fallback:
//! Preset `ultrafast`, CRF più alto (30), audio semplificato (AAC 96k), niente faststart.
//! Per i container con audio spesso incompatibile con MP4 (webm, mkv, ogg, ogv)
//! l'audio viene sempre ricodificato, mai copiato.

use crate::catalog::FormatCatalog;
use crate::config::{AudioMode, Config, ScalePolicy};
use crate::media::SourceDimensions;
use crate::tool_resolver::{run_tool, ToolFailure, ToolResolver};
use crate::utils::{diagnostic_tail, even, seconds_arg};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Containers whose audio tracks rarely survive a stream copy into MP4
const REENCODE_AUDIO_CONTAINERS: &[&str] = &["webm", "mkv", "ogg", "ogv"];

/// Ratio assumed when the source could not be probed
const DEFAULT_RATIO: f64 = 16.0 / 9.0;

/// Lines of encoder stderr kept as diagnostic text
const DIAGNOSTIC_LINES: usize = 20;

/// Audio handling of a transcode attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AudioPolicy {
    Reencode { codec: String, bitrate: String },
    Copy,
}

/// Output resolution of a transcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTarget {
    pub width: u32,
    pub height: u32,
    /// Fit inside the box and pad the remainder instead of scaling to it
    pub pad: bool,
}

impl ScaleTarget {
    /// ffmpeg `-vf` expression
    pub fn filter(&self) -> String {
        if self.pad {
            format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
                w = self.width,
                h = self.height
            )
        } else {
            format!("scale={}:{}", self.width, self.height)
        }
    }
}

/// Complete parameter set of one encoder attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeParams {
    pub duration_cap_secs: f64,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub audio: AudioPolicy,
    /// Move the moov atom to the front for progressive playback
    pub faststart: bool,
    pub scale: Option<ScaleTarget>,
    pub is_fallback: bool,
}

impl EncodeParams {
    /// Primary profile derived from the configuration and the probed source
    pub fn primary(config: &Config, dims: &SourceDimensions, catalog: &FormatCatalog) -> Self {
        let audio = match config.audio_mode {
            AudioMode::Reencode => AudioPolicy::Reencode {
                codec: "aac".to_string(),
                bitrate: config.audio_bitrate.clone(),
            },
            AudioMode::Copy => AudioPolicy::Copy,
        };

        Self {
            duration_cap_secs: config.duration_cap_secs,
            video_codec: "libx264".to_string(),
            preset: config.video_preset.clone(),
            crf: config.video_crf,
            pixel_format: "yuv420p".to_string(),
            audio,
            faststart: true,
            scale: scale_target(config.scale_policy, dims, catalog),
            is_fallback: false,
        }
    }

    /// Relaxed profile used after a failed primary attempt.
    ///
    /// Keeps the cap and scale of `primary`; `container` is the source extension.
    pub fn fallback(config: &Config, primary: &EncodeParams, container: Option<&str>) -> Self {
        let forced = container
            .map(|ext| REENCODE_AUDIO_CONTAINERS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        let audio = if forced || config.audio_mode == AudioMode::Reencode {
            AudioPolicy::Reencode {
                codec: "aac".to_string(),
                bitrate: config.fallback_audio_bitrate.clone(),
            }
        } else {
            AudioPolicy::Copy
        };

        Self {
            preset: config.fallback_preset.clone(),
            crf: config.fallback_crf,
            audio,
            faststart: false,
            is_fallback: true,
            ..primary.clone()
        }
    }

    /// Human-readable list of what this profile did to `source`
    pub fn summary(&self, source: &SourceDimensions, container: Option<&str>) -> Vec<String> {
        let mut items = vec!["bitrate reduced".to_string()];
        if source.duration_secs > self.duration_cap_secs {
            items.push(format!("duration capped at {}s", seconds_arg(self.duration_cap_secs)));
        }
        if let Some(scale) = self.scale {
            items.push(format!("scaled to {}x{}", scale.width, scale.height));
        }
        if !container.map(|c| c.eq_ignore_ascii_case("mp4")).unwrap_or(false) {
            items.push("converted to MP4".to_string());
        }
        if self.is_fallback {
            items.push("fallback settings used".to_string());
        }
        items
    }
}

fn scale_target(policy: ScalePolicy, dims: &SourceDimensions, catalog: &FormatCatalog) -> Option<ScaleTarget> {
    match policy {
        ScalePolicy::Preserve => None,
        ScalePolicy::TargetHeight { height } => {
            let ratio = dims.ratio().unwrap_or(DEFAULT_RATIO);
            Some(ScaleTarget {
                width: even(height as f64 * ratio),
                height,
                pad: false,
            })
        }
        ScalePolicy::PadToFormat => {
            let format = catalog.closest_to_ratio(dims.ratio().unwrap_or(DEFAULT_RATIO)).ok()?;
            Some(ScaleTarget {
                width: format.width,
                height: format.height,
                pad: true,
            })
        }
    }
}

/// Why an encoder invocation did not succeed.
///
/// Only `Exited` says anything about the input; the other two are about the
/// process itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncoderFailure {
    /// The encoder ran and exited non-zero, with its stderr tail
    #[error("{0}")]
    Exited(String),

    #[error("{0}")]
    TimedOut(String),

    /// The binary is missing or could not be started
    #[error("{0}")]
    Spawn(String),
}

impl From<ToolFailure> for EncoderFailure {
    fn from(failure: ToolFailure) -> Self {
        match failure {
            ToolFailure::TimedOut { .. } => EncoderFailure::TimedOut(failure.to_string()),
            ToolFailure::Spawn { .. } => EncoderFailure::Spawn(failure.to_string()),
        }
    }
}

/// Narrow interface over the external encoder.
///
/// Failures carry the encoder's diagnostic text.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Whether the encoder binary can be resolved
    fn is_available(&self) -> bool;

    /// Decode the first `cap_secs` seconds of `input` without writing output
    async fn validate(&self, input: &Path, cap_secs: f64) -> Result<(), EncoderFailure>;

    async fn transcode(&self, input: &Path, output: &Path, params: &EncodeParams) -> Result<(), EncoderFailure>;

    /// Stream-copy the first `cap_secs` seconds of `input`
    async fn trim(&self, input: &Path, output: &Path, cap_secs: f64) -> Result<(), EncoderFailure>;
}

/// `VideoEncoder` backed by the ffmpeg binary
pub struct FfmpegEncoder {
    resolver: ToolResolver,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(config: &Config, resolver: ToolResolver) -> Self {
        Self {
            resolver,
            timeout: config.encoder_timeout(),
        }
    }

    fn binary(&self) -> Result<PathBuf, EncoderFailure> {
        self.resolver
            .resolve("ffmpeg")
            .ok_or_else(|| EncoderFailure::Spawn("ffmpeg is not installed".to_string()))
    }

    async fn run(&self, args: Vec<String>) -> Result<(), EncoderFailure> {
        let ffmpeg = self.binary()?;
        let output = run_tool(&ffmpeg, &args, self.timeout).await?;

        if output.success {
            debug!("ffmpeg finished in {:.1}s", output.elapsed.as_secs_f64());
            Ok(())
        } else {
            let diagnostic = diagnostic_tail(&output.stderr, DIAGNOSTIC_LINES);
            warn!("ffmpeg failed after {:.1}s: {}", output.elapsed.as_secs_f64(), diagnostic);
            Err(EncoderFailure::Exited(diagnostic))
        }
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    fn is_available(&self) -> bool {
        self.resolver.is_available("ffmpeg")
    }

    async fn validate(&self, input: &Path, cap_secs: f64) -> Result<(), EncoderFailure> {
        self.run(validate_args(input, cap_secs)).await
    }

    async fn transcode(&self, input: &Path, output: &Path, params: &EncodeParams) -> Result<(), EncoderFailure> {
        self.run(transcode_args(input, output, params)).await
    }

    async fn trim(&self, input: &Path, output: &Path, cap_secs: f64) -> Result<(), EncoderFailure> {
        self.run(trim_args(input, output, cap_secs)).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Decode to the null muxer, bounded to the part that will be encoded
pub fn validate_args(input: &Path, cap_secs: f64) -> Vec<String> {
    crate::args![
        "-v", "error",
        "-i", path_arg(input),
        "-t", seconds_arg(cap_secs),
        "-f", "null", "-",
    ]
}

pub fn transcode_args(input: &Path, output: &Path, params: &EncodeParams) -> Vec<String> {
    let mut args = crate::args![
        "-hide_banner",
        "-i", path_arg(input),
        "-t", seconds_arg(params.duration_cap_secs),
        "-c:v", params.video_codec,
        "-preset", params.preset,
        "-crf", params.crf,
    ];

    if let Some(scale) = params.scale {
        args.extend(crate::args!["-vf", scale.filter()]);
    }

    match params.audio {
        AudioPolicy::Reencode { ref codec, ref bitrate } => {
            args.extend(crate::args!["-c:a", codec, "-b:a", bitrate]);
        }
        AudioPolicy::Copy => args.extend(crate::args!["-c:a", "copy"]),
    }

    if params.faststart {
        args.extend(crate::args!["-movflags", "+faststart"]);
    }

    args.extend(crate::args!["-pix_fmt", params.pixel_format, "-y", path_arg(output)]);
    args
}

/// Stream copy, no re-encode
pub fn trim_args(input: &Path, output: &Path, cap_secs: f64) -> Vec<String> {
    crate::args![
        "-hide_banner",
        "-i", path_arg(input),
        "-t", seconds_arg(cap_secs),
        "-c", "copy",
        "-avoid_negative_ts", "make_zero",
        "-y", path_arg(output),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let idx = args.iter().position(|a| a == flag)?;
        args.get(idx + 1).map(String::as_str)
    }

    #[test]
    fn test_primary_defaults() {
        let config = Config::default();
        let params = EncodeParams::primary(&config, &SourceDimensions::default(), &config.catalog);
        let args = transcode_args(Path::new("in.mov"), Path::new("out.mp4"), &params);

        assert_eq!(value_after(&args, "-t"), Some("59"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-preset"), Some("medium"));
        assert_eq!(value_after(&args, "-crf"), Some("28"));
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
        assert_eq!(value_after(&args, "-pix_fmt"), Some("yuv420p"));
        assert!(value_after(&args, "-vf").is_none());
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_fallback_is_relaxed() {
        let config = Config::default();
        let primary = EncodeParams::primary(&config, &SourceDimensions::default(), &config.catalog);
        let fallback = EncodeParams::fallback(&config, &primary, Some("mp4"));

        assert_eq!(fallback.preset, "ultrafast");
        assert!(fallback.crf > primary.crf);
        assert_eq!(fallback.duration_cap_secs, primary.duration_cap_secs);
        assert!(!fallback.faststart);
        assert!(fallback.is_fallback);
        assert_eq!(
            fallback.audio,
            AudioPolicy::Reencode {
                codec: "aac".to_string(),
                bitrate: "96k".to_string()
            }
        );
    }

    #[test]
    fn test_fallback_forces_audio_reencode_for_open_containers() {
        let config = Config {
            audio_mode: AudioMode::Copy,
            ..Default::default()
        };
        let primary = EncodeParams::primary(&config, &SourceDimensions::default(), &config.catalog);
        assert_eq!(primary.audio, AudioPolicy::Copy);

        assert_eq!(EncodeParams::fallback(&config, &primary, Some("mp4")).audio, AudioPolicy::Copy);
        for container in ["webm", "MKV", "ogg", "ogv"] {
            let fallback = EncodeParams::fallback(&config, &primary, Some(container));
            assert!(matches!(fallback.audio, AudioPolicy::Reencode { .. }), "{}", container);
        }
    }

    #[test]
    fn test_target_height_follows_source_ratio() {
        let config = Config {
            scale_policy: ScalePolicy::TargetHeight { height: 720 },
            ..Default::default()
        };
        let params = EncodeParams::primary(&config, &SourceDimensions::new(1080, 1920, 10.0), &config.catalog);
        assert_eq!(params.scale, Some(ScaleTarget { width: 406, height: 720, pad: false }));

        // unknown dimensions assume 16:9
        let params = EncodeParams::primary(&config, &SourceDimensions::default(), &config.catalog);
        assert_eq!(params.scale.unwrap().width, 1280);
    }

    #[test]
    fn test_pad_to_format_uses_matched_box() {
        let config = Config {
            scale_policy: ScalePolicy::PadToFormat,
            ..Default::default()
        };
        let params = EncodeParams::primary(&config, &SourceDimensions::new(720, 1280, 5.0), &config.catalog);
        let scale = params.scale.unwrap();
        assert_eq!((scale.width, scale.height), (1080, 1920));
        assert!(scale.filter().contains("pad=1080:1920"));

        let args = transcode_args(Path::new("a"), Path::new("b"), &params);
        assert_eq!(value_after(&args, "-vf"), Some(scale.filter().as_str()));
    }

    #[test]
    fn test_summary() {
        let config = Config::default();
        let source = SourceDimensions::new(1920, 1080, 120.0);
        let params = EncodeParams::primary(&config, &source, &config.catalog);
        assert_eq!(
            params.summary(&source, Some("mov")),
            vec!["bitrate reduced", "duration capped at 59s", "converted to MP4"]
        );

        let short = SourceDimensions::new(1920, 1080, 10.0);
        let fallback = EncodeParams::fallback(&config, &params, Some("mp4"));
        assert_eq!(
            fallback.summary(&short, Some("mp4")),
            vec!["bitrate reduced", "fallback settings used"]
        );
    }

    #[test]
    fn test_validate_and_trim_args() {
        assert_eq!(
            validate_args(Path::new("in.mp4"), 59.0),
            vec!["-v", "error", "-i", "in.mp4", "-t", "59", "-f", "null", "-"]
        );
        let args = trim_args(Path::new("in.mp4"), Path::new("out.mp4"), 30.0);
        assert_eq!(value_after(&args, "-t"), Some("30"));
        assert_eq!(value_after(&args, "-c"), Some("copy"));
        assert_eq!(value_after(&args, "-avoid_negative_ts"), Some("make_zero"));
    }

    #[test]
    fn test_tool_failures_keep_their_kind() {
        let timed_out = EncoderFailure::from(ToolFailure::TimedOut {
            program: "ffmpeg".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(timed_out, EncoderFailure::TimedOut("ffmpeg timed out after 1s".to_string()));

        let spawn = EncoderFailure::from(ToolFailure::Spawn {
            program: "ffmpeg".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert!(matches!(spawn, EncoderFailure::Spawn(ref d) if d.starts_with("failed to start ffmpeg")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_ffmpeg_is_a_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = Config {
            encoder_timeout_secs: 1,
            ..Default::default()
        };
        let encoder = FfmpegEncoder::new(&config, ToolResolver::with_tools_dir(dir.path().to_path_buf()));
        let err = encoder.validate(Path::new("in.mp4"), 59.0).await.unwrap_err();
        assert!(matches!(err, EncoderFailure::TimedOut(ref d) if d.contains("timed out after 1s")));
    }
}
