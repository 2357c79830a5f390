//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione della pipeline di normalizzazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di trasformazione
//! - Inietta il `FormatCatalog` (niente tabelle globali: i test possono usare cataloghi propri)
//! - Fornisce validazione robusta dei parametri
//! - Supporta caricamento/salvataggio da/verso file JSON
//!
//! ## Parametri principali:
//! - `image_quality`: Qualità JPEG in output (1-100, default: 90)
//! - `resize_mode`: `stretch` (default), `fill` (crop centrato), `pad` (bande nere)
//! - `duration_cap_secs`: Durata massima del video transcodificato (default: 59)
//! - `trim_cap_secs`: Durata del trim rapido senza ricodifica (default: 30)
//! - `video_crf` / `fallback_crf`: CRF primario e di fallback (default: 28 / 30)
//! - `video_preset` / `fallback_preset`: preset x264 (default: medium / ultrafast)
//! - `audio_bitrate` / `fallback_audio_bitrate`: (default: 128k / 96k)
//! - `scale_policy`: `preserve` (default), `target_height`, `pad_to_format`
//! - `probe_window_secs`: limita ffprobe ai primi secondi (default: 5)
//! - `probe_timeout_secs` / `encoder_timeout_secs`: timeout per invocazione
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     image_quality: 85,
//!     video_crf: 26,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::catalog::FormatCatalog;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a still image is fitted into the matched format's box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Resize straight to the target box, accepting distortion
    #[default]
    Stretch,
    /// Scale to cover the box, then center-crop the overflow
    Fill,
    /// Scale to fit inside the box, then pad with black bars
    Pad,
}

/// Audio handling for the primary transcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    #[default]
    Reencode,
    Copy,
}

/// Resolution policy for transcoded videos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScalePolicy {
    /// Keep the source resolution, only reduce bitrate
    #[default]
    Preserve,
    /// Scale to a fixed height, width follows the source aspect ratio
    TargetHeight { height: u32 },
    /// Scale into the matched catalog box and pad the remainder
    PadToFormat,
}

/// Configuration for media normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG quality for normalized images (1-100)
    pub image_quality: u8,
    pub resize_mode: ResizeMode,
    /// Ceiling applied to every transcoded video
    pub duration_cap_secs: f64,
    /// Ceiling for the stream-copy trim mode
    pub trim_cap_secs: f64,
    /// Primary CRF (0-51, higher = smaller)
    pub video_crf: u8,
    /// CRF used by the fallback attempt, never lower than `video_crf`
    pub fallback_crf: u8,
    pub video_preset: String,
    pub fallback_preset: String,
    pub audio_mode: AudioMode,
    pub audio_bitrate: String,
    pub fallback_audio_bitrate: String,
    pub scale_policy: ScalePolicy,
    /// Limit ffprobe to the first N seconds of the stream
    pub probe_window_secs: Option<u32>,
    pub probe_timeout_secs: u64,
    pub encoder_timeout_secs: u64,
    /// Denominator bound for human-readable ratios
    pub max_ratio_denominator: u32,
    /// Number of assets processed in parallel
    pub workers: usize,
    /// Output directory for normalized files
    pub output_path: Option<PathBuf>,
    /// Emit JSON events on stdout
    pub json_output: bool,
    /// Target formats, order matters for tie-breaking
    pub catalog: FormatCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_quality: 90,
            resize_mode: ResizeMode::Stretch,
            duration_cap_secs: 59.0,
            trim_cap_secs: 30.0,
            video_crf: 28,
            fallback_crf: 30,
            video_preset: "medium".to_string(),
            fallback_preset: "ultrafast".to_string(),
            audio_mode: AudioMode::Reencode,
            audio_bitrate: "128k".to_string(),
            fallback_audio_bitrate: "96k".to_string(),
            scale_policy: ScalePolicy::Preserve,
            probe_window_secs: Some(5),
            probe_timeout_secs: 20,
            encoder_timeout_secs: 90,
            max_ratio_denominator: 100,
            workers: 4,
            output_path: None,
            json_output: false,
            catalog: FormatCatalog::standard(),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.image_quality == 0 || self.image_quality > 100 {
            return Err(anyhow::anyhow!("Image quality must be between 1 and 100"));
        }

        if self.video_crf > 51 || self.fallback_crf > 51 {
            return Err(anyhow::anyhow!("Video CRF must be between 0 and 51"));
        }

        if self.fallback_crf < self.video_crf {
            return Err(anyhow::anyhow!(
                "Fallback CRF ({}) must not be lower than the primary CRF ({})",
                self.fallback_crf,
                self.video_crf
            ));
        }

        if !(self.duration_cap_secs > 0.0) || !(self.trim_cap_secs > 0.0) {
            return Err(anyhow::anyhow!("Duration caps must be greater than 0"));
        }

        if self.probe_timeout_secs == 0 || self.encoder_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Tool timeouts must be greater than 0"));
        }

        if self.max_ratio_denominator == 0 {
            return Err(anyhow::anyhow!("Ratio denominator bound must be greater than 0"));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if let ScalePolicy::TargetHeight { height } = self.scale_policy {
            if height == 0 || height % 2 != 0 {
                return Err(anyhow::anyhow!("Target height must be a positive even number"));
            }
        }

        if self.catalog.is_empty() {
            return Err(anyhow::anyhow!("Format catalog must contain at least one format"));
        }
        if let Some(bad) = self.catalog.formats().iter().find(|f| f.width == 0 || f.height == 0) {
            return Err(anyhow::anyhow!("Format '{}' has a zero dimension", bad.name));
        }

        if let Some(ref output_path) = self.output_path {
            if output_path.exists() && !output_path.is_dir() {
                return Err(anyhow::anyhow!("Output path is not a directory: {}", output_path.display()));
            }
        }

        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn encoder_timeout(&self) -> Duration {
        Duration::from_secs(self.encoder_timeout_secs)
    }

    /// Default config file location (`<config dir>/media-normalizer/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("media-normalizer").join("config.json"))
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
