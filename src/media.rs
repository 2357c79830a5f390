//! # Media Records
//!
//! Tipi dati condivisi tra i componenti della pipeline.
//!
//! ## Responsabilità:
//! - `SourceDimensions`: larghezza, altezza e durata misurate (0 = sconosciuto)
//! - `ProcessingOutcome`: byte normalizzati + dimensioni finali, consumato subito
//!   dal collaboratore di upload e poi scartato
//! - `MediaInfo`: record di metadata restituito ai chiamanti (serializzabile)

use crate::aspect;
use serde::{Deserialize, Serialize};

/// Measured dimensions of a source asset. Zero means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDimensions {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

impl SourceDimensions {
    pub fn new(width: u32, height: u32, duration_secs: f64) -> Self {
        Self {
            width,
            height,
            duration_secs,
        }
    }

    pub fn image(width: u32, height: u32) -> Self {
        Self::new(width, height, 0.0)
    }

    /// True when both width and height were measured
    pub fn has_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// `width / height`, `None` when either side is unknown
    pub fn ratio(&self) -> Option<f64> {
        self.has_size().then(|| self.width as f64 / self.height as f64)
    }
}

/// Result of transforming one asset
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    /// New bytes, or the untouched source when nothing was done
    pub output_bytes: Vec<u8>,
    pub was_transformed: bool,
    pub final_dimensions: SourceDimensions,
    pub final_duration_secs: f64,
    /// Formatted ratio of the matched catalog entry
    pub matched_format: Option<String>,
    /// Extension of the produced container/codec
    pub output_extension: String,
}

impl ProcessingOutcome {
    /// Pass-through outcome for assets that are not processed
    pub fn untouched(bytes: Vec<u8>, extension: &str) -> Self {
        Self {
            output_bytes: bytes,
            was_transformed: false,
            final_dimensions: SourceDimensions::default(),
            final_duration_secs: 0.0,
            matched_format: None,
            output_extension: extension.to_string(),
        }
    }
}

/// Metadata record surfaced to callers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub file_type: String,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub width: u32,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub height: u32,
    /// Free-form rationalized ratio, e.g. "16:9"
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aspect_ratio: Option<String>,
    /// Closest catalog format label, e.g. "1.91:1"
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub matched_format: Option<String>,
    #[serde(skip_serializing_if = "is_zero_f64", default)]
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub summary: String,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

impl MediaInfo {
    /// Fill dimensions, rationalized ratio and duration from measured values
    pub fn with_dimensions(mut self, dims: &SourceDimensions, max_denominator: u32) -> Self {
        self.width = dims.width;
        self.height = dims.height;
        self.duration = dims.duration_secs;
        if dims.has_size() {
            self.aspect_ratio = Some(aspect::ratio_label(dims.width, dims.height, max_denominator));
        }
        self
    }
}

/// Rough quality tier of a video by resolution
pub fn video_quality_tier(width: u32, height: u32) -> &'static str {
    if width >= 1920 || height >= 1080 {
        "high"
    } else if width >= 1280 || height >= 720 {
        "medium"
    } else {
        "low"
    }
}
