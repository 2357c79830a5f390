//! # Format Catalog & Matcher
//!
//! Questo modulo definisce il catalogo dei formati standard e l'algoritmo di matching.
//!
//! ## Responsabilità:
//! - `MediaFormat`: voce immutabile del catalogo (nome, dimensioni target, rapporto)
//! - `FormatCatalog`: lista ordinata di formati, costruita una volta e iniettata
//!   tramite `Config` (nessuno stato globale)
//! - `match_format()`: sceglie il formato con rapporto numericamente più vicino
//!
//! ## Catalogo standard (l'ordine fa parte del contratto):
//! | Nome      | Dimensioni | Etichetta |
//! |-----------|------------|-----------|
//! | square    | 1080x1080  | 1:1       |
//! | portrait  | 1080x1350  | 4:5       |
//! | story     | 1080x1920  | 9:16      |
//! | landscape | 1080x608   | 1.91:1    |
//!
//! ## Tie-breaking:
//! A parità di distanza vince il primo formato incontrato nell'ordine del catalogo.
//! Il matching non ha effetti collaterali: serve anche per riportare il
//! "formato standard più vicino" di asset che non vengono ridimensionati.

use crate::error::NormalizeError;
use serde::{Deserialize, Serialize};

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Canonical label, e.g. "9:16"
    pub formatted_ratio: String,
}

impl MediaFormat {
    pub fn new(name: &str, width: u32, height: u32, formatted_ratio: &str) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            formatted_ratio: formatted_ratio.to_string(),
        }
    }

    /// `width / height` of the target box
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Ordered, read-only table of target formats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatCatalog {
    formats: Vec<MediaFormat>,
}

impl Default for FormatCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl FormatCatalog {
    /// Build a catalog from an explicit, ordered list
    pub fn new(formats: Vec<MediaFormat>) -> Self {
        Self { formats }
    }

    /// The four social-media formats
    pub fn standard() -> Self {
        Self::new(vec![
            MediaFormat::new("square", 1080, 1080, "1:1"),
            MediaFormat::new("portrait", 1080, 1350, "4:5"),
            MediaFormat::new("story", 1080, 1920, "9:16"),
            MediaFormat::new("landscape", 1080, 608, "1.91:1"),
        ])
    }

    pub fn formats(&self) -> &[MediaFormat] {
        &self.formats
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Look a format up by its name or by its formatted ratio
    pub fn find(&self, name: &str) -> Result<&MediaFormat, NormalizeError> {
        self.formats
            .iter()
            .find(|f| f.name == name || f.formatted_ratio == name)
            .ok_or_else(|| NormalizeError::InvalidFormatName(name.to_string()))
    }

    /// Select the entry whose aspect ratio is closest to `width / height`.
    ///
    /// Only a strictly smaller difference replaces the current best, so on ties the
    /// earlier catalog entry wins. Zero dimensions yield `DivisionUndefined`.
    pub fn match_format(&self, width: u32, height: u32) -> Result<&MediaFormat, NormalizeError> {
        if width == 0 || height == 0 {
            return Err(NormalizeError::DivisionUndefined { width, height });
        }
        let ratio = width as f64 / height as f64;
        self.closest_to_ratio(ratio)
    }

    /// Same as `match_format` for an already computed ratio
    pub fn closest_to_ratio(&self, ratio: f64) -> Result<&MediaFormat, NormalizeError> {
        let mut iter = self.formats.iter();
        let first = iter
            .next()
            .ok_or_else(|| NormalizeError::UnknownFormat("format catalog is empty".to_string()))?;

        let mut best = first;
        let mut min_diff = (ratio - first.aspect_ratio()).abs();

        for format in iter {
            let diff = (ratio - format.aspect_ratio()).abs();
            if diff < min_diff {
                min_diff = diff;
                best = format;
            }
        }

        Ok(best)
    }
}
