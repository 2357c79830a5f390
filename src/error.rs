//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori della pipeline di normalizzazione.
//!
//! ## Responsabilità:
//! - Definisce `NormalizeError` per ogni stadio che può fallire
//! - Associa ogni errore allo stadio (`Stage`) che lo ha prodotto
//! - Distingue gli errori per singolo asset da quelli fatali per il servizio
//! - Fornisce `AssetFailure`, la forma serializzabile usata al confine della pipeline
//!
//! ## Categorie di errori:
//! - `UnreadableInput`: impossibile leggere i byte sorgente
//! - `UnknownFormat`: nessuna firma riconosciuta (non necessariamente fatale)
//! - `Decode` / `Encode`: errori specifici delle immagini
//! - `ProbeFormat` / `ProbeUnavailable`: estrazione metadata con ffprobe
//! - `CorruptInput`: il passo di validazione ha rilevato un input corrotto
//! - `Transcode`: falliti sia il tentativo primario sia il fallback, oppure
//!   l'encoder è andato in timeout o non è partito
//! - `EmptyOutput`: l'encoder ha "avuto successo" ma il file è vuoto o assente
//! - `EncoderUnavailable`: ffmpeg non risolvibile, fatale per l'istanza
//!
//! ## Esempio:
//! ```rust,ignore
//! if !encoder.is_available() {
//!     return Err(NormalizeError::EncoderUnavailable("ffmpeg".to_string()));
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline stage an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Sniff,
    Match,
    Image,
    Probe,
    Validate,
    Transcode,
    Verify,
    Environment,
    Io,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Sniff => "sniff",
            Stage::Match => "match",
            Stage::Image => "image",
            Stage::Probe => "probe",
            Stage::Validate => "validate",
            Stage::Transcode => "transcode",
            Stage::Verify => "verify",
            Stage::Environment => "environment",
            Stage::Io => "io",
        };
        f.write_str(name)
    }
}

/// Errors produced while normalizing a single asset
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("Unreadable input: {0}")]
    UnreadableInput(#[source] std::io::Error),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Invalid format name: {0}")]
    InvalidFormatName(String),

    #[error("Aspect ratio undefined for {width}x{height}")]
    DivisionUndefined { width: u32, height: u32 },

    #[error("Image decode error: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image encode error: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Unexpected probe output: {0:?}")]
    ProbeFormat(String),

    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("Input appears to be corrupt: {0}")]
    CorruptInput(String),

    #[error("Transcode failed (all methods)\nprimary:\n{primary}\nfallback:\n{fallback}")]
    Transcode { primary: String, fallback: String },

    #[error("Encoder produced no output: {}", .0.display())]
    EmptyOutput(PathBuf),

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NormalizeError {
    /// Stage of the pipeline that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            NormalizeError::UnreadableInput(_) => Stage::Read,
            NormalizeError::UnknownFormat(_) => Stage::Sniff,
            NormalizeError::InvalidFormatName(_) | NormalizeError::DivisionUndefined { .. } => {
                Stage::Match
            }
            NormalizeError::Decode(_) | NormalizeError::Encode(_) => Stage::Image,
            NormalizeError::ProbeFormat(_) | NormalizeError::ProbeUnavailable(_) => Stage::Probe,
            NormalizeError::CorruptInput(_) => Stage::Validate,
            NormalizeError::Transcode { .. } => Stage::Transcode,
            NormalizeError::EmptyOutput(_) => Stage::Verify,
            NormalizeError::EncoderUnavailable(_) => Stage::Environment,
            NormalizeError::Io(_) => Stage::Io,
        }
    }

    /// Environment-level errors that make the whole instance unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, NormalizeError::EncoderUnavailable(_))
    }
}

/// Structured per-asset failure handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub stage: Stage,
    pub message: String,
}

impl From<&NormalizeError> for AssetFailure {
    fn from(err: &NormalizeError) -> Self {
        Self {
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_encoder_unavailable_is_fatal() {
        assert!(NormalizeError::EncoderUnavailable("ffmpeg".into()).is_fatal());
        assert!(!NormalizeError::CorruptInput("bad".into()).is_fatal());
        assert!(!NormalizeError::Transcode {
            primary: "a".into(),
            fallback: "b".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_asset_failure_carries_stage_and_diagnostics() {
        let err = NormalizeError::Transcode {
            primary: "unknown encoder".into(),
            fallback: "invalid argument".into(),
        };
        let failure = AssetFailure::from(&err);
        assert_eq!(failure.stage, Stage::Transcode);
        assert!(failure.message.contains("unknown encoder"));
        assert!(failure.message.contains("invalid argument"));

        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"stage\":\"transcode\""));
    }
}
