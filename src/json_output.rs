//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per chi integra la CLI
//! (front-end di upload, script).
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout
//! - Riporta per ogni asset il record `MediaInfo` oppure l'`AssetFailure` strutturata
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio batch (input, directory di output, configurazione)
//! - `file_start`: Inizio elaborazione di un file
//! - `file_complete`: Fine elaborazione di un file (successo o fallimento)
//! - `complete`: Fine batch con statistiche finali
//! - `error`: Errore generale (es. encoder non disponibile)

use crate::config::{Config, ResizeMode, ScalePolicy};
use crate::error::AssetFailure;
use crate::media::MediaInfo;
use crate::progress::NormalizeStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del batch
    Start {
        inputs: Vec<PathBuf>,
        output_dir: Option<PathBuf>,
        total_files: usize,
        config: JsonConfig,
    },

    /// Inizio elaborazione di un file specifico
    FileStart {
        path: PathBuf,
        size: u64,
        index: usize,
        total: usize,
    },

    /// Fine elaborazione di un file specifico
    FileComplete {
        path: PathBuf,
        original_size: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_size: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        info: Option<MediaInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        failure: Option<AssetFailure>,
    },

    /// Batch completato
    Complete {
        files_processed: usize,
        files_transformed: usize,
        files_passed_through: usize,
        errors: usize,
        total_original_size: u64,
        total_output_size: u64,
        duration_seconds: f64,
    },

    /// Errore generale
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

/// Configurazione riportata nel messaggio `start`
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub image_quality: u8,
    pub resize_mode: ResizeMode,
    pub video_crf: u8,
    pub fallback_crf: u8,
    pub duration_cap_secs: f64,
    pub scale_policy: ScalePolicy,
    pub workers: usize,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(inputs: Vec<PathBuf>, output_dir: Option<PathBuf>, total_files: usize, config: &Config) -> Self {
        Self::Start {
            inputs,
            output_dir,
            total_files,
            config: JsonConfig::from(config),
        }
    }

    pub fn file_start(path: PathBuf, size: u64, index: usize, total: usize) -> Self {
        Self::FileStart {
            path,
            size,
            index,
            total,
        }
    }

    /// Crea un messaggio di completamento generale
    pub fn complete(stats: &NormalizeStats, duration_seconds: f64) -> Self {
        Self::Complete {
            files_processed: stats.files_processed,
            files_transformed: stats.files_transformed,
            files_passed_through: stats.files_passed_through,
            errors: stats.errors,
            total_original_size: stats.total_original_size,
            total_output_size: stats.total_output_size,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            image_quality: config.image_quality,
            resize_mode: config.resize_mode,
            video_crf: config.video_crf,
            fallback_crf: config.fallback_crf,
            duration_cap_secs: config.duration_cap_secs,
            scale_policy: config.scale_policy,
            workers: config.workers,
        }
    }
}
