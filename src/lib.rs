//! # Media Normalizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare della pipeline di normalizzazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `sniffer`: Classificazione immagine / video / altro tramite magic bytes
//! - `catalog` / `aspect`: Catalogo formati, matching e razionalizzazione dei rapporti
//! - `image_processor`: Decode, resize Lanczos e re-encode JPEG
//! - `prober`: Estrazione metadata con ffprobe
//! - `encoder`: Parametri di codifica e invocazione di ffmpeg
//! - `video_processor`: Macchina a stati della transcodifica con fallback
//! - `pipeline`: Punto di ingresso per singolo upload
//! - `uploader`: Collaboratore di storage
//! - `runner`: Esecuzione batch dalla CLI
//! - `config` / `error`: Configurazione e tassonomia degli errori
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use media_normalizer::{Config, MediaPipeline};
//!
//! let pipeline = MediaPipeline::new(Config::default());
//! pipeline.health_check()?;
//! let asset = pipeline.process("clip.mov", bytes).await?;
//! println!("{}", asset.info.summary);
//! ```

pub mod aspect;
pub mod catalog;
pub mod config;
pub mod encoder;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod media;
pub mod pipeline;
pub mod prober;
pub mod progress;
pub mod runner;
pub mod sniffer;
pub mod tool_resolver;
pub mod uploader;
pub mod utils;
pub mod video_processor;

pub use catalog::{FormatCatalog, MediaFormat};
pub use config::Config;
pub use error::{AssetFailure, NormalizeError, Stage};
pub use media::{MediaInfo, ProcessingOutcome, SourceDimensions};
pub use pipeline::{MediaPipeline, ProcessedAsset};
pub use runner::{BatchRunner, RunMode};
