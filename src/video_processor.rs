//! # Video Transform
//!
//! Questo modulo implementa la normalizzazione dei video come macchina a stati
//! esplicita, con un solo tentativo di fallback.
//!
//! ## Stati:
//! ```text
//! CheckEncoder ──► ValidateInput ──► PrimaryTranscode ──► VerifyOutput ──► Succeeded
//!      │                │                  │                  ▲   │
//!      ▼                ▼                  ▼                  │   ▼
//!    Failed           Failed       FallbackTranscode ─────────┘  Failed
//!                                          │
//!                                          ▼
//!                                        Failed
//! ```
//!
//! - **CheckEncoder**: ffmpeg risolvibile, altrimenti `EncoderUnavailable` (fatale)
//! - **ValidateInput**: decode senza output dei primi `duration_cap_secs` secondi;
//!   un'uscita con errore è `CorruptInput`, un timeout o un avvio fallito è
//!   `Transcode` (il processo, non l'input, è il problema)
//! - **PrimaryTranscode**: profilo primario (`EncodeParams::primary`)
//! - **FallbackTranscode**: profilo rilassato, eseguito al massimo una volta;
//!   se fallisce → `Transcode` con la diagnostica di entrambi i tentativi
//! - **VerifyOutput**: il file esiste e non è vuoto, altrimenti `EmptyOutput`
//!   (l'exit code dell'encoder da solo non basta)
//!
//! ## Risorse temporanee:
//! Ogni invocazione lavora in una `TempDir` propria. In caso di errore la directory
//! viene eliminata prima di ritornare; in caso di successo vive quanto il
//! `ScratchOutput` restituito.
//!
//! ## Trim:
//! `trim()` è un punto di ingresso distinto: stream copy dei primi
//! `trim_cap_secs` secondi, senza ricodifica né fallback.

use crate::config::Config;
use crate::encoder::{EncodeParams, EncoderFailure, VideoEncoder};
use crate::error::NormalizeError;
use crate::media::SourceDimensions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// File produced inside a per-invocation scratch directory.
///
/// The directory and everything in it is removed on drop.
#[derive(Debug)]
pub struct ScratchOutput {
    _dir: TempDir,
    path: PathBuf,
}

impl ScratchOutput {
    fn new(file_name: &str) -> Result<Self, NormalizeError> {
        let dir = tempfile::Builder::new().prefix("media-normalizer-").tempdir()?;
        let path = dir.path().join(file_name);
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>, NormalizeError> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// Successful result of the transcode machine
#[derive(Debug)]
pub struct NormalizedVideo {
    pub output: ScratchOutput,
    /// Parameters of the attempt that produced `output`
    pub params: EncodeParams,
    pub used_fallback: bool,
}

/// States of the transcode machine
#[derive(Debug)]
pub enum TransformState {
    CheckEncoder,
    ValidateInput,
    PrimaryTranscode,
    FallbackTranscode { primary_diagnostic: String },
    VerifyOutput { used_fallback: bool },
    Succeeded { used_fallback: bool },
    Failed(NormalizeError),
}

impl TransformState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransformState::Succeeded { .. } | TransformState::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            TransformState::CheckEncoder => "check_encoder",
            TransformState::ValidateInput => "validate_input",
            TransformState::PrimaryTranscode => "primary_transcode",
            TransformState::FallbackTranscode { .. } => "fallback_transcode",
            TransformState::VerifyOutput { .. } => "verify_output",
            TransformState::Succeeded { .. } => "succeeded",
            TransformState::Failed(_) => "failed",
        }
    }
}

/// Inputs shared by every state of one run
#[derive(Debug)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Source extension, drives the fallback audio policy
    pub container: Option<String>,
    pub primary: EncodeParams,
    /// Set once the fallback attempt has been started
    pub fallback: Option<EncodeParams>,
}

/// Drives `VideoEncoder` through the transcode state machine
pub struct VideoTransform {
    encoder: Arc<dyn VideoEncoder>,
    config: Arc<Config>,
}

impl VideoTransform {
    pub fn new(encoder: Arc<dyn VideoEncoder>, config: Arc<Config>) -> Self {
        Self { encoder, config }
    }

    pub fn encoder_available(&self) -> bool {
        self.encoder.is_available()
    }

    /// Normalize `input` given its probed dimensions
    pub async fn run(
        &self,
        input: &Path,
        dims: &SourceDimensions,
        container: Option<&str>,
    ) -> Result<NormalizedVideo, NormalizeError> {
        let output = ScratchOutput::new("normalized.mp4")?;
        let mut job = TranscodeJob {
            input: input.to_path_buf(),
            output: output.path().to_path_buf(),
            container: container.map(str::to_string),
            primary: EncodeParams::primary(&self.config, dims, &self.config.catalog),
            fallback: None,
        };

        let mut state = TransformState::CheckEncoder;
        loop {
            state = match state {
                TransformState::Succeeded { used_fallback } => {
                    let params = match job.fallback {
                        Some(fallback) if used_fallback => fallback,
                        _ => job.primary,
                    };
                    info!(
                        "Transcoded {} (preset {}, crf {}{})",
                        input.display(),
                        params.preset,
                        params.crf,
                        if used_fallback { ", fallback" } else { "" }
                    );
                    return Ok(NormalizedVideo {
                        output,
                        params,
                        used_fallback,
                    });
                }
                TransformState::Failed(err) => {
                    discard(&job.output).await;
                    drop(output);
                    return Err(err);
                }
                current => {
                    let from = current.name();
                    let next = self.step(current, &mut job).await;
                    debug!("{}: {} -> {}", input.display(), from, next.name());
                    next
                }
            };
        }
    }

    /// Transition function of the machine. Terminal states map to themselves.
    pub async fn step(&self, state: TransformState, job: &mut TranscodeJob) -> TransformState {
        match state {
            TransformState::CheckEncoder => {
                if self.encoder.is_available() {
                    TransformState::ValidateInput
                } else {
                    TransformState::Failed(NormalizeError::EncoderUnavailable(
                        "ffmpeg could not be resolved".to_string(),
                    ))
                }
            }
            TransformState::ValidateInput => {
                match self.encoder.validate(&job.input, job.primary.duration_cap_secs).await {
                    Ok(()) => TransformState::PrimaryTranscode,
                    Err(EncoderFailure::Exited(diagnostic)) => {
                        TransformState::Failed(NormalizeError::CorruptInput(diagnostic))
                    }
                    Err(failure) => TransformState::Failed(NormalizeError::Transcode {
                        primary: failure.to_string(),
                        fallback: "not attempted, validation did not complete".to_string(),
                    }),
                }
            }
            TransformState::PrimaryTranscode => {
                match self.encoder.transcode(&job.input, &job.output, &job.primary).await {
                    Ok(()) => TransformState::VerifyOutput { used_fallback: false },
                    Err(failure) => {
                        warn!("Primary transcode failed for {}, retrying with fallback settings", job.input.display());
                        TransformState::FallbackTranscode {
                            primary_diagnostic: failure.to_string(),
                        }
                    }
                }
            }
            TransformState::FallbackTranscode { primary_diagnostic } => {
                // partial output of the primary attempt
                discard(&job.output).await;
                let params = EncodeParams::fallback(&self.config, &job.primary, job.container.as_deref());
                let result = self.encoder.transcode(&job.input, &job.output, &params).await;
                job.fallback = Some(params);
                match result {
                    Ok(()) => TransformState::VerifyOutput { used_fallback: true },
                    Err(failure) => TransformState::Failed(NormalizeError::Transcode {
                        primary: primary_diagnostic,
                        fallback: failure.to_string(),
                    }),
                }
            }
            TransformState::VerifyOutput { used_fallback } => {
                if non_empty(&job.output).await {
                    TransformState::Succeeded { used_fallback }
                } else {
                    TransformState::Failed(NormalizeError::EmptyOutput(job.output.clone()))
                }
            }
            terminal => terminal,
        }
    }

    /// Stream-copy trim of `input` to `trim_cap_secs`, keeping codec and container
    pub async fn trim(&self, input: &Path, extension: &str) -> Result<ScratchOutput, NormalizeError> {
        if !self.encoder.is_available() {
            return Err(NormalizeError::EncoderUnavailable("ffmpeg could not be resolved".to_string()));
        }

        let output = ScratchOutput::new(&format!("trimmed.{}", extension))?;
        let cap = self.config.trim_cap_secs;
        if let Err(failure) = self.encoder.trim(input, output.path(), cap).await {
            return Err(NormalizeError::Transcode {
                primary: failure.to_string(),
                fallback: "no fallback for stream-copy trim".to_string(),
            });
        }

        if !non_empty(output.path()).await {
            return Err(NormalizeError::EmptyOutput(output.path().to_path_buf()));
        }
        debug!("Trimmed {} to {}s", input.display(), cap);
        Ok(output)
    }
}

async fn non_empty(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}
