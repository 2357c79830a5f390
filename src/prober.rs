//! # Metadata Prober
//!
//! Estrazione di larghezza, altezza e durata tramite `ffprobe`.
//!
//! ## Responsabilità:
//! - Definisce il trait `MetadataProber` (i test sostituiscono ffprobe con un fake)
//! - `FfprobeProber`: invoca ffprobe sul primo stream video con output CSV
//!   (`width,height,duration`)
//! - `parse_probe_output()`: valida che la riga abbia almeno 3 campi (altrimenti
//!   `ProbeFormat`); i singoli campi non numerici degradano a 0
//!
//! ## Finestra di probe:
//! Con `probe_window_secs` ffprobe legge solo i primi secondi dello stream
//! (`-read_intervals %+N`), limitando la latenza sui file molto grandi.
//! Risoluzione e aspect ratio sono proprietà dello stream, stabili per tutto il file.

use crate::config::Config;
use crate::error::NormalizeError;
use crate::media::SourceDimensions;
use crate::tool_resolver::{run_tool, ToolResolver};
use crate::utils::diagnostic_tail;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Extracts stream metadata from a media file
#[async_trait]
pub trait MetadataProber: Send + Sync {
    /// Whether the underlying tool can be resolved
    fn is_available(&self) -> bool;

    async fn probe(&self, path: &Path) -> Result<SourceDimensions, NormalizeError>;
}

/// `MetadataProber` backed by the ffprobe binary
pub struct FfprobeProber {
    resolver: ToolResolver,
    window_secs: Option<u32>,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(config: &Config, resolver: ToolResolver) -> Self {
        Self {
            resolver,
            window_secs: config.probe_window_secs,
            timeout: config.probe_timeout(),
        }
    }

    /// Arguments for a CSV probe of the first video stream
    pub fn probe_args(&self, path: &Path) -> Vec<String> {
        let mut args = crate::args![
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,duration",
            "-of", "csv=p=0",
        ];
        if let Some(secs) = self.window_secs {
            args.extend(crate::args!["-read_intervals", format!("%+{}", secs)]);
        }
        args.push(path.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl MetadataProber for FfprobeProber {
    fn is_available(&self) -> bool {
        self.resolver.is_available("ffprobe")
    }

    async fn probe(&self, path: &Path) -> Result<SourceDimensions, NormalizeError> {
        let ffprobe = self
            .resolver
            .resolve("ffprobe")
            .ok_or_else(|| NormalizeError::ProbeUnavailable("ffprobe is not installed".to_string()))?;

        let output = run_tool(&ffprobe, self.probe_args(path), self.timeout)
            .await
            .map_err(|failure| NormalizeError::ProbeUnavailable(failure.to_string()))?;

        if !output.success {
            warn!("ffprobe failed for {}: {}", path.display(), diagnostic_tail(&output.stderr, 5));
            return Err(NormalizeError::ProbeUnavailable(diagnostic_tail(&output.stderr, 5)));
        }

        let dims = parse_probe_output(&output.stdout)?;
        debug!(
            "Probed {}: {}x{}, {:.2}s",
            path.display(),
            dims.width,
            dims.height,
            dims.duration_secs
        );
        Ok(dims)
    }
}

/// Parse ffprobe's `width,height,duration` line.
///
/// Fewer than three fields is a `ProbeFormat` error; unparsable fields become 0.
pub fn parse_probe_output(stdout: &str) -> Result<SourceDimensions, NormalizeError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return Err(NormalizeError::ProbeFormat(line.to_string()));
    }

    let width = parts[0].parse::<u32>().unwrap_or(0);
    let height = parts[1].parse::<u32>().unwrap_or(0);
    let duration = parts[2]
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(SourceDimensions::new(width, height, duration))
}
