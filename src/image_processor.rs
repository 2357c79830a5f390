//! # Image Transform
//!
//! Questo modulo normalizza le immagini su uno dei formati del catalogo usando il
//! crate `image` (nessun tool esterno).
//!
//! ## Pipeline:
//! 1. **Decode**: formato rilevato dai byte (`with_guessed_format`), mai dall'estensione
//! 2. **Resize** verso le dimensioni esatte del formato, filtro Lanczos3
//! 3. **Encode** in JPEG con qualità configurabile (default 90)
//!
//! ## Modalità di resize (`ResizeMode`):
//! | Modalità  | Comportamento                                            |
//! |-----------|----------------------------------------------------------|
//! | `stretch` | resize diretto al box, accetta la distorsione (default)  |
//! | `fill`    | copre il box e ritaglia al centro l'eccedenza            |
//! | `pad`     | entra nel box, il resto viene riempito di nero           |
//!
//! In tutte le modalità l'output ha esattamente larghezza e altezza del formato.
//!
//! ## Errori:
//! Dati malformati → `NormalizeError::Decode`, nessun output parziale.
//!
//! ## Nota:
//! Il lavoro è CPU-bound: la pipeline lo esegue dentro `spawn_blocking`.

use crate::catalog::{FormatCatalog, MediaFormat};
use crate::config::{Config, ResizeMode};
use crate::error::NormalizeError;
use crate::media::{ProcessingOutcome, SourceDimensions};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageError, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Decodes, fits and re-encodes still images
#[derive(Debug, Clone)]
pub struct ImageTransform {
    quality: u8,
    resize_mode: ResizeMode,
    catalog: FormatCatalog,
}

impl ImageTransform {
    pub fn new(config: &Config) -> Self {
        Self {
            quality: config.image_quality,
            resize_mode: config.resize_mode,
            catalog: config.catalog.clone(),
        }
    }

    /// Read width and height from the header without decoding pixels
    pub fn dimensions(bytes: &[u8]) -> Result<SourceDimensions, NormalizeError> {
        let (width, height) = reader(bytes)?
            .into_dimensions()
            .map_err(NormalizeError::Decode)?;
        Ok(SourceDimensions::image(width, height))
    }

    /// Match the image against the catalog, then transform it
    pub fn normalize(&self, bytes: &[u8]) -> Result<ProcessingOutcome, NormalizeError> {
        let img = decode(bytes)?;
        let format = self.catalog.match_format(img.width(), img.height())?;
        debug!(
            "Image {}x{} matched format {} ({})",
            img.width(),
            img.height(),
            format.name,
            format.formatted_ratio
        );
        self.encode_into(&img, format)
    }

    /// Transform into the named catalog format (name or label)
    pub fn transform(&self, bytes: &[u8], format_name: &str) -> Result<ProcessingOutcome, NormalizeError> {
        let format = self.catalog.find(format_name)?;
        let img = decode(bytes)?;
        self.encode_into(&img, format)
    }

    fn encode_into(&self, img: &DynamicImage, format: &MediaFormat) -> Result<ProcessingOutcome, NormalizeError> {
        let fitted = fit(img, format.width, format.height, self.resize_mode);
        let output_bytes = encode_jpeg(&fitted, self.quality)?;

        Ok(ProcessingOutcome {
            output_bytes,
            was_transformed: true,
            final_dimensions: SourceDimensions::image(fitted.width(), fitted.height()),
            final_duration_secs: 0.0,
            matched_format: Some(format.formatted_ratio.clone()),
            output_extension: "jpg".to_string(),
        })
    }
}

fn reader(bytes: &[u8]) -> Result<image::io::Reader<Cursor<&[u8]>>, NormalizeError> {
    image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NormalizeError::Decode(ImageError::IoError(e)))
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
    reader(bytes)?.decode().map_err(NormalizeError::Decode)
}

/// Fit `img` into exactly `width` x `height`
fn fit(img: &DynamicImage, width: u32, height: u32, mode: ResizeMode) -> RgbImage {
    match mode {
        ResizeMode::Stretch => img.resize_exact(width, height, FilterType::Lanczos3).to_rgb8(),
        ResizeMode::Fill => img.resize_to_fill(width, height, FilterType::Lanczos3).to_rgb8(),
        ResizeMode::Pad => {
            let inner = img.resize(width, height, FilterType::Lanczos3).to_rgb8();
            let mut canvas = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
            let x = (width - inner.width()) / 2;
            let y = (height - inner.height()) / 2;
            imageops::overlay(&mut canvas, &inner, x as i64, y as i64);
            canvas
        }
    }
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, NormalizeError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)
        .map_err(NormalizeError::Encode)?;
    Ok(buffer)
}
