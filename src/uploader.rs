//! # Blob Uploader
//!
//! Collaboratore di storage: riceve i byte finali già normalizzati e restituisce
//! un URL pubblico.
//!
//! ## Responsabilità:
//! - Trait `BlobUploader` (il protocollo dello storage resta fuori dalla pipeline)
//! - `LocalDirUploader`: scrive in una directory locale e restituisce un URL `file://`
//! - `object_key()`: nome oggetto stabile `<stem>-<sha256[..12]>.<ext>`
//!
//! L'estensione della chiave è quella del formato prodotto (jpg per le immagini
//! normalizzate, mp4 per i video), non quella del file caricato.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hex digits of the content hash kept in object keys
const KEY_HASH_LEN: usize = 12;

/// Stores processed bytes and returns their public URL
#[async_trait]
pub trait BlobUploader: Send + Sync {
    async fn upload(&self, bytes: &[u8], object_key: &str) -> Result<String>;
}

/// `BlobUploader` writing into a local directory
#[derive(Debug, Clone)]
pub struct LocalDirUploader {
    root: PathBuf,
}

impl LocalDirUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobUploader for LocalDirUploader {
    async fn upload(&self, bytes: &[u8], object_key: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create output directory {}", self.root.display()))?;

        let target = self.root.join(object_key);
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        let absolute = tokio::fs::canonicalize(&target).await.unwrap_or(target);
        debug!("Stored {} bytes at {}", bytes.len(), absolute.display());
        Ok(format!("file://{}", absolute.display()))
    }
}

/// Content-addressed object key for `filename`'s processed bytes
pub fn object_key(filename: &str, bytes: &[u8], extension: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "upload".to_string());

    let digest = hex::encode(Sha256::digest(bytes));
    format!("{}-{}.{}", stem, &digest[..KEY_HASH_LEN], extension)
}

fn sanitize(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
