//! # File Management Module
//!
//! Questo modulo gestisce la raccolta degli input e le piccole utilità sui file.
//!
//! ## Responsabilità:
//! - `collect_inputs()`: espande file e directory (ricorsivamente, con `walkdir`)
//!   in una lista ordinata e senza duplicati
//! - `read_upload()`: legge i byte sorgente, mappando l'errore su `UnreadableInput`
//! - Formattazione human-readable delle dimensioni
//!
//! Nessun filtro per estensione: la classificazione avviene sui magic bytes e i
//! file non riconosciuti attraversano la pipeline invariati. Vengono saltati solo
//! i file nascosti (`.DS_Store`, `.git/...`).

use crate::error::NormalizeError;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Manages input discovery and file helpers
pub struct FileManager;

impl FileManager {
    /// Expand `inputs` into the list of regular files to process
    pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();

        for input in inputs {
            let metadata = std::fs::metadata(input)
                .with_context(|| format!("Input does not exist: {}", input.display()))?;

            if metadata.is_file() {
                files.insert(input.clone());
                continue;
            }

            for entry in WalkDir::new(input)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                files.insert(entry.into_path());
            }
        }

        Ok(files.into_iter().collect())
    }

    /// Read an upload's bytes
    pub async fn read_upload(path: &Path) -> Result<Vec<u8>, NormalizeError> {
        tokio::fs::read(path).await.map_err(NormalizeError::UnreadableInput)
    }

    /// File name used for classification and object keys
    pub fn upload_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Percentage change from `original_size` to `new_size` (positive = smaller)
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_inputs_walks_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("album");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(nested.join("b.mov"), b"b").unwrap();
        std::fs::write(nested.join("notes.txt"), b"c").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"x").unwrap();

        let single = dir.path().join("a.jpg");
        let files = FileManager::collect_inputs(&[dir.path().to_path_buf(), single.clone()]).unwrap();

        assert_eq!(files.len(), 3);
        assert!(files.contains(&single));
        assert!(files.contains(&nested.join("notes.txt")));
        assert!(!files.iter().any(|f| f.ends_with(".DS_Store")));
    }

    #[test]
    fn test_collect_inputs_missing_path() {
        assert!(FileManager::collect_inputs(&[PathBuf::from("/definitely/not/here")]).is_err());
    }

    #[tokio::test]
    async fn test_read_upload_unreadable() {
        let err = FileManager::read_upload(Path::new("/definitely/not/here.jpg")).await.unwrap_err();
        assert!(matches!(err, NormalizeError::UnreadableInput(_)));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(1536), "1.50 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(200, 50), 75.0);
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
        assert!(FileManager::calculate_reduction(100, 150) < 0.0);
    }
}
