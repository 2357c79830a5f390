//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il feedback visivo e le statistiche del batch.
//!
//! ## Responsabilità:
//! - Progress bar con `indicatif` (nascosta in modalità `--json`, stdout è riservato)
//! - `NormalizeStats`: file trasformati, passati invariati, errori, byte in/out
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:42] [========================>---------------] 12/20 (60%) clip.mov: 1.91:1
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A bar that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Increment and show `message`
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Aggregate results of a batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizeStats {
    pub files_processed: usize,
    pub files_transformed: usize,
    pub files_passed_through: usize,
    pub errors: usize,
    pub total_original_size: u64,
    pub total_output_size: u64,
}

impl NormalizeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transformed(&mut self, original_size: u64, output_size: u64) {
        self.files_processed += 1;
        self.files_transformed += 1;
        self.total_original_size += original_size;
        self.total_output_size += output_size;
    }

    pub fn add_passed_through(&mut self, size: u64) {
        self.files_processed += 1;
        self.files_passed_through += 1;
        self.total_original_size += size;
        self.total_output_size += size;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Normalized: {} | Unchanged: {} | Errors: {} | {} -> {} ({:.1}% smaller)",
            self.files_processed,
            self.files_transformed,
            self.files_passed_through,
            self.errors,
            FileManager::format_size(self.total_original_size),
            FileManager::format_size(self.total_output_size),
            FileManager::calculate_reduction(self.total_original_size, self.total_output_size)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = NormalizeStats::new();
        stats.add_transformed(1000, 400);
        stats.add_passed_through(24);
        stats.add_error();

        assert_eq!(stats.files_processed, 3);
        assert_eq!(stats.files_transformed, 1);
        assert_eq!(stats.files_passed_through, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_original_size, 1024);
        assert_eq!(stats.total_output_size, 424);
        assert!(stats.format_summary().contains("Errors: 1"));
    }

    #[test]
    fn test_hidden_bar_still_counts() {
        let progress = ProgressManager::hidden();
        progress.update("a.jpg");
        progress.update("b.jpg");
        assert_eq!(progress.position(), 2);
        progress.finish("done");
    }
}
