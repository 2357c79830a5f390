//! # Runner Module
//!
//! Esecuzione batch della pipeline dalla CLI, separata in sottomoduli:
//! - `batch_runner`: orchestratore (raccolta input, concorrenza, riepilogo)
//! - `asset_task`: worker per un singolo file (lettura, pipeline, upload)
//! - `progress_tracker`: progress bar ed eventi JSON per file

pub mod asset_task;
pub mod batch_runner;
pub mod progress_tracker;

pub use asset_task::{AssetReport, AssetTask, RunMode, StoredAsset};
pub use batch_runner::{BatchRunner, BatchSummary};
pub use progress_tracker::ProgressTracker;
